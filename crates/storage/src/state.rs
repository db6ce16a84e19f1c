// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized record index built from log replay
//!
//! Three views over the same records:
//! - `records`: primary map by surrogate id
//! - `by_key`: dedup index on `(source, observed_at_millis)`, also used for
//!   per-source range scans
//! - `by_recency`: `(observed_at_millis, id)` ordering for recency queries

use crate::wal::Operation;
use nlog_core::{DedupKey, EventRecord, RecordId};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// In-memory view of all live records
#[derive(Debug, Default, Clone)]
pub struct MaterializedState {
    records: HashMap<RecordId, EventRecord>,
    by_key: BTreeMap<DedupKey, RecordId>,
    by_recency: BTreeSet<(i64, RecordId)>,
    next_id: u64,
}

impl MaterializedState {
    /// Apply a replayed operation
    pub fn apply(&mut self, op: &Operation) {
        match op {
            Operation::Insert { record } => {
                if !self.insert(record.clone()) {
                    tracing::warn!(id = %record.id, key = %record.dedup_key(), "skipping duplicate insert in log");
                }
            }
            Operation::DeleteRecord { id } => {
                self.remove_id(*id);
            }
            Operation::DeleteSource { source } => {
                self.remove_source(source);
            }
            Operation::Reserve { next_id } => {
                self.next_id = self.next_id.max(next_id.0);
            }
        }
    }

    /// The id the next insert will receive
    pub fn next_id(&self) -> RecordId {
        RecordId(self.next_id)
    }

    /// Add a record; returns false if its dedup key is already present
    pub fn insert(&mut self, record: EventRecord) -> bool {
        let key = record.dedup_key();
        if self.by_key.contains_key(&key) {
            return false;
        }
        self.next_id = self.next_id.max(record.id.0 + 1);
        self.by_key.insert(key, record.id);
        self.by_recency.insert(record.recency_key());
        self.records.insert(record.id, record);
        true
    }

    pub fn remove_id(&mut self, id: RecordId) -> Option<EventRecord> {
        let record = self.records.remove(&id)?;
        self.by_key.remove(&record.dedup_key());
        self.by_recency.remove(&record.recency_key());
        Some(record)
    }

    pub fn remove_source(&mut self, source: &str) -> usize {
        let ids = self.ids_for_source(source);
        for id in &ids {
            self.remove_id(*id);
        }
        ids.len()
    }

    pub fn get(&self, id: RecordId) -> Option<&EventRecord> {
        self.records.get(&id)
    }

    pub fn contains_key(&self, key: &DedupKey) -> bool {
        self.by_key.contains_key(key)
    }

    /// First-seen record whose post time lies within `tolerance_ms` of the key's
    pub fn find_duplicate(&self, key: &DedupKey, tolerance_ms: u64) -> Option<RecordId> {
        if tolerance_ms == 0 {
            return self.by_key.get(key).copied();
        }
        let tolerance = i64::try_from(tolerance_ms).unwrap_or(i64::MAX);
        let low = DedupKey::new(
            key.source.clone(),
            key.observed_at_millis.saturating_sub(tolerance),
        );
        let high = DedupKey::new(
            key.source.clone(),
            key.observed_at_millis.saturating_add(tolerance),
        );
        self.by_key.range(low..=high).map(|(_, id)| *id).min()
    }

    /// Record with the latest post time for a source (ties: newest id)
    pub fn latest_for_source(&self, source: &str) -> Option<&EventRecord> {
        self.source_range(source)
            .map(|(_, id)| *id)
            .filter_map(|id| self.records.get(&id))
            .max_by_key(|record| record.recency_key())
    }

    /// Up to `limit` records, newest post time first, ties by newest id
    pub fn recent(&self, limit: usize) -> Vec<EventRecord> {
        self.by_recency
            .iter()
            .rev()
            .take(limit)
            .filter_map(|(_, id)| self.records.get(id).cloned())
            .collect()
    }

    /// All live records in id order
    pub fn records_by_id(&self) -> Vec<&EventRecord> {
        let mut records: Vec<_> = self.records.values().collect();
        records.sort_by_key(|record| record.id);
        records
    }

    pub fn ids_for_source(&self, source: &str) -> Vec<RecordId> {
        self.source_range(source).map(|(_, id)| *id).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn source_range(&self, source: &str) -> std::collections::btree_map::Range<'_, DedupKey, RecordId> {
        let low = DedupKey::new(source, i64::MIN);
        let high = DedupKey::new(source, i64::MAX);
        self.by_key.range(low..=high)
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
