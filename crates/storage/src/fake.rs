// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory storage with fault injection, for tests
#![cfg_attr(coverage_nightly, coverage(off))]

use crate::state::MaterializedState;
use crate::{Inserted, Storage, StorageError};
use nlog_core::{DedupKey, EventRecord, NewRecord, RecordId};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Recorded storage call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageCall {
    Insert { key: DedupKey },
    DeleteBySource { source: String },
    DeleteById { id: RecordId },
}

#[derive(Default)]
struct FakeState {
    records: MaterializedState,
    calls: Vec<StorageCall>,
    failing_inserts: u32,
    fail_all: bool,
    panic_next: bool,
    delay: Option<Duration>,
}

/// Fake storage for testing
///
/// Cloning shares the underlying state.
#[derive(Clone, Default)]
pub struct FakeStorage {
    inner: Arc<Mutex<FakeState>>,
}

impl FakeStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` inserts fail as if the medium were full
    pub fn fail_next_inserts(&self, count: u32) {
        self.lock().failing_inserts = count;
    }

    /// Make every mutation fail until turned off
    pub fn fail_all(&self, fail: bool) {
        self.lock().fail_all = fail;
    }

    /// Panic inside the next mutation
    pub fn panic_next(&self) {
        self.lock().panic_next = true;
    }

    /// Sleep this long inside every mutation
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.lock().delay = delay;
    }

    /// Get all recorded mutations
    pub fn calls(&self) -> Vec<StorageCall> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Common fault handling for mutations; returns an error if this call should fail
    #[allow(clippy::panic)]
    fn before_mutation(&self, call: StorageCall, is_insert: bool) -> Result<(), StorageError> {
        let delay = {
            let mut state = self.lock();
            state.calls.push(call);
            if state.panic_next {
                state.panic_next = false;
                drop(state);
                panic!("injected storage panic");
            }
            if state.fail_all {
                return Err(StorageError::Unavailable("injected failure".to_string()));
            }
            if is_insert && state.failing_inserts > 0 {
                state.failing_inserts -= 1;
                return Err(StorageError::Unavailable("injected insert failure".to_string()));
            }
            state.delay
        };
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        Ok(())
    }
}

impl Storage for FakeStorage {
    fn insert(&self, record: NewRecord) -> Result<Inserted, StorageError> {
        self.before_mutation(
            StorageCall::Insert {
                key: record.dedup_key(),
            },
            true,
        )?;
        let mut state = self.lock();
        if let Some(existing) = state.records.find_duplicate(&record.dedup_key(), 0) {
            return Ok(Inserted::Duplicate(existing));
        }
        let id = state.records.next_id();
        state.records.insert(record.with_id(id));
        Ok(Inserted::New(id))
    }

    fn query_recent(&self, limit: usize) -> Result<Vec<EventRecord>, StorageError> {
        Ok(self.lock().records.recent(limit))
    }

    fn delete_by_source(&self, source: &str) -> Result<usize, StorageError> {
        self.before_mutation(
            StorageCall::DeleteBySource {
                source: source.to_string(),
            },
            false,
        )?;
        Ok(self.lock().records.remove_source(source))
    }

    fn delete_by_id(&self, id: RecordId) -> Result<bool, StorageError> {
        self.before_mutation(StorageCall::DeleteById { id }, false)?;
        Ok(self.lock().records.remove_id(id).is_some())
    }

    fn find_duplicate(
        &self,
        key: &DedupKey,
        tolerance_ms: u64,
    ) -> Result<Option<RecordId>, StorageError> {
        Ok(self.lock().records.find_duplicate(key, tolerance_ms))
    }

    fn latest_for_source(&self, source: &str) -> Result<Option<EventRecord>, StorageError> {
        Ok(self.lock().records.latest_for_source(source).cloned())
    }

    fn len(&self) -> usize {
        self.lock().records.len()
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
