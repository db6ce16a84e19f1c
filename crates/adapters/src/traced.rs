// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced storage wrapper for consistent observability

use nlog_core::{DedupKey, EventRecord, NewRecord, RecordId};
use nlog_storage::{Inserted, Storage, StorageError};
use std::time::Instant;

/// Wrapper that adds tracing to any Storage
#[derive(Clone)]
pub struct TracedStorage<S> {
    inner: S,
}

impl<S> TracedStorage<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: Storage> Storage for TracedStorage<S> {
    fn insert(&self, record: NewRecord) -> Result<Inserted, StorageError> {
        let span = tracing::debug_span!(
            "storage.insert",
            source = %record.source,
            observed_at = record.observed_at_millis
        );
        let _guard = span.enter();

        let start = Instant::now();
        let result = self.inner.insert(record);
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(Inserted::New(id)) => tracing::debug!(%id, elapsed_ms, "record stored"),
            Ok(Inserted::Duplicate(id)) => {
                tracing::debug!(%id, elapsed_ms, "record coalesced with existing")
            }
            Err(e) => tracing::error!(elapsed_ms, error = %e, "insert failed"),
        }

        result
    }

    fn query_recent(&self, limit: usize) -> Result<Vec<EventRecord>, StorageError> {
        let result = self.inner.query_recent(limit);
        tracing::trace!(
            limit,
            returned = result.as_ref().map(Vec::len).ok(),
            "queried recent"
        );
        result
    }

    fn delete_by_source(&self, source: &str) -> Result<usize, StorageError> {
        let span = tracing::info_span!("storage.delete_by_source", source);
        let _guard = span.enter();

        let start = Instant::now();
        let result = self.inner.delete_by_source(source);
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(count) => tracing::info!(count, elapsed_ms, "records deleted"),
            Err(e) => tracing::error!(elapsed_ms, error = %e, "delete failed"),
        }

        result
    }

    fn delete_by_id(&self, id: RecordId) -> Result<bool, StorageError> {
        let span = tracing::info_span!("storage.delete_by_id", %id);
        let _guard = span.enter();

        let result = self.inner.delete_by_id(id);
        match &result {
            Ok(removed) => tracing::info!(removed, "record delete"),
            Err(e) => tracing::error!(error = %e, "delete failed"),
        }

        result
    }

    fn find_duplicate(
        &self,
        key: &DedupKey,
        tolerance_ms: u64,
    ) -> Result<Option<RecordId>, StorageError> {
        let result = self.inner.find_duplicate(key, tolerance_ms);
        tracing::trace!(%key, tolerance_ms, found = ?result.as_ref().ok(), "dedup lookup");
        result
    }

    fn latest_for_source(&self, source: &str) -> Result<Option<EventRecord>, StorageError> {
        self.inner.latest_for_source(source)
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
