// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Durable storage for notification records
//!
//! ```text
//! insert/delete → Wal (fsync) → MaterializedState (RwLock) ← query_recent
//! ```
//!
//! The log is the source of truth; the in-memory indexes are rebuilt from it
//! on open. Writers serialize on the log; readers only take the index read
//! lock, so they never wait on a sync.

mod state;
mod store;
pub mod wal;

#[cfg(any(test, feature = "test-support"))]
mod fake;

pub use state::MaterializedState;
pub use store::{WalStorage, WalStorageConfig};
pub use wal::{Operation, Wal, WalCorruption, WalEntry};

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeStorage, StorageCall};

use nlog_core::{DedupKey, EventRecord, NewRecord, RecordId};
use std::sync::Arc;
use thiserror::Error;

/// Errors from the storage medium
///
/// Every variant means the operation was not durably completed.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of an insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inserted {
    /// Stored under a freshly assigned id
    New(RecordId),
    /// A record with the same dedup key already exists; nothing written
    Duplicate(RecordId),
}

impl Inserted {
    pub fn id(&self) -> RecordId {
        match self {
            Inserted::New(id) | Inserted::Duplicate(id) => *id,
        }
    }
}

/// Pull-only record store
///
/// Mutations are durable before they return `Ok`. Reads return owned
/// snapshots that go stale rather than tracking later writes.
pub trait Storage: Send + Sync + 'static {
    /// Assign an id and persist the record
    fn insert(&self, record: NewRecord) -> Result<Inserted, StorageError>;

    /// Up to `limit` records, newest `observed_at_millis` first, ties by newest id
    fn query_recent(&self, limit: usize) -> Result<Vec<EventRecord>, StorageError>;

    /// Remove every record for a source; 0 when nothing matched
    fn delete_by_source(&self, source: &str) -> Result<usize, StorageError>;

    /// Remove one record; false when it was not present
    fn delete_by_id(&self, id: RecordId) -> Result<bool, StorageError>;

    /// Existing record whose dedup key is within `tolerance_ms` of `key`
    fn find_duplicate(
        &self,
        key: &DedupKey,
        tolerance_ms: u64,
    ) -> Result<Option<RecordId>, StorageError>;

    /// Most recently posted record for a source
    fn latest_for_source(&self, source: &str) -> Result<Option<EventRecord>, StorageError>;

    /// Number of live records
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S: Storage> Storage for Arc<S> {
    fn insert(&self, record: NewRecord) -> Result<Inserted, StorageError> {
        (**self).insert(record)
    }

    fn query_recent(&self, limit: usize) -> Result<Vec<EventRecord>, StorageError> {
        (**self).query_recent(limit)
    }

    fn delete_by_source(&self, source: &str) -> Result<usize, StorageError> {
        (**self).delete_by_source(source)
    }

    fn delete_by_id(&self, id: RecordId) -> Result<bool, StorageError> {
        (**self).delete_by_id(id)
    }

    fn find_duplicate(
        &self,
        key: &DedupKey,
        tolerance_ms: u64,
    ) -> Result<Option<RecordId>, StorageError> {
        (**self).find_duplicate(key, tolerance_ms)
    }

    fn latest_for_source(&self, source: &str) -> Result<Option<EventRecord>, StorageError> {
        (**self).latest_for_source(source)
    }

    fn len(&self) -> usize {
        (**self).len()
    }
}
