// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log-backed record store

use crate::state::MaterializedState;
use crate::wal::{Operation, Wal};
use crate::{Inserted, Storage, StorageError};
use nlog_core::{DedupKey, EventRecord, NewRecord, RecordId};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

/// Tunables for `WalStorage`
#[derive(Debug, Clone, Default)]
pub struct WalStorageConfig {
    /// Rewrite the log after this many records have been deleted since the last
    /// rewrite. `None` never compacts automatically.
    pub compact_after_deletes: Option<u64>,
}

/// Durable record store backed by a write-ahead log
pub struct WalStorage {
    path: PathBuf,
    config: WalStorageConfig,
    /// Single writer: held across the append and the index update
    wal: Mutex<WalWriterState>,
    state: RwLock<MaterializedState>,
}

struct WalWriterState {
    wal: Wal,
    deletes_since_compact: u64,
}

impl WalStorage {
    /// Open or create a store, replaying the log into memory
    pub fn open(path: &Path, config: WalStorageConfig) -> Result<Self, StorageError> {
        let (wal, replay) = Wal::open(path)?;

        let mut state = MaterializedState::default();
        for op in &replay.operations {
            state.apply(op);
        }

        tracing::info!(
            path = %path.display(),
            records = state.len(),
            entries = replay.operations.len(),
            next_id = %state.next_id(),
            "opened record store"
        );

        Ok(Self {
            path: path.to_path_buf(),
            config,
            wal: Mutex::new(WalWriterState {
                wal,
                deletes_since_compact: 0,
            }),
            state: RwLock::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrite the log so it only holds live records
    ///
    /// Ids survive compaction, and the id counter is preserved so deleted ids
    /// are never handed out again.
    pub fn compact(&self) -> Result<(), StorageError> {
        let mut writer = self.wal.lock().unwrap_or_else(|e| e.into_inner());
        self.compact_locked(&mut writer)
    }

    fn compact_locked(&self, writer: &mut WalWriterState) -> Result<(), StorageError> {
        let operations = {
            let state = self.read_state();
            let mut ops = Vec::with_capacity(state.len() + 1);
            ops.push(Operation::Reserve {
                next_id: state.next_id(),
            });
            ops.extend(state.records_by_id().into_iter().map(|record| Operation::Insert {
                record: record.clone(),
            }));
            ops
        };
        let before = writer.wal.len();
        writer.wal.rewrite(operations)?;
        writer.deletes_since_compact = 0;

        tracing::info!(
            path = %self.path.display(),
            before_bytes = before,
            after_bytes = writer.wal.len(),
            "compacted record log"
        );
        Ok(())
    }

    fn note_deletes(&self, writer: &mut WalWriterState, count: u64) {
        writer.deletes_since_compact += count;
        let Some(threshold) = self.config.compact_after_deletes else {
            return;
        };
        if writer.deletes_since_compact >= threshold {
            // The delete itself is already durable; a failed rewrite leaves the old log intact
            if let Err(e) = self.compact_locked(writer) {
                tracing::error!(error = %e, "log compaction failed");
            }
        }
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, MaterializedState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, MaterializedState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Storage for WalStorage {
    fn insert(&self, record: NewRecord) -> Result<Inserted, StorageError> {
        let mut writer = self.wal.lock().unwrap_or_else(|e| e.into_inner());

        // Only the writer mutates state, so nothing can change between this check and the apply
        let id = {
            let state = self.read_state();
            if let Some(existing) = state.find_duplicate(&record.dedup_key(), 0) {
                return Ok(Inserted::Duplicate(existing));
            }
            state.next_id()
        };

        let record = record.with_id(id);
        writer.wal.append(Operation::Insert {
            record: record.clone(),
        })?;
        self.write_state().insert(record);
        Ok(Inserted::New(id))
    }

    fn query_recent(&self, limit: usize) -> Result<Vec<EventRecord>, StorageError> {
        Ok(self.read_state().recent(limit))
    }

    fn delete_by_source(&self, source: &str) -> Result<usize, StorageError> {
        let mut writer = self.wal.lock().unwrap_or_else(|e| e.into_inner());

        let count = self.read_state().ids_for_source(source).len();
        if count == 0 {
            return Ok(0);
        }

        writer.wal.append(Operation::DeleteSource {
            source: source.to_string(),
        })?;
        let removed = self.write_state().remove_source(source);
        self.note_deletes(&mut writer, removed as u64);
        Ok(removed)
    }

    fn delete_by_id(&self, id: RecordId) -> Result<bool, StorageError> {
        let mut writer = self.wal.lock().unwrap_or_else(|e| e.into_inner());

        if self.read_state().get(id).is_none() {
            return Ok(false);
        }

        writer.wal.append(Operation::DeleteRecord { id })?;
        self.write_state().remove_id(id);
        self.note_deletes(&mut writer, 1);
        Ok(true)
    }

    fn find_duplicate(
        &self,
        key: &DedupKey,
        tolerance_ms: u64,
    ) -> Result<Option<RecordId>, StorageError> {
        Ok(self.read_state().find_duplicate(key, tolerance_ms))
    }

    fn latest_for_source(&self, source: &str) -> Result<Option<EventRecord>, StorageError> {
        Ok(self.read_state().latest_for_source(source).cloned())
    }

    fn len(&self) -> usize {
        self.read_state().len()
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
