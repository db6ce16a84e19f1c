// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write-ahead log for durable record storage
//!
//! One JSON entry per line. Each entry carries a CRC32 of its operation so
//! bit flips and torn writes are caught on replay.
//!
//! ## Durability Guarantees
//!
//! - Every append is followed by `fsync()` before returning
//! - A failed append is rolled back to the previous file length
//! - Replay stops at the first invalid entry; `Wal::open` truncates there

use crate::StorageError;
use nlog_core::{EventRecord, RecordId};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// A state change recorded in the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    Insert { record: EventRecord },
    DeleteRecord { id: RecordId },
    DeleteSource { source: String },
    /// Keeps the id counter from moving backwards when compaction drops records
    Reserve { next_id: RecordId },
}

/// A single entry in the write-ahead log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalEntry {
    pub sequence: u64,
    /// Microseconds since Unix epoch
    pub timestamp_micros: u64,
    pub operation: Operation,
    /// CRC32 of the serialized operation
    pub checksum: u32,
}

impl WalEntry {
    pub fn new(sequence: u64, operation: Operation) -> Result<Self, StorageError> {
        let checksum = Self::calculate_checksum(&operation)?;
        let timestamp_micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0);

        Ok(Self {
            sequence,
            timestamp_micros,
            operation,
            checksum,
        })
    }

    fn calculate_checksum(operation: &Operation) -> Result<u32, StorageError> {
        let json = serde_json::to_string(operation)?;
        Ok(crc32fast::hash(json.as_bytes()))
    }

    /// Verify the checksum matches the operation
    pub fn verify(&self) -> bool {
        Self::calculate_checksum(&self.operation).is_ok_and(|sum| sum == self.checksum)
    }
}

/// Where and why replay stopped early
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalCorruption {
    pub line: u64,
    pub reason: String,
}

/// Result of reading a log from the start
#[derive(Debug, Default)]
pub struct Replay {
    pub operations: Vec<Operation>,
    pub last_sequence: Option<u64>,
    /// Byte length of the valid prefix
    pub valid_len: u64,
    pub corruption: Option<WalCorruption>,
}

/// Append-only log file
pub struct Wal {
    path: PathBuf,
    file: File,
    len: u64,
    next_sequence: u64,
}

impl Wal {
    /// Open or create a log, truncating any invalid tail left by a crash
    ///
    /// Returns the log positioned for appending, plus everything that was replayed.
    pub fn open(path: &Path) -> Result<(Self, Replay), StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let replay = Self::replay(path)?;

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let on_disk = file.metadata()?.len();
        if on_disk > replay.valid_len {
            if let Some(corruption) = &replay.corruption {
                tracing::warn!(
                    path = %path.display(),
                    line = corruption.line,
                    reason = %corruption.reason,
                    dropped_bytes = on_disk - replay.valid_len,
                    "truncating write-ahead log at last valid entry"
                );
            }
            file.set_len(replay.valid_len)?;
            file.sync_all()?;
        }

        let wal = Self {
            path: path.to_path_buf(),
            file,
            len: replay.valid_len,
            next_sequence: replay.last_sequence.map(|s| s + 1).unwrap_or(0),
        };
        Ok((wal, replay))
    }

    /// Read every valid entry, stopping at the first corrupt or torn one
    pub fn replay(path: &Path) -> Result<Replay, StorageError> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Replay::default()),
            Err(e) => return Err(e.into()),
        };

        let mut reader = BufReader::new(file);
        let mut replay = Replay::default();
        let mut position = 0u64;
        let mut line_number = 0u64;

        loop {
            let mut line = String::new();
            let bytes_read = match reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(n) => n as u64,
                Err(e) => {
                    replay.corruption = Some(WalCorruption {
                        line: line_number + 1,
                        reason: format!("IO error: {}", e),
                    });
                    break;
                }
            };
            line_number += 1;

            // A line without its newline was cut short mid-write
            if !line.ends_with('\n') {
                replay.corruption = Some(WalCorruption {
                    line: line_number,
                    reason: "truncated entry".to_string(),
                });
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                position += bytes_read;
                replay.valid_len = position;
                continue;
            }

            let entry: WalEntry = match serde_json::from_str(trimmed) {
                Ok(entry) => entry,
                Err(e) => {
                    replay.corruption = Some(WalCorruption {
                        line: line_number,
                        reason: e.to_string(),
                    });
                    break;
                }
            };
            if !entry.verify() {
                replay.corruption = Some(WalCorruption {
                    line: line_number,
                    reason: "checksum mismatch".to_string(),
                });
                break;
            }

            position += bytes_read;
            replay.valid_len = position;
            replay.last_sequence = Some(entry.sequence);
            replay.operations.push(entry.operation);
        }

        Ok(replay)
    }

    /// Append an operation; durable once this returns `Ok`
    pub fn append(&mut self, operation: Operation) -> Result<u64, StorageError> {
        let sequence = self.next_sequence;
        let entry = WalEntry::new(sequence, operation)?;
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        if let Err(e) = self.write_synced(line.as_bytes()) {
            // Roll back a partial line so later appends stay parseable
            if let Err(rollback) = self.file.set_len(self.len) {
                tracing::error!(error = %rollback, "failed to roll back partial log write");
            }
            return Err(e);
        }

        self.len += line.len() as u64;
        self.next_sequence += 1;
        Ok(sequence)
    }

    fn write_synced(&mut self, bytes: &[u8]) -> Result<(), StorageError> {
        self.file.write_all(bytes)?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Atomically replace the log with the given operations
    ///
    /// Writes a sibling temp file, syncs it and renames it over the log. The
    /// append handle is opened on the temp file before the rename, so on any
    /// error the log and this handle are left as they were.
    pub fn rewrite(&mut self, operations: Vec<Operation>) -> Result<(), StorageError> {
        let tmp_path = self.path.with_extension("compact");
        let written = Self::write_compacted(&tmp_path, operations).and_then(|(file, len, count)| {
            std::fs::rename(&tmp_path, &self.path)?;
            Ok((file, len, count))
        });
        let (file, len, count) = match written {
            Ok(written) => written,
            Err(e) => {
                if let Err(cleanup) = std::fs::remove_file(&tmp_path) {
                    if cleanup.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!(path = %tmp_path.display(), error = %cleanup, "failed to remove compaction file");
                    }
                }
                return Err(e);
            }
        };

        if let Some(parent) = self.path.parent() {
            // Persist the rename itself
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }

        self.file = file;
        self.len = len;
        self.next_sequence = count;
        Ok(())
    }

    /// Write `operations` to `path`, returning an append handle, byte length and entry count
    fn write_compacted(
        path: &Path,
        operations: Vec<Operation>,
    ) -> Result<(File, u64, u64), StorageError> {
        let mut tmp = File::create(path)?;
        let mut len = 0u64;
        let mut count = 0u64;
        for operation in operations {
            let entry = WalEntry::new(count, operation)?;
            let mut line = serde_json::to_string(&entry)?;
            line.push('\n');
            tmp.write_all(line.as_bytes())?;
            len += line.len() as u64;
            count += 1;
        }
        tmp.sync_all()?;
        drop(tmp);

        let file = OpenOptions::new().append(true).open(path)?;
        Ok((file, len, count))
    }

    /// Sequence number the next append will use
    pub fn sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Bytes of valid log on disk
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
