// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-event results of ingestion

use nlog_core::{DedupKey, MalformedEvent, RecordId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why one event or request could not be applied
///
/// None of these are fatal: each is confined to the event that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    #[error("malformed event: {0}")]
    Malformed(#[from] MalformedEvent),
    #[error("storage unavailable: {reason}")]
    StorageUnavailable { reason: String },
    #[error("unexpected failure: {reason}")]
    Unexpected { reason: String },
    #[error("ingest queue is full")]
    QueueFull,
    #[error("ingest pipeline is closed")]
    PipelineClosed,
}

/// What the writer did with one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Stored {
        id: RecordId,
        key: DedupKey,
    },
    DuplicateSuppressed {
        existing: RecordId,
        key: DedupKey,
    },
    /// Removal seen; history kept
    RemovalLogged {
        source: String,
        latest: Option<RecordId>,
    },
    /// Removal seen and the correlated record deleted
    RemovalApplied {
        source: String,
        id: RecordId,
    },
    Purged {
        source: String,
        count: usize,
    },
    Deleted {
        id: RecordId,
        removed: bool,
    },
}

impl IngestOutcome {
    /// Whether stored history changed
    pub fn is_mutation(&self) -> bool {
        match self {
            IngestOutcome::Stored { .. } | IngestOutcome::RemovalApplied { .. } => true,
            IngestOutcome::Purged { count, .. } => *count > 0,
            IngestOutcome::Deleted { removed, .. } => *removed,
            IngestOutcome::DuplicateSuppressed { .. } | IngestOutcome::RemovalLogged { .. } => {
                false
            }
        }
    }
}

/// Immediate answer to a source callback
///
/// The source gets no acknowledgment; this exists for callers that want to
/// observe back-pressure (the daemon protocol, tests).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Submission {
    /// Handed to the writer
    Queued,
    /// Malformed; dropped at the call site
    Rejected,
    /// Queue full; dropped
    Dropped,
    /// Pipeline shut down; dropped
    Closed,
}
