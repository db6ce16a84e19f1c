// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ingestion counters

use crate::error::{IngestError, IngestOutcome};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters shared by the call sites and the writer
#[derive(Debug, Default)]
pub struct IngestStats {
    posted: AtomicU64,
    removed: AtomicU64,
    stored: AtomicU64,
    duplicates: AtomicU64,
    malformed: AtomicU64,
    dropped: AtomicU64,
    storage_failures: AtomicU64,
    unexpected_failures: AtomicU64,
    removals_applied: AtomicU64,
    purged: AtomicU64,
    late_commits: AtomicU64,
}

/// Point-in-time copy of `IngestStats`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStatsSnapshot {
    pub posted: u64,
    pub removed: u64,
    pub stored: u64,
    pub duplicates: u64,
    pub malformed: u64,
    pub dropped: u64,
    pub storage_failures: u64,
    pub unexpected_failures: u64,
    pub removals_applied: u64,
    pub purged: u64,
    /// Timed-out writes that completed afterwards
    pub late_commits: u64,
}

fn bump(counter: &AtomicU64, by: u64) {
    counter.fetch_add(by, Ordering::Relaxed);
}

impl IngestStats {
    pub(crate) fn posted(&self) {
        bump(&self.posted, 1);
    }

    pub(crate) fn removed(&self) {
        bump(&self.removed, 1);
    }

    pub(crate) fn dropped(&self) {
        bump(&self.dropped, 1);
    }

    /// A write counted as a storage failure completed after its timeout
    pub(crate) fn reconciled(&self) {
        bump(&self.late_commits, 1);
        let _ = self
            .storage_failures
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    /// Count the result of one processed event
    pub(crate) fn record(&self, result: &Result<IngestOutcome, IngestError>) {
        match result {
            Ok(IngestOutcome::Stored { .. }) => bump(&self.stored, 1),
            Ok(IngestOutcome::DuplicateSuppressed { .. }) => bump(&self.duplicates, 1),
            Ok(IngestOutcome::RemovalApplied { .. }) => bump(&self.removals_applied, 1),
            Ok(IngestOutcome::Purged { count, .. }) => bump(&self.purged, *count as u64),
            Ok(IngestOutcome::Deleted { removed: true, .. }) => bump(&self.purged, 1),
            Ok(IngestOutcome::Deleted { removed: false, .. })
            | Ok(IngestOutcome::RemovalLogged { .. }) => {}
            Err(IngestError::Malformed(_)) => bump(&self.malformed, 1),
            Err(IngestError::StorageUnavailable { .. }) => bump(&self.storage_failures, 1),
            Err(IngestError::Unexpected { .. }) => bump(&self.unexpected_failures, 1),
            Err(IngestError::QueueFull) | Err(IngestError::PipelineClosed) => {
                bump(&self.dropped, 1)
            }
        }
    }

    pub fn snapshot(&self) -> IngestStatsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        IngestStatsSnapshot {
            posted: load(&self.posted),
            removed: load(&self.removed),
            stored: load(&self.stored),
            duplicates: load(&self.duplicates),
            malformed: load(&self.malformed),
            dropped: load(&self.dropped),
            storage_failures: load(&self.storage_failures),
            unexpected_failures: load(&self.unexpected_failures),
            removals_applied: load(&self.removals_applied),
            purged: load(&self.purged),
            late_commits: load(&self.late_commits),
        }
    }
}
