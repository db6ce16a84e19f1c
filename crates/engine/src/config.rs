// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ingestion tunables

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What a removed-notification signal does to stored history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RemovalPolicy {
    /// Log the removal and keep the record
    #[default]
    Preserve,
    /// Delete the record last inserted for the source, which is not
    /// necessarily the one with the newest post time. Falls back to the newest
    /// stored record when nothing was inserted since startup. The source gives
    /// no per-notification key, so this can hit the wrong record when one app
    /// posts several notifications concurrently.
    DeleteMostRecent,
}

/// Configuration for the ingestion pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Commands buffered between the source callbacks and the writer
    pub queue_capacity: usize,
    /// Latency bound for a single storage operation
    #[serde(with = "humantime_serde")]
    pub write_timeout: Duration,
    /// Posts from one source within this many milliseconds of a stored record
    /// are duplicates of it. 0 means exact post-time match.
    pub dedup_tolerance_ms: u64,
    pub removal_policy: RemovalPolicy,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            write_timeout: Duration::from_secs(2),
            dedup_tolerance_ms: 0,
            removal_policy: RemovalPolicy::Preserve,
        }
    }
}
