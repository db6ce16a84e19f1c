// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stored notification records
//!
//! An `EventRecord` is one observed notification occurrence. Records are
//! immutable once stored; the only mutation is deletion.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Surrogate key assigned by storage on insert, never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Natural dedup key: two posts with the same source and post time are one notification
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DedupKey {
    pub source: String,
    pub observed_at_millis: i64,
}

impl DedupKey {
    pub fn new(source: impl Into<String>, observed_at_millis: i64) -> Self {
        Self {
            source: source.into(),
            observed_at_millis,
        }
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.source, self.observed_at_millis)
    }
}

/// A validated record that has not been assigned an id yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecord {
    pub source: String,
    pub title: Option<String>,
    pub body: Option<String>,
    pub observed_at_millis: i64,
    pub sensitive: bool,
}

impl NewRecord {
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey::new(self.source.clone(), self.observed_at_millis)
    }

    /// Attach the surrogate key assigned by storage
    pub fn with_id(self, id: RecordId) -> EventRecord {
        EventRecord {
            id,
            source: self.source,
            title: self.title,
            body: self.body,
            observed_at_millis: self.observed_at_millis,
            sensitive: self.sensitive,
        }
    }
}

/// One stored notification occurrence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: RecordId,
    pub source: String,
    pub title: Option<String>,
    pub body: Option<String>,
    pub observed_at_millis: i64,
    /// Advisory only; sensitive content is stored like any other
    pub sensitive: bool,
}

impl EventRecord {
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey::new(self.source.clone(), self.observed_at_millis)
    }

    /// Sort key for recency queries: newest post time first, then newest id
    pub fn recency_key(&self) -> (i64, RecordId) {
        (self.observed_at_millis, self.id)
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
