// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inbound events delivered by the notification source
//!
//! The source hands over loosely-typed payloads. `PostedEvent::normalize`
//! turns one into a `NewRecord`, applying field defaults and rejecting
//! payloads that cannot identify their originating package.

use crate::record::NewRecord;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Title stored when the source omits one
pub const DEFAULT_TITLE: &str = "No Title";
/// Body stored when the source omits one
pub const DEFAULT_BODY: &str = "";

/// Errors for payloads that cannot become a record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedEvent {
    #[error("event has an empty source identity")]
    EmptySource,
    #[error("event from {package} has invalid post time {posted_at_millis}")]
    InvalidTimestamp {
        package: String,
        posted_at_millis: i64,
    },
}

/// A notification was posted by some application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedEvent {
    #[serde(alias = "sourceIdentity")]
    pub source: String,
    #[serde(default, alias = "titleOpt")]
    pub title: Option<String>,
    #[serde(default, alias = "bodyOpt")]
    pub body: Option<String>,
    #[serde(alias = "postedAtMillis")]
    pub posted_at_millis: i64,
    #[serde(default, alias = "sensitiveOpt")]
    pub sensitive: Option<bool>,
}

impl PostedEvent {
    pub fn new(source: impl Into<String>, posted_at_millis: i64) -> Self {
        Self {
            source: source.into(),
            title: None,
            body: None,
            posted_at_millis,
            sensitive: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_sensitive(mut self, sensitive: bool) -> Self {
        self.sensitive = Some(sensitive);
        self
    }

    /// Validate the payload and fill in defaults
    pub fn normalize(self) -> Result<NewRecord, MalformedEvent> {
        let source = self.source.trim();
        if source.is_empty() {
            return Err(MalformedEvent::EmptySource);
        }
        if self.posted_at_millis < 0 {
            return Err(MalformedEvent::InvalidTimestamp {
                package: source.to_string(),
                posted_at_millis: self.posted_at_millis,
            });
        }

        Ok(NewRecord {
            source: source.to_string(),
            title: Some(self.title.unwrap_or_else(|| DEFAULT_TITLE.to_string())),
            body: Some(self.body.unwrap_or_else(|| DEFAULT_BODY.to_string())),
            observed_at_millis: self.posted_at_millis,
            sensitive: self.sensitive.unwrap_or(false),
        })
    }
}

/// A notification disappeared from the source's display
///
/// Carries only the package; the source gives no per-notification key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovedEvent {
    #[serde(alias = "sourceIdentity")]
    pub source: String,
}

impl RemovedEvent {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Source identity with surrounding whitespace removed, or an error if empty
    pub fn normalized_source(&self) -> Result<&str, MalformedEvent> {
        let source = self.source.trim();
        if source.is_empty() {
            Err(MalformedEvent::EmptySource)
        } else {
            Ok(source)
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
