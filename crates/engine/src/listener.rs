// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Callback surface for the event source

use crate::error::Submission;
use crate::pipeline::IngestPipeline;
use nlog_core::{Clock, ConnectionTracker, PostedEvent, RemovedEvent};

/// Constructed once at startup and handed to whatever delivers source events
///
/// Every method is safe to call from any thread and returns immediately.
#[derive(Clone)]
pub struct NotificationListener<C: Clock> {
    pipeline: IngestPipeline,
    tracker: ConnectionTracker<C>,
}

impl<C: Clock> NotificationListener<C> {
    pub fn new(pipeline: IngestPipeline, tracker: ConnectionTracker<C>) -> Self {
        Self { pipeline, tracker }
    }

    pub fn on_posted(&self, event: PostedEvent) -> Submission {
        if !self.tracker.is_live() {
            tracing::debug!(source = %event.source, "notification posted while disconnected");
        }
        self.pipeline.on_posted(event)
    }

    pub fn on_removed(&self, event: RemovedEvent) -> Submission {
        if !self.tracker.is_live() {
            tracing::debug!(source = %event.source, "notification removed while disconnected");
        }
        self.pipeline.on_removed(event)
    }

    pub fn on_connected(&self) {
        self.tracker.on_connected();
    }

    pub fn on_disconnected(&self) {
        self.tracker.on_disconnected();
    }

    pub fn connection(&self) -> &ConnectionTracker<C> {
        &self.tracker
    }

    pub fn pipeline(&self) -> &IngestPipeline {
        &self.pipeline
    }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
