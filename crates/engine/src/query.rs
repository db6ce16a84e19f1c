// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read side of the store

use crate::error::IngestError;
use crate::pipeline::IngestPipeline;
use crate::writer::run_storage;
use nlog_core::EventRecord;
use nlog_storage::Storage;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Reads never go through the writer queue
const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Read-only view of stored history plus the purge entry point
pub struct QueryFacade<S> {
    storage: Arc<S>,
    pipeline: IngestPipeline,
}

impl<S> Clone for QueryFacade<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            pipeline: self.pipeline.clone(),
        }
    }
}

impl<S: Storage> QueryFacade<S> {
    pub fn new(storage: Arc<S>, pipeline: IngestPipeline) -> Self {
        Self { storage, pipeline }
    }

    /// Up to `limit` records, newest first
    pub async fn list_recent(&self, limit: usize) -> Result<Vec<EventRecord>, IngestError> {
        run_storage(&self.storage, READ_TIMEOUT, "query_recent", move |s| {
            s.query_recent(limit)
        })
        .await
    }

    /// Stream of top-`limit` snapshots, one per change to stored history
    pub fn subscribe_recent(&self, limit: usize) -> RecentSubscription<S> {
        RecentSubscription {
            storage: Arc::clone(&self.storage),
            revisions: self.pipeline.revisions(),
            limit,
            started: false,
        }
    }

    pub async fn purge(&self, source: &str) -> Result<usize, IngestError> {
        self.pipeline.purge(source).await
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    pub fn pipeline(&self) -> &IngestPipeline {
        &self.pipeline
    }
}

/// Live top-N view returned by `QueryFacade::subscribe_recent`
///
/// The first `next` yields the current snapshot. Later calls wait for the
/// next revision; several mutations in a burst produce one snapshot.
pub struct RecentSubscription<S> {
    storage: Arc<S>,
    revisions: watch::Receiver<u64>,
    limit: usize,
    started: bool,
}

impl<S: Storage> RecentSubscription<S> {
    /// Next snapshot, or `None` once the pipeline has shut down
    pub async fn next(&mut self) -> Option<Vec<EventRecord>> {
        loop {
            if self.started {
                self.revisions.changed().await.ok()?;
            } else {
                self.started = true;
            }
            let _ = self.revisions.borrow_and_update();

            let limit = self.limit;
            match run_storage(&self.storage, READ_TIMEOUT, "query_recent", move |s| {
                s.query_recent(limit)
            })
            .await
            {
                Ok(records) => return Some(records),
                Err(e) => {
                    tracing::warn!(error = %e, "subscription snapshot failed; waiting for next change")
                }
            }
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod tests;
