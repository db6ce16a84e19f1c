// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ingestion entry points and writer task handle

use crate::config::IngestConfig;
use crate::error::{IngestError, Submission};
use crate::stats::{IngestStats, IngestStatsSnapshot};
use crate::writer::{Command, Writer};
use nlog_core::{PostedEvent, RecordId, RemovedEvent};
use nlog_storage::Storage;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

/// Cloneable handle feeding the single writer
///
/// `on_posted` and `on_removed` never block and never fail: whatever happens
/// to the event is counted and logged, and the `Submission` only reports
/// whether it made it onto the queue.
#[derive(Clone)]
pub struct IngestPipeline {
    tx: mpsc::Sender<Command>,
    stats: Arc<IngestStats>,
    revisions: watch::Receiver<u64>,
}

/// Join handle for the writer spawned by `IngestPipeline::spawn`
pub struct WriterTask {
    handle: JoinHandle<()>,
    tx: mpsc::WeakSender<Command>,
}

impl IngestPipeline {
    /// Spawn the writer on the current tokio runtime
    pub fn spawn<S: Storage>(storage: Arc<S>, config: IngestConfig) -> (Self, WriterTask) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let (revision_tx, revisions) = watch::channel(0);
        let stats = Arc::new(IngestStats::default());

        let writer = Writer::new(storage, config, Arc::clone(&stats), revision_tx);
        let handle = tokio::spawn(writer.run(rx));

        let task = WriterTask {
            handle,
            tx: tx.downgrade(),
        };
        (
            Self {
                tx,
                stats,
                revisions,
            },
            task,
        )
    }

    pub fn on_posted(&self, event: PostedEvent) -> Submission {
        self.stats.posted();
        match event.normalize() {
            Ok(record) => self.submit(Command::Posted { record }),
            Err(e) => {
                self.stats.record(&Err(IngestError::Malformed(e.clone())));
                tracing::warn!(error = %e, "dropping malformed notification");
                Submission::Rejected
            }
        }
    }

    pub fn on_removed(&self, event: RemovedEvent) -> Submission {
        self.stats.removed();
        match event.normalized_source() {
            Ok(source) => self.submit(Command::Removed {
                source: source.to_string(),
            }),
            Err(e) => {
                self.stats.record(&Err(IngestError::Malformed(e.clone())));
                tracing::warn!(error = %e, "dropping malformed removal");
                Submission::Rejected
            }
        }
    }

    /// Delete every record for `source` through the writer
    pub async fn purge(&self, source: &str) -> Result<usize, IngestError> {
        let (respond, reply) = oneshot::channel();
        self.request(Command::PurgeSource {
            source: source.to_string(),
            respond,
        })
        .await?;
        reply.await.map_err(|_| IngestError::PipelineClosed)?
    }

    /// Delete one record through the writer
    pub async fn delete(&self, id: RecordId) -> Result<bool, IngestError> {
        let (respond, reply) = oneshot::channel();
        self.request(Command::DeleteRecord { id, respond }).await?;
        reply.await.map_err(|_| IngestError::PipelineClosed)?
    }

    /// Wait until every command queued before this call has been processed
    pub async fn flush(&self) -> Result<(), IngestError> {
        let (respond, reply) = oneshot::channel();
        self.request(Command::Flush { respond }).await?;
        reply.await.map_err(|_| IngestError::PipelineClosed)
    }

    /// Ask the writer to stop once everything already queued is written
    pub async fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown).await;
    }

    pub fn stats(&self) -> IngestStatsSnapshot {
        self.stats.snapshot()
    }

    /// Revision counter, bumped after every change to stored history
    pub fn revisions(&self) -> watch::Receiver<u64> {
        self.revisions.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn submit(&self, command: Command) -> Submission {
        match self.tx.try_send(command) {
            Ok(()) => Submission::Queued,
            Err(TrySendError::Full(_)) => {
                self.stats.dropped();
                tracing::warn!("ingest queue full, dropping event");
                Submission::Dropped
            }
            Err(TrySendError::Closed(_)) => {
                self.stats.dropped();
                tracing::debug!("ingest pipeline closed, dropping event");
                Submission::Closed
            }
        }
    }

    // Management requests wait for queue space rather than being dropped
    async fn request(&self, command: Command) -> Result<(), IngestError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| IngestError::PipelineClosed)
    }
}

impl WriterTask {
    /// Wait for the writer to exit on its own
    pub async fn join(self) {
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "ingest writer task failed");
        }
    }

    /// Stop the writer after it drains the queue, then wait for it
    pub async fn shutdown(self) {
        if let Some(tx) = self.tx.upgrade() {
            let _ = tx.send(Command::Shutdown).await;
        }
        self.join().await;
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
