// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single writer task
//!
//! All mutations reach storage through this loop, one command at a time, so
//! the dedup check and the insert for a key can never interleave with another
//! insert. Each command produces its own `Result`, which is counted and
//! logged here and goes no further.
//!
//! A mutation that exceeds the write timeout is reported as
//! `StorageUnavailable` but keeps running on its blocking thread. The writer
//! holds on to it and reconciles stats, revision and removal correlation once
//! it finishes.

use crate::config::{IngestConfig, RemovalPolicy};
use crate::error::{IngestError, IngestOutcome};
use crate::stats::IngestStats;
use nlog_core::{DedupKey, NewRecord, RecordId};
use nlog_storage::{Inserted, Storage, StorageError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle, JoinSet};

/// Work handed from the call sites to the writer
pub(crate) enum Command {
    Posted {
        record: NewRecord,
    },
    Removed {
        source: String,
    },
    PurgeSource {
        source: String,
        respond: oneshot::Sender<Result<usize, IngestError>>,
    },
    DeleteRecord {
        id: RecordId,
        respond: oneshot::Sender<Result<bool, IngestError>>,
    },
    /// Reply once everything queued before this is processed
    Flush {
        respond: oneshot::Sender<()>,
    },
    /// Stop after everything queued before this
    Shutdown,
}

pub(crate) struct Writer<S> {
    storage: Arc<S>,
    config: IngestConfig,
    stats: Arc<IngestStats>,
    revision: watch::Sender<u64>,
    /// Last id inserted per source, for correlating removals
    last_inserted: HashMap<String, RecordId>,
    /// Mutations that timed out but are still running
    late: JoinSet<Result<IngestOutcome, IngestError>>,
}

/// Result of a mutation run under the write timeout
enum Attempt<T> {
    Done(Result<T, IngestError>),
    /// Timed out; the storage call is still running
    Late(JoinHandle<Result<T, StorageError>>, IngestError),
}

impl<S: Storage> Writer<S> {
    pub(crate) fn new(
        storage: Arc<S>,
        config: IngestConfig,
        stats: Arc<IngestStats>,
        revision: watch::Sender<u64>,
    ) -> Self {
        Self {
            storage,
            config,
            stats,
            revision,
            last_inserted: HashMap::new(),
            late: JoinSet::new(),
        }
    }

    /// Process commands until every sender is gone or a shutdown is queued
    pub(crate) async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        tracing::debug!("ingest writer started");

        loop {
            tokio::select! {
                command = rx.recv() => {
                    let Some(command) = command else { break };
                    if let Command::Shutdown = command {
                        rx.close();
                        // Drain what was queued before the shutdown request
                        while let Ok(command) = rx.try_recv() {
                            self.drain(command).await;
                        }
                        break;
                    }
                    self.handle(command).await;
                }
                Some(joined) = self.late.join_next(), if !self.late.is_empty() => {
                    self.reconcile(joined);
                }
            }
        }

        while let Some(joined) = self.late.join_next().await {
            self.reconcile(joined);
        }

        tracing::debug!("ingest writer stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Posted { record } => {
                let result = self.posted(record).await;
                self.finish(&result);
            }
            Command::Removed { source } => {
                let result = self.removed(source).await;
                self.finish(&result);
            }
            Command::PurgeSource { source, respond } => {
                let result = self.purge(source).await;
                self.finish(&result);
                let _ = respond.send(result.map(|outcome| match outcome {
                    IngestOutcome::Purged { count, .. } => count,
                    _ => 0,
                }));
            }
            Command::DeleteRecord { id, respond } => {
                let result = self.delete(id).await;
                self.finish(&result);
                let _ = respond.send(result.map(|outcome| {
                    matches!(outcome, IngestOutcome::Deleted { removed: true, .. })
                }));
            }
            Command::Flush { respond } => {
                let _ = respond.send(());
            }
            Command::Shutdown => {}
        }
    }

    async fn drain(&mut self, command: Command) {
        match command {
            Command::Posted { record } => {
                let result = self.posted(record).await;
                self.finish(&result);
            }
            Command::Removed { source } => {
                let result = self.removed(source).await;
                self.finish(&result);
            }
            Command::PurgeSource { respond, .. } => {
                let _ = respond.send(Err(IngestError::PipelineClosed));
            }
            Command::DeleteRecord { respond, .. } => {
                let _ = respond.send(Err(IngestError::PipelineClosed));
            }
            Command::Flush { respond } => {
                let _ = respond.send(());
            }
            Command::Shutdown => {}
        }
    }

    fn finish(&self, result: &Result<IngestOutcome, IngestError>) {
        self.stats.record(result);
        log_outcome(result);
        if matches!(result, Ok(outcome) if outcome.is_mutation()) {
            self.revision.send_modify(|revision| *revision += 1);
        }
    }

    /// Account for a timed-out mutation that has now finished
    fn reconcile(&mut self, joined: Result<Result<IngestOutcome, IngestError>, JoinError>) {
        match joined {
            Ok(Ok(outcome)) => {
                tracing::info!(outcome = ?outcome, "timed-out storage call completed late");
                self.stats.reconciled();
                match &outcome {
                    IngestOutcome::Stored { id, key } => self.note_inserted(&key.source, *id),
                    IngestOutcome::RemovalApplied { id, .. }
                    | IngestOutcome::Deleted { id, removed: true } => {
                        let id = *id;
                        self.last_inserted.retain(|_, last| *last != id);
                    }
                    IngestOutcome::Purged { source, .. } => {
                        self.last_inserted.remove(source);
                    }
                    _ => {}
                }
                self.finish(&Ok(outcome));
            }
            // Already counted as a failure when it timed out
            Ok(Err(e)) => tracing::debug!(error = %e, "timed-out storage call failed"),
            Err(e) => tracing::error!(error = %e, "late storage call could not be joined"),
        }
    }

    fn note_inserted(&mut self, source: &str, id: RecordId) {
        let last = self.last_inserted.entry(source.to_string()).or_insert(id);
        *last = (*last).max(id);
    }

    async fn posted(&mut self, record: NewRecord) -> Result<IngestOutcome, IngestError> {
        let key = record.dedup_key();
        let tolerance = self.config.dedup_tolerance_ms;

        let lookup_key = key.clone();
        let existing = self
            .call("find_duplicate", move |s| s.find_duplicate(&lookup_key, tolerance))
            .await?;
        if let Some(existing) = existing {
            return Ok(IngestOutcome::DuplicateSuppressed { existing, key });
        }

        let late_key = key.clone();
        let inserted = self
            .mutate("insert", move |s| s.insert(record), move |inserted| {
                inserted_outcome(inserted, late_key)
            })
            .await?;
        if let Inserted::New(id) = inserted {
            self.note_inserted(&key.source, id);
        }
        Ok(inserted_outcome(inserted, key))
    }

    async fn removed(&mut self, source: String) -> Result<IngestOutcome, IngestError> {
        let latest = match self.last_inserted.get(&source) {
            Some(id) => Some(*id),
            None => {
                let lookup = source.clone();
                self.call("latest_for_source", move |s| s.latest_for_source(&lookup))
                    .await?
                    .map(|record| record.id)
            }
        };

        let (RemovalPolicy::DeleteMostRecent, Some(id)) = (self.config.removal_policy, latest)
        else {
            return Ok(IngestOutcome::RemovalLogged { source, latest });
        };

        let late_source = source.clone();
        let removed = self
            .mutate("delete_by_id", move |s| s.delete_by_id(id), move |removed| {
                removal_outcome(late_source, id, removed)
            })
            .await?;
        self.last_inserted.remove(&source);
        Ok(removal_outcome(source, id, removed))
    }

    async fn purge(&mut self, source: String) -> Result<IngestOutcome, IngestError> {
        let target = source.clone();
        let late_source = source.clone();
        let count = self
            .mutate(
                "delete_by_source",
                move |s| s.delete_by_source(&target),
                move |count| IngestOutcome::Purged {
                    source: late_source,
                    count,
                },
            )
            .await?;
        self.last_inserted.remove(&source);
        Ok(IngestOutcome::Purged { source, count })
    }

    async fn delete(&mut self, id: RecordId) -> Result<IngestOutcome, IngestError> {
        let removed = self
            .mutate("delete_by_id", move |s| s.delete_by_id(id), move |removed| {
                IngestOutcome::Deleted { id, removed }
            })
            .await?;
        self.last_inserted.retain(|_, last| *last != id);
        Ok(IngestOutcome::Deleted { id, removed })
    }

    async fn call<T, F>(&self, op: &'static str, f: F) -> Result<T, IngestError>
    where
        T: Send + 'static,
        F: FnOnce(&S) -> Result<T, StorageError> + Send + 'static,
    {
        run_storage(&self.storage, self.config.write_timeout, op, f).await
    }

    /// Run a mutation under the write timeout
    ///
    /// On timeout the call is handed to `late` with `outcome` describing what
    /// its eventual result means, and the timeout error is returned.
    async fn mutate<T, F, M>(
        &mut self,
        op: &'static str,
        f: F,
        outcome: M,
    ) -> Result<T, IngestError>
    where
        T: Send + 'static,
        F: FnOnce(&S) -> Result<T, StorageError> + Send + 'static,
        M: FnOnce(T) -> IngestOutcome + Send + 'static,
    {
        match attempt(&self.storage, self.config.write_timeout, op, f).await {
            Attempt::Done(result) => result,
            Attempt::Late(task, error) => {
                self.late
                    .spawn(async move { joined_result(op, task.await).map(outcome) });
                Err(error)
            }
        }
    }
}

fn inserted_outcome(inserted: Inserted, key: DedupKey) -> IngestOutcome {
    match inserted {
        Inserted::New(id) => IngestOutcome::Stored { id, key },
        Inserted::Duplicate(existing) => IngestOutcome::DuplicateSuppressed { existing, key },
    }
}

fn removal_outcome(source: String, id: RecordId, removed: bool) -> IngestOutcome {
    if removed {
        IngestOutcome::RemovalApplied { source, id }
    } else {
        IngestOutcome::RemovalLogged {
            source,
            latest: None,
        }
    }
}

/// Run one storage operation off the async runtime under a latency bound
///
/// A timeout and a storage error both surface as `StorageUnavailable`; a panic
/// inside storage surfaces as `Unexpected`. A timed-out operation keeps running
/// on its blocking thread and may still complete.
pub(crate) async fn run_storage<S, T, F>(
    storage: &Arc<S>,
    timeout: Duration,
    op: &'static str,
    f: F,
) -> Result<T, IngestError>
where
    S: Storage,
    T: Send + 'static,
    F: FnOnce(&S) -> Result<T, StorageError> + Send + 'static,
{
    match attempt(storage, timeout, op, f).await {
        Attempt::Done(result) => result,
        Attempt::Late(_, error) => Err(error),
    }
}

async fn attempt<S, T, F>(
    storage: &Arc<S>,
    timeout: Duration,
    op: &'static str,
    f: F,
) -> Attempt<T>
where
    S: Storage,
    T: Send + 'static,
    F: FnOnce(&S) -> Result<T, StorageError> + Send + 'static,
{
    let storage = Arc::clone(storage);
    let mut task = tokio::task::spawn_blocking(move || f(&storage));

    match tokio::time::timeout(timeout, &mut task).await {
        Err(_) => Attempt::Late(
            task,
            IngestError::StorageUnavailable {
                reason: format!("{} exceeded {}ms", op, timeout.as_millis()),
            },
        ),
        Ok(joined) => Attempt::Done(joined_result(op, joined)),
    }
}

fn joined_result<T>(
    op: &'static str,
    joined: Result<Result<T, StorageError>, JoinError>,
) -> Result<T, IngestError> {
    match joined {
        Err(join_error) => Err(IngestError::Unexpected {
            reason: format!("{} {}", op, join_failure(join_error)),
        }),
        Ok(Err(e)) => Err(IngestError::StorageUnavailable {
            reason: format!("{}: {}", op, e),
        }),
        Ok(Ok(value)) => Ok(value),
    }
}

fn join_failure(error: JoinError) -> String {
    if !error.is_panic() {
        return format!("cancelled: {}", error);
    }
    let payload = error.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}

/// Logging sink for per-event results
pub(crate) fn log_outcome(result: &Result<IngestOutcome, IngestError>) {
    match result {
        Ok(IngestOutcome::Stored { id, key }) => {
            tracing::debug!(%id, source = %key.source, observed_at = key.observed_at_millis, "notification stored")
        }
        Ok(IngestOutcome::DuplicateSuppressed { existing, key }) => tracing::debug!(
            %existing,
            source = %key.source,
            observed_at = key.observed_at_millis,
            "duplicate notification suppressed"
        ),
        Ok(IngestOutcome::RemovalLogged { source, latest }) => tracing::debug!(
            source = %source,
            latest = ?latest.map(|id| id.0),
            "notification removed by source; history kept"
        ),
        Ok(IngestOutcome::RemovalApplied { source, id }) => {
            tracing::info!(%id, source = %source, "notification removed; deleted latest record")
        }
        Ok(IngestOutcome::Purged { source, count }) => {
            tracing::info!(source = %source, count, "purged records for source")
        }
        Ok(IngestOutcome::Deleted { id, removed }) => {
            tracing::info!(%id, removed, "record delete requested")
        }
        Err(e @ IngestError::Malformed(_)) => {
            tracing::warn!(error = %e, "dropping malformed notification")
        }
        Err(e @ IngestError::StorageUnavailable { .. }) => {
            tracing::error!(error = %e, "dropping notification: storage unavailable")
        }
        Err(e @ IngestError::Unexpected { .. }) => {
            tracing::error!(error = %e, "dropping notification after unexpected failure")
        }
        Err(e @ (IngestError::QueueFull | IngestError::PipelineClosed)) => {
            tracing::warn!(error = %e, "dropping notification")
        }
    }
}

#[cfg(test)]
#[path = "writer_tests.rs"]
mod tests;
