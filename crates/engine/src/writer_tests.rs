// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use nlog_core::{DedupKey, PostedEvent};
use nlog_storage::{FakeStorage, StorageCall};

fn record(source: &str, at: i64) -> NewRecord {
    PostedEvent::new(source, at).normalize().unwrap()
}

struct Harness {
    tx: mpsc::Sender<Command>,
    revisions: watch::Receiver<u64>,
    stats: Arc<IngestStats>,
    handle: tokio::task::JoinHandle<()>,
}

fn start(storage: &FakeStorage, config: IngestConfig) -> Harness {
    let (tx, rx) = mpsc::channel(16);
    let (revision_tx, revisions) = watch::channel(0);
    let stats = Arc::new(IngestStats::default());
    let writer = Writer::new(
        Arc::new(storage.clone()),
        config,
        Arc::clone(&stats),
        revision_tx,
    );
    let handle = tokio::spawn(writer.run(rx));
    Harness {
        tx,
        revisions,
        stats,
        handle,
    }
}

impl Harness {
    async fn send(&self, command: Command) {
        self.tx.send(command).await.unwrap();
    }

    async fn flush(&self) {
        let (respond, reply) = oneshot::channel();
        self.send(Command::Flush { respond }).await;
        reply.await.unwrap();
    }
}

#[tokio::test]
async fn posted_checks_for_duplicate_then_inserts() {
    let storage = FakeStorage::new();
    let h = start(&storage, IngestConfig::default());

    h.send(Command::Posted {
        record: record("com.mail", 1000),
    })
    .await;
    h.send(Command::Posted {
        record: record("com.mail", 1000),
    })
    .await;
    h.flush().await;

    assert_eq!(storage.len(), 1);
    assert_eq!(
        storage.calls(),
        vec![StorageCall::Insert {
            key: DedupKey::new("com.mail", 1000)
        }]
    );
    let stats = h.stats.snapshot();
    assert_eq!(stats.stored, 1);
    assert_eq!(stats.duplicates, 1);
}

#[tokio::test]
async fn revision_bumps_only_on_mutation() {
    let storage = FakeStorage::new();
    let h = start(&storage, IngestConfig::default());

    h.send(Command::Posted {
        record: record("com.mail", 1000),
    })
    .await;
    h.flush().await;
    assert_eq!(*h.revisions.borrow(), 1);

    h.send(Command::Posted {
        record: record("com.mail", 1000),
    })
    .await;
    h.send(Command::Removed {
        source: "com.mail".to_string(),
    })
    .await;
    h.flush().await;
    assert_eq!(*h.revisions.borrow(), 1);
}

#[tokio::test]
async fn preserve_policy_keeps_record_on_removal() {
    let storage = FakeStorage::new();
    let h = start(&storage, IngestConfig::default());

    h.send(Command::Posted {
        record: record("com.mail", 1000),
    })
    .await;
    h.send(Command::Removed {
        source: "com.mail".to_string(),
    })
    .await;
    h.flush().await;

    assert_eq!(storage.len(), 1);
    assert_eq!(h.stats.snapshot().removals_applied, 0);
}

#[tokio::test]
async fn delete_most_recent_policy_removes_latest_for_source() {
    let storage = FakeStorage::new();
    let config = IngestConfig {
        removal_policy: RemovalPolicy::DeleteMostRecent,
        ..IngestConfig::default()
    };
    let h = start(&storage, config);

    h.send(Command::Posted {
        record: record("com.mail", 1000),
    })
    .await;
    h.send(Command::Posted {
        record: record("com.mail", 2000),
    })
    .await;
    h.send(Command::Removed {
        source: "com.mail".to_string(),
    })
    .await;
    h.flush().await;

    let remaining = storage.query_recent(10).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].observed_at_millis, 1000);
    assert!(storage
        .calls()
        .contains(&StorageCall::DeleteById { id: RecordId(1) }));
}

#[tokio::test]
async fn delete_most_recent_targets_last_inserted_not_newest_post() {
    let storage = FakeStorage::new();
    let config = IngestConfig {
        removal_policy: RemovalPolicy::DeleteMostRecent,
        ..IngestConfig::default()
    };
    let h = start(&storage, config);

    h.send(Command::Posted {
        record: record("com.mail", 2000),
    })
    .await;
    h.send(Command::Posted {
        record: record("com.mail", 1000),
    })
    .await;
    h.send(Command::Removed {
        source: "com.mail".to_string(),
    })
    .await;
    h.flush().await;

    let remaining = storage.query_recent(10).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].observed_at_millis, 2000);
    assert!(storage
        .calls()
        .contains(&StorageCall::DeleteById { id: RecordId(1) }));
}

#[tokio::test]
async fn removal_without_recent_insert_falls_back_to_storage() {
    let storage = FakeStorage::new();
    storage.insert(record("com.chat", 500)).unwrap();
    let config = IngestConfig {
        removal_policy: RemovalPolicy::DeleteMostRecent,
        ..IngestConfig::default()
    };
    let h = start(&storage, config);

    h.send(Command::Removed {
        source: "com.chat".to_string(),
    })
    .await;
    h.flush().await;

    assert!(storage.is_empty());
    assert_eq!(h.stats.snapshot().removals_applied, 1);
}

#[tokio::test]
async fn removal_for_unknown_source_is_only_logged() {
    let storage = FakeStorage::new();
    let config = IngestConfig {
        removal_policy: RemovalPolicy::DeleteMostRecent,
        ..IngestConfig::default()
    };
    let h = start(&storage, config);

    h.send(Command::Removed {
        source: "com.none".to_string(),
    })
    .await;
    h.flush().await;

    assert!(storage.calls().is_empty());
}

#[tokio::test]
async fn storage_failure_is_confined_to_one_event() {
    let storage = FakeStorage::new();
    storage.fail_next_inserts(1);
    let h = start(&storage, IngestConfig::default());

    h.send(Command::Posted {
        record: record("com.mail", 1000),
    })
    .await;
    h.send(Command::Posted {
        record: record("com.mail", 2000),
    })
    .await;
    h.flush().await;

    let stored = storage.query_recent(10).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].observed_at_millis, 2000);
    let stats = h.stats.snapshot();
    assert_eq!(stats.storage_failures, 1);
    assert_eq!(stats.stored, 1);
}

#[tokio::test]
async fn storage_panic_is_confined_to_one_event() {
    let storage = FakeStorage::new();
    storage.panic_next();
    let h = start(&storage, IngestConfig::default());

    h.send(Command::Posted {
        record: record("com.mail", 1000),
    })
    .await;
    h.send(Command::Posted {
        record: record("com.mail", 2000),
    })
    .await;
    h.flush().await;

    assert_eq!(storage.len(), 1);
    assert_eq!(h.stats.snapshot().unexpected_failures, 1);
}

#[tokio::test]
async fn purge_replies_with_count() {
    let storage = FakeStorage::new();
    let h = start(&storage, IngestConfig::default());

    for at in [1000, 2000, 3000] {
        h.send(Command::Posted {
            record: record("com.app.x", at),
        })
        .await;
    }
    let (respond, reply) = oneshot::channel();
    h.send(Command::PurgeSource {
        source: "com.app.x".to_string(),
        respond,
    })
    .await;

    assert_eq!(reply.await.unwrap(), Ok(3));
    assert_eq!(h.stats.snapshot().purged, 3);
}

#[tokio::test]
async fn shutdown_drains_queued_events_before_exit() {
    let storage = FakeStorage::new();
    storage.set_delay(Some(Duration::from_millis(20)));
    let h = start(&storage, IngestConfig::default());

    h.send(Command::Posted {
        record: record("com.mail", 1000),
    })
    .await;
    h.send(Command::Posted {
        record: record("com.mail", 2000),
    })
    .await;
    h.send(Command::Shutdown).await;

    h.handle.await.unwrap();
    assert_eq!(storage.len(), 2);
    assert!(h.tx.is_closed());
}

#[tokio::test]
async fn timed_out_insert_is_reconciled_when_it_lands() {
    let storage = FakeStorage::new();
    storage.set_delay(Some(Duration::from_millis(300)));
    let config = IngestConfig {
        write_timeout: Duration::from_millis(50),
        ..IngestConfig::default()
    };
    let mut h = start(&storage, config);

    h.send(Command::Posted {
        record: record("com.mail", 1000),
    })
    .await;
    h.flush().await;
    assert_eq!(h.stats.snapshot().storage_failures, 1);
    assert_eq!(*h.revisions.borrow_and_update(), 0);

    tokio::time::timeout(Duration::from_secs(2), h.revisions.changed())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(storage.len(), 1);
    let stats = h.stats.snapshot();
    assert_eq!(stats.stored, 1);
    assert_eq!(stats.storage_failures, 0);
    assert_eq!(stats.late_commits, 1);
}

#[tokio::test]
async fn late_insert_feeds_removal_correlation() {
    let storage = FakeStorage::new();
    storage.set_delay(Some(Duration::from_millis(150)));
    let config = IngestConfig {
        write_timeout: Duration::from_millis(30),
        removal_policy: RemovalPolicy::DeleteMostRecent,
        ..IngestConfig::default()
    };
    let mut h = start(&storage, config);

    h.send(Command::Posted {
        record: record("com.mail", 1000),
    })
    .await;
    h.flush().await;
    tokio::time::timeout(Duration::from_secs(2), h.revisions.changed())
        .await
        .unwrap()
        .unwrap();

    storage.set_delay(None);
    h.send(Command::Removed {
        source: "com.mail".to_string(),
    })
    .await;
    h.flush().await;

    assert!(storage.is_empty());
    assert_eq!(h.stats.snapshot().removals_applied, 1);
}

#[tokio::test]
async fn shutdown_waits_for_timed_out_writes() {
    let storage = FakeStorage::new();
    storage.set_delay(Some(Duration::from_millis(200)));
    let config = IngestConfig {
        write_timeout: Duration::from_millis(20),
        ..IngestConfig::default()
    };
    let h = start(&storage, config);

    h.send(Command::Posted {
        record: record("com.mail", 1000),
    })
    .await;
    h.send(Command::Shutdown).await;
    h.handle.await.unwrap();

    assert_eq!(storage.len(), 1);
    assert_eq!(h.stats.snapshot().late_commits, 1);
}

#[tokio::test]
async fn run_storage_times_out() {
    let storage = Arc::new(FakeStorage::new());
    let result = run_storage(&storage, Duration::from_millis(20), "slow", |_| {
        std::thread::sleep(Duration::from_millis(200));
        Ok(())
    })
    .await;

    match result {
        Err(IngestError::StorageUnavailable { reason }) => assert!(reason.contains("slow")),
        other => panic!("expected timeout, got {:?}", other),
    }
}

#[tokio::test]
async fn run_storage_reports_panic_message() {
    let storage = Arc::new(FakeStorage::new());
    let result: Result<(), _> = run_storage(&storage, Duration::from_secs(1), "boom", |_| {
        panic!("disk on fire")
    })
    .await;

    match result {
        Err(IngestError::Unexpected { reason }) => assert!(reason.contains("disk on fire")),
        other => panic!("expected unexpected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn run_storage_maps_storage_errors() {
    let storage = Arc::new(FakeStorage::new());
    let result: Result<(), _> = run_storage(&storage, Duration::from_secs(1), "insert", |_| {
        Err(StorageError::Unavailable("full".to_string()))
    })
    .await;

    assert!(matches!(
        result,
        Err(IngestError::StorageUnavailable { .. })
    ));
}
