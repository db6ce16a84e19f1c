// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end ingestion against the write-ahead log store

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use nlog_core::{ConnectionTracker, PostedEvent, RemovedEvent, SystemClock};
use nlog_engine::{
    IngestConfig, IngestPipeline, NotificationListener, QueryFacade, RemovalPolicy, Submission,
};
use nlog_storage::{Storage, WalStorage, WalStorageConfig};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

fn open(path: &Path) -> Arc<WalStorage> {
    Arc::new(WalStorage::open(path, WalStorageConfig::default()).unwrap())
}

fn start(
    storage: Arc<WalStorage>,
    config: IngestConfig,
) -> (
    NotificationListener<SystemClock>,
    QueryFacade<WalStorage>,
    nlog_engine::WriterTask,
) {
    let (pipeline, task) = IngestPipeline::spawn(Arc::clone(&storage), config);
    let listener =
        NotificationListener::new(pipeline.clone(), ConnectionTracker::new(SystemClock));
    (listener, QueryFacade::new(storage, pipeline), task)
}

#[tokio::test]
async fn history_survives_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.wal");

    {
        let (listener, query, task) = start(open(&path), IngestConfig::default());
        listener.on_connected();
        listener.on_posted(PostedEvent::new("mail", 1000).with_title("A"));
        listener.on_posted(PostedEvent::new("mail", 1000).with_title("B"));
        listener.on_posted(PostedEvent::new("chat", 2000).with_title("C"));
        listener.on_removed(RemovedEvent::new("mail"));
        drop(listener);
        drop(query);
        task.shutdown().await;
    }

    let (listener, query, _task) = start(open(&path), IngestConfig::default());
    let titles: Vec<String> = query
        .list_recent(10)
        .await
        .unwrap()
        .into_iter()
        .filter_map(|r| r.title)
        .collect();
    assert_eq!(titles, vec!["C", "A"]);

    // Dedup covers history written before the restart
    listener.on_posted(PostedEvent::new("mail", 1000).with_title("again"));
    listener.pipeline().flush().await.unwrap();
    assert_eq!(query.list_recent(10).await.unwrap().len(), 2);
    assert_eq!(listener.pipeline().stats().duplicates, 1);
}

#[tokio::test]
async fn purge_is_durable() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.wal");

    {
        let (listener, query, task) = start(open(&path), IngestConfig::default());
        for at in [1, 2, 3] {
            listener.on_posted(PostedEvent::new("com.app.x", at));
        }
        listener.on_posted(PostedEvent::new("com.app.y", 4));
        assert_eq!(query.purge("com.app.x").await, Ok(3));
        assert_eq!(query.purge("com.app.x").await, Ok(0));
        drop(listener);
        drop(query);
        task.shutdown().await;
    }

    let storage = open(&path);
    let left = storage.query_recent(10).unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].source, "com.app.y");
}

#[tokio::test]
async fn ids_keep_increasing_across_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.wal");

    let first_id = {
        let (listener, query, task) = start(open(&path), IngestConfig::default());
        listener.on_posted(PostedEvent::new("mail", 1));
        listener.pipeline().flush().await.unwrap();
        let id = query.list_recent(1).await.unwrap()[0].id;
        assert_eq!(query.purge("mail").await, Ok(1));
        drop(listener);
        drop(query);
        task.shutdown().await;
        id
    };

    let (listener, query, _task) = start(open(&path), IngestConfig::default());
    listener.on_posted(PostedEvent::new("mail", 2));
    listener.pipeline().flush().await.unwrap();
    let second_id = query.list_recent(1).await.unwrap()[0].id;
    assert!(second_id > first_id);
}

#[tokio::test]
async fn delete_most_recent_removes_record_on_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.wal");
    let config = IngestConfig {
        removal_policy: RemovalPolicy::DeleteMostRecent,
        ..IngestConfig::default()
    };

    let (listener, query, _task) = start(open(&path), config);
    listener.on_posted(PostedEvent::new("mail", 1000));
    listener.on_posted(PostedEvent::new("mail", 2000));
    listener.on_removed(RemovedEvent::new("mail"));
    listener.pipeline().flush().await.unwrap();

    let records = query.list_recent(10).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].observed_at_millis, 1000);
    assert_eq!(open(&path).len(), 1);
}

#[tokio::test]
async fn subscription_follows_writes() {
    let dir = tempdir().unwrap();
    let (listener, query, _task) =
        start(open(&dir.path().join("events.wal")), IngestConfig::default());

    let mut sub = query.subscribe_recent(2);
    assert!(sub.next().await.unwrap().is_empty());

    assert_eq!(
        listener.on_posted(PostedEvent::new("mail", 1000)),
        Submission::Queued
    );
    let snapshot = tokio::time::timeout(Duration::from_secs(2), sub.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.len(), 1);
}

#[test]
fn config_parses_from_toml() {
    let config: IngestConfig = toml::from_str(
        r#"
queue_capacity = 16
write_timeout = "500ms"
dedup_tolerance_ms = 250
removal_policy = "delete-most-recent"
"#,
    )
    .unwrap();

    assert_eq!(config.queue_capacity, 16);
    assert_eq!(config.write_timeout, Duration::from_millis(500));
    assert_eq!(config.dedup_tolerance_ms, 250);
    assert_eq!(config.removal_policy, RemovalPolicy::DeleteMostRecent);

    let defaults: IngestConfig = toml::from_str("").unwrap();
    assert_eq!(defaults, IngestConfig::default());
}
