// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::Arc;
use tempfile::TempDir;

fn open_temp() -> (TempDir, WalStorage) {
    let dir = TempDir::new().unwrap();
    let store = WalStorage::open(&dir.path().join("records.wal"), WalStorageConfig::default()).unwrap();
    (dir, store)
}

fn posted(source: &str, at: i64) -> NewRecord {
    NewRecord {
        source: source.to_string(),
        title: Some("title".to_string()),
        body: Some("body".to_string()),
        observed_at_millis: at,
        sensitive: false,
    }
}

#[test]
fn insert_assigns_increasing_ids() {
    let (_dir, store) = open_temp();

    assert_eq!(store.insert(posted("mail", 1)).unwrap(), Inserted::New(RecordId(0)));
    assert_eq!(store.insert(posted("mail", 2)).unwrap(), Inserted::New(RecordId(1)));
    assert_eq!(store.len(), 2);
}

#[test]
fn insert_coalesces_identical_dedup_key() {
    let (_dir, store) = open_temp();

    let first = store.insert(posted("mail", 1000)).unwrap();
    let mut again = posted("mail", 1000);
    again.title = Some("different".to_string());
    let second = store.insert(again).unwrap();

    assert_eq!(first, Inserted::New(RecordId(0)));
    assert_eq!(second, Inserted::Duplicate(RecordId(0)));
    assert_eq!(store.len(), 1);
    // First seen wins
    let stored = store.query_recent(1).unwrap();
    assert_eq!(stored[0].title.as_deref(), Some("title"));
}

#[test]
fn query_recent_orders_by_post_time() {
    let (_dir, store) = open_temp();
    store.insert(posted("a", 2000)).unwrap();
    store.insert(posted("b", 1000)).unwrap();
    store.insert(posted("c", 3000)).unwrap();

    let sources: Vec<_> = store
        .query_recent(10)
        .unwrap()
        .into_iter()
        .map(|r| r.source)
        .collect();
    assert_eq!(sources, vec!["c", "a", "b"]);
}

#[test]
fn delete_by_source_is_idempotent() {
    let (_dir, store) = open_temp();
    for at in [1, 2, 3] {
        store.insert(posted("com.app.x", at)).unwrap();
    }
    store.insert(posted("com.app.y", 1)).unwrap();

    assert_eq!(store.delete_by_source("com.app.x").unwrap(), 3);
    assert_eq!(store.delete_by_source("com.app.x").unwrap(), 0);

    let remaining = store.query_recent(10).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].source, "com.app.y");
}

#[test]
fn delete_by_source_without_matches_writes_nothing() {
    let (_dir, store) = open_temp();
    store.insert(posted("mail", 1)).unwrap();
    let before = std::fs::metadata(store.path()).unwrap().len();

    assert_eq!(store.delete_by_source("chat").unwrap(), 0);
    assert_eq!(std::fs::metadata(store.path()).unwrap().len(), before);
}

#[test]
fn delete_by_id_reports_presence() {
    let (_dir, store) = open_temp();
    let id = store.insert(posted("mail", 1)).unwrap().id();

    assert!(store.delete_by_id(id).unwrap());
    assert!(!store.delete_by_id(id).unwrap());
    assert!(store.is_empty());
}

#[test]
fn reopen_restores_records_and_id_counter() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("records.wal");

    {
        let store = WalStorage::open(&path, WalStorageConfig::default()).unwrap();
        store.insert(posted("mail", 1)).unwrap();
        store.insert(posted("chat", 2)).unwrap();
        store.insert(posted("sms", 3)).unwrap();
        store.delete_by_id(RecordId(2)).unwrap();
    }

    let store = WalStorage::open(&path, WalStorageConfig::default()).unwrap();
    assert_eq!(store.len(), 2);
    assert_eq!(store.insert(posted("mail", 9)).unwrap(), Inserted::New(RecordId(3)));
    // Dedup index survives restart
    assert_eq!(
        store.insert(posted("chat", 2)).unwrap(),
        Inserted::Duplicate(RecordId(1))
    );
}

#[test]
fn compaction_keeps_ids_and_counter() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("records.wal");

    {
        let store = WalStorage::open(&path, WalStorageConfig::default()).unwrap();
        for at in 0..10 {
            store.insert(posted("noisy", at)).unwrap();
        }
        store.insert(posted("keep", 100)).unwrap();
        store.delete_by_source("noisy").unwrap();

        let before = std::fs::metadata(&path).unwrap().len();
        store.compact().unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() < before);
    }

    let store = WalStorage::open(&path, WalStorageConfig::default()).unwrap();
    let records = store.query_recent(10).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, RecordId(10));
    assert_eq!(store.insert(posted("new", 1)).unwrap(), Inserted::New(RecordId(11)));
}

#[test]
fn automatic_compaction_after_threshold() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("records.wal");
    let store = WalStorage::open(
        &path,
        WalStorageConfig {
            compact_after_deletes: Some(3),
        },
    )
    .unwrap();

    for at in 0..3 {
        store.insert(posted("x", at)).unwrap();
    }
    store.delete_by_source("x").unwrap();

    // Only the id reservation is left in the log
    let replay = Wal::replay(&path).unwrap();
    assert_eq!(
        replay.operations,
        vec![Operation::Reserve {
            next_id: RecordId(3)
        }]
    );
}

#[test]
fn concurrent_inserts_of_same_key_store_one_record() {
    let (_dir, store) = open_temp();
    let store = Arc::new(store);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || store.insert(posted("mail", 1000)).unwrap())
        })
        .collect();
    let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(store.len(), 1);
    assert_eq!(
        outcomes.iter().filter(|o| matches!(o, Inserted::New(_))).count(),
        1
    );
}

#[test]
fn open_fails_when_path_is_a_directory() {
    let dir = TempDir::new().unwrap();
    assert!(WalStorage::open(dir.path(), WalStorageConfig::default()).is_err());
}
