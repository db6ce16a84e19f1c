// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn new_record(source: &str, at: i64) -> NewRecord {
    NewRecord {
        source: source.to_string(),
        title: Some("Hello".to_string()),
        body: None,
        observed_at_millis: at,
        sensitive: false,
    }
}

#[test]
fn with_id_keeps_fields() {
    let record = new_record("mail", 1000).with_id(RecordId(7));
    assert_eq!(record.id, RecordId(7));
    assert_eq!(record.source, "mail");
    assert_eq!(record.title.as_deref(), Some("Hello"));
    assert_eq!(record.body, None);
    assert_eq!(record.observed_at_millis, 1000);
}

#[test]
fn dedup_key_ignores_content() {
    let a = new_record("mail", 1000);
    let mut b = new_record("mail", 1000);
    b.title = Some("Different".to_string());
    assert_eq!(a.dedup_key(), b.dedup_key());
    assert_ne!(a.dedup_key(), new_record("mail", 1001).dedup_key());
}

#[test]
fn dedup_keys_order_by_source_then_time() {
    let mut keys = vec![
        DedupKey::new("mail", 2000),
        DedupKey::new("chat", 3000),
        DedupKey::new("mail", 1000),
    ];
    keys.sort();
    assert_eq!(
        keys,
        vec![
            DedupKey::new("chat", 3000),
            DedupKey::new("mail", 1000),
            DedupKey::new("mail", 2000),
        ]
    );
}

#[test]
fn record_id_serializes_as_number() {
    let json = serde_json::to_string(&RecordId(42)).unwrap();
    assert_eq!(json, "42");
}

#[test]
fn absent_title_survives_serialization() {
    let mut record = new_record("mail", 1).with_id(RecordId(1));
    record.title = None;
    let json = serde_json::to_string(&record).unwrap();
    let back: EventRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(back.title, None);
    assert_eq!(back, record);
}
