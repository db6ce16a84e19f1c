// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn normalize_applies_defaults() {
    let record = PostedEvent::new("com.app.mail", 1000).normalize().unwrap();

    assert_eq!(record.source, "com.app.mail");
    assert_eq!(record.title.as_deref(), Some(DEFAULT_TITLE));
    assert_eq!(record.body.as_deref(), Some(""));
    assert_eq!(record.observed_at_millis, 1000);
    assert!(!record.sensitive);
}

#[test]
fn normalize_keeps_supplied_fields() {
    let record = PostedEvent::new("com.app.mail", 1000)
        .with_title("Inbox")
        .with_body("3 new messages")
        .with_sensitive(true)
        .normalize()
        .unwrap();

    assert_eq!(record.title.as_deref(), Some("Inbox"));
    assert_eq!(record.body.as_deref(), Some("3 new messages"));
    assert!(record.sensitive);
}

#[parameterized(
    empty = { "" },
    spaces = { "   " },
    newline = { "\n" },
)]
fn normalize_rejects_blank_source(source: &str) {
    let result = PostedEvent::new(source, 1000).normalize();
    assert_eq!(result, Err(MalformedEvent::EmptySource));
}

#[test]
fn normalize_trims_source() {
    let record = PostedEvent::new("  com.app.chat ", 5).normalize().unwrap();
    assert_eq!(record.source, "com.app.chat");
}

#[test]
fn normalize_rejects_negative_post_time() {
    let result = PostedEvent::new("com.app.mail", -1).normalize();
    assert!(matches!(
        result,
        Err(MalformedEvent::InvalidTimestamp { posted_at_millis: -1, .. })
    ));
}

#[test]
fn posted_event_accepts_source_field_names() {
    let json = r#"{"sourceIdentity":"com.app.x","titleOpt":"Hi","postedAtMillis":42,"sensitiveOpt":true}"#;
    let event: PostedEvent = serde_json::from_str(json).unwrap();

    assert_eq!(event.source, "com.app.x");
    assert_eq!(event.title.as_deref(), Some("Hi"));
    assert_eq!(event.body, None);
    assert_eq!(event.posted_at_millis, 42);
    assert_eq!(event.sensitive, Some(true));
}

#[test]
fn posted_event_accepts_native_field_names() {
    let json = r#"{"source":"com.app.x","posted_at_millis":7}"#;
    let event: PostedEvent = serde_json::from_str(json).unwrap();
    assert_eq!(event, PostedEvent::new("com.app.x", 7));
}

#[test]
fn removed_event_source_validation() {
    assert_eq!(RemovedEvent::new(" mail ").normalized_source(), Ok("mail"));
    assert_eq!(
        RemovedEvent::new("").normalized_source(),
        Err(MalformedEvent::EmptySource)
    );
}
