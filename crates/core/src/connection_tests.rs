// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::clock::FakeClock;

#[test]
fn starts_disconnected() {
    let tracker = ConnectionTracker::new(FakeClock::new());
    assert_eq!(tracker.state(), ConnectionState::Disconnected);
    assert!(!tracker.is_live());
    assert_eq!(tracker.snapshot().in_state_millis, None);
}

#[test]
fn connect_then_disconnect() {
    let tracker = ConnectionTracker::new(FakeClock::new());

    tracker.on_connected();
    assert_eq!(tracker.state(), ConnectionState::Connected);
    assert!(tracker.is_live());

    tracker.on_disconnected();
    assert_eq!(tracker.state(), ConnectionState::Disconnected);
    assert!(!tracker.is_live());
}

#[test]
fn repeated_signals_do_not_count_as_transitions() {
    let tracker = ConnectionTracker::new(FakeClock::new());

    tracker.on_connected();
    tracker.on_connected();
    tracker.on_disconnected();
    tracker.on_disconnected();
    tracker.on_connected();

    let stats = tracker.snapshot();
    assert_eq!(stats.state, ConnectionState::Connected);
    assert_eq!(stats.connects, 2);
    assert_eq!(stats.disconnects, 1);
}

#[test]
fn snapshot_reports_time_in_state() {
    let clock = FakeClock::new();
    let tracker = ConnectionTracker::new(clock.clone());

    tracker.on_connected();
    clock.advance(Duration::from_millis(1500));

    assert_eq!(tracker.snapshot().in_state_millis, Some(1500));
}

#[test]
fn clones_share_state() {
    let tracker = ConnectionTracker::new(FakeClock::new());
    let other = tracker.clone();

    other.on_connected();
    assert!(tracker.is_live());
}

#[test]
fn state_serializes_snake_case() {
    let json = serde_json::to_string(&ConnectionState::Connected).unwrap();
    assert_eq!(json, "\"connected\"");
}
