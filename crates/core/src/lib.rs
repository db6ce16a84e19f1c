// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! nlog-core: data model for the notification history
//!
//! This crate provides:
//! - The stored `EventRecord` and its dedup key
//! - Inbound event shapes delivered by the notification source, and their normalization
//! - The connection state tracker for the source's listener lifecycle
//! - A clock abstraction for testable time handling

pub mod clock;
pub mod connection;
pub mod event;
pub mod record;

pub use clock::{Clock, FakeClock, SystemClock};
pub use connection::{ConnectionState, ConnectionStats, ConnectionTracker};
pub use event::{MalformedEvent, PostedEvent, RemovedEvent, DEFAULT_BODY, DEFAULT_TITLE};
pub use record::{DedupKey, EventRecord, NewRecord, RecordId};
