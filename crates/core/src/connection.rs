// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection state of the notification source
//!
//! The source attaches and detaches the listener on its own schedule. This
//! tracker only records what it was told; it never reconnects, and events
//! missed while detached are gone for good.
//!
//! ```text
//! Disconnected ──on_connected──▶ Connected
//!      ▲                             │
//!      └──────on_disconnected────────┘
//! ```

use crate::clock::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Whether the source currently has the listener attached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

/// Point-in-time view of the tracker, for status reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStats {
    pub state: ConnectionState,
    /// Number of transitions into `Connected`
    pub connects: u64,
    /// Number of transitions into `Disconnected`
    pub disconnects: u64,
    /// Time spent in the current state, if any transition happened
    pub in_state_millis: Option<u64>,
}

#[derive(Debug, Default)]
struct TrackerInner {
    state: ConnectionState,
    connects: u64,
    disconnects: u64,
    since: Option<Instant>,
}

/// Tracks the listener's connection lifecycle
///
/// Cloning shares the underlying state.
#[derive(Clone)]
pub struct ConnectionTracker<C: Clock> {
    inner: Arc<Mutex<TrackerInner>>,
    clock: C,
}

impl<C: Clock> ConnectionTracker<C> {
    pub fn new(clock: C) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TrackerInner::default())),
            clock,
        }
    }

    /// The source attached the listener
    pub fn on_connected(&self) {
        let previous = self.transition(ConnectionState::Connected);
        if previous == ConnectionState::Connected {
            tracing::debug!("listener connected signal while already connected");
        } else {
            tracing::info!("notification listener connected");
        }
    }

    /// The source detached the listener; ingestion stops until it reconnects
    pub fn on_disconnected(&self) {
        let previous = self.transition(ConnectionState::Disconnected);
        if previous == ConnectionState::Disconnected {
            tracing::debug!("listener disconnected signal while already disconnected");
        } else {
            tracing::warn!(
                "notification listener disconnected; events are lost until the source reconnects"
            );
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).state
    }

    /// True while the source is attached and events are expected to flow
    pub fn is_live(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn snapshot(&self) -> ConnectionStats {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let now = self.clock.now();
        ConnectionStats {
            state: inner.state,
            connects: inner.connects,
            disconnects: inner.disconnects,
            in_state_millis: inner
                .since
                .map(|since| now.saturating_duration_since(since))
                .map(|d: Duration| d.as_millis() as u64),
        }
    }

    /// Apply a transition, returning the previous state
    ///
    /// Repeating the current state is a no-op and does not count as a transition.
    fn transition(&self, to: ConnectionState) -> ConnectionState {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let previous = inner.state;
        if previous != to {
            inner.state = to;
            inner.since = Some(self.clock.now());
            match to {
                ConnectionState::Connected => inner.connects += 1,
                ConnectionState::Disconnected => inner.disconnects += 1,
            }
        }
        previous
    }
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
