// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Notification ingestion engine
//!
//! ```text
//! source callbacks ─▶ NotificationListener ─▶ IngestPipeline ──(bounded queue)──▶ writer task ─▶ Storage
//!                           │                                                        │
//!                           ▼                                                        ▼ revision
//!                   ConnectionTracker                                           QueryFacade subscribers
//! ```

mod config;
mod error;
mod listener;
mod pipeline;
mod query;
mod stats;
mod writer;

pub use config::{IngestConfig, RemovalPolicy};
pub use error::{IngestError, IngestOutcome, Submission};
pub use listener::NotificationListener;
pub use pipeline::{IngestPipeline, WriterTask};
pub use query::{QueryFacade, RecentSubscription};
pub use stats::{IngestStats, IngestStatsSnapshot};
