// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Adapters for the collaborators around the ingestion pipeline

pub mod access;
pub mod traced;

pub use access::{AccessCheck, AccessError, EnabledListenersCheck, StaticAccessCheck};
pub use traced::TracedStorage;
