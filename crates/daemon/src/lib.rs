// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Notification log daemon library
//!
//! The wire protocol and path layout shared by `nlogd` and its clients.

pub mod paths;
pub mod protocol;

pub use protocol::{
    ProtocolError, Request, Response, MAX_MESSAGE_SIZE, MAX_RECORDS_PER_RESPONSE, PROTOCOL_VERSION,
};
