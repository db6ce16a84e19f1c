// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `nlog post|remove|connect|disconnect` - Feed source events by hand

use anyhow::{bail, Result};
use clap::Args;
use nlog_core::{Clock, PostedEvent, RemovedEvent, SystemClock};
use nlog_engine::Submission;

use crate::client::DaemonClient;

#[derive(Args)]
pub struct PostArgs {
    /// Originating application identity
    pub source: String,

    /// Post time in epoch milliseconds (default: now)
    #[arg(long)]
    pub at: Option<i64>,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub body: Option<String>,

    /// Flag the content as sensitive
    #[arg(long)]
    pub sensitive: bool,
}

impl PostArgs {
    pub fn into_event(self, clock: &impl Clock) -> PostedEvent {
        PostedEvent {
            source: self.source,
            title: self.title,
            body: self.body,
            posted_at_millis: self.at.unwrap_or_else(|| clock.epoch_millis()),
            sensitive: self.sensitive.then_some(true),
        }
    }
}

pub async fn post(client: &DaemonClient, args: PostArgs) -> Result<()> {
    let event = args.into_event(&SystemClock);
    let at = event.posted_at_millis;
    report(client.post(event).await?, &format!("posted at {}", at))
}

pub async fn remove(client: &DaemonClient, source: String) -> Result<()> {
    report(client.remove(RemovedEvent::new(source)).await?, "removal")
}

pub async fn lifecycle(client: &DaemonClient, connected: bool) -> Result<()> {
    client.lifecycle(connected).await?;
    println!(
        "Source {}",
        if connected { "connected" } else { "disconnected" }
    );
    Ok(())
}

fn report(submission: Submission, what: &str) -> Result<()> {
    match submission {
        Submission::Queued => {
            println!("Queued {}", what);
            Ok(())
        }
        Submission::Rejected => bail!("{} rejected as malformed", what),
        Submission::Dropped => bail!("{} dropped: ingest queue full", what),
        Submission::Closed => bail!("{} dropped: daemon shutting down", what),
    }
}
