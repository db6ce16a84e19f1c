// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `nlog daemon` - Daemon management

use std::path::Path;

use anyhow::Result;
use clap::{Args, Subcommand};
use nlog_daemon::paths;

use crate::client::{daemon_stop, ClientError, DaemonClient};

#[derive(Args)]
pub struct DaemonArgs {
    #[command(subcommand)]
    pub command: DaemonCommand,
}

#[derive(Subcommand)]
pub enum DaemonCommand {
    /// Start the daemon if it is not running
    Start,
    /// Stop the daemon
    Stop,
    /// Show daemon status
    Status,
    /// Show the tail of the daemon log
    Logs {
        /// Number of lines to show
        #[arg(short = 'n', long, default_value = "50")]
        lines: usize,
    },
}

pub async fn handle(args: DaemonArgs, state_dir: &Path) -> Result<()> {
    match args.command {
        DaemonCommand::Start => {
            let client = DaemonClient::connect_or_start(state_dir).await?;
            let version = client.hello().await?;
            println!("Daemon running (version {})", version);
        }
        DaemonCommand::Stop => {
            if daemon_stop(state_dir).await? {
                println!("Daemon stopped");
            } else {
                println!("Daemon not running");
            }
        }
        DaemonCommand::Status => match DaemonClient::connect(state_dir) {
            Ok(client) => status(&client).await?,
            Err(ClientError::DaemonNotRunning) => println!("Daemon not running"),
            Err(e) => return Err(e.into()),
        },
        DaemonCommand::Logs { lines } => {
            let log_path = state_dir.join(paths::LOG_FILE);
            let content = std::fs::read_to_string(&log_path).unwrap_or_default();
            for line in tail(&content, lines) {
                println!("{}", line);
            }
        }
    }
    Ok(())
}

pub async fn status(client: &DaemonClient) -> Result<()> {
    let status = client.status().await?;
    println!("Status: running");
    println!("  Uptime: {}s", status.uptime_secs);
    println!(
        "  Source: {} ({} connects, {} disconnects)",
        status.connection.state, status.connection.connects, status.connection.disconnects
    );
    println!("  Records: {}", status.records);
    let stats = status.stats;
    println!(
        "  Ingested: {} posted, {} stored, {} duplicates, {} malformed",
        stats.posted, stats.stored, stats.duplicates, stats.malformed
    );
    println!(
        "  Dropped: {} (storage failures {}, unexpected {})",
        stats.dropped, stats.storage_failures, stats.unexpected_failures
    );
    Ok(())
}

fn tail(content: &str, lines: usize) -> Vec<&str> {
    let all: Vec<&str> = content.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].to_vec()
}
