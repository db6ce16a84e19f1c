// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! nlog - Notification log CLI

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod commands;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{daemon, history, source};

use crate::client::DaemonClient;

#[derive(Parser)]
#[command(name = "nlog", version, about = "Notification history log")]
struct Cli {
    /// State directory of the daemon to talk to
    #[arg(long, global = true, env = "NLOG_STATE_DIR")]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Client(ClientCommand),
    /// Daemon management
    Daemon(daemon::DaemonArgs),
}

/// Commands served by a running daemon
#[derive(Subcommand)]
enum ClientCommand {
    /// List the most recent notifications
    Recent(history::RecentArgs),
    /// Print a new snapshot of recent notifications whenever history changes
    Watch(history::WatchArgs),
    /// Delete every notification from a source
    Purge {
        /// Source identity
        source: String,
    },
    /// Delete one notification by id
    Delete {
        /// Record id
        id: u64,
    },
    /// Show daemon and ingestion status
    Status,
    /// Deliver a posted notification as the source would
    Post(source::PostArgs),
    /// Deliver a removal signal as the source would
    Remove {
        /// Source identity
        source: String,
    },
    /// Signal that the source attached the listener
    Connect,
    /// Signal that the source detached the listener
    Disconnect,
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging();
    let cli = Cli::parse();
    let state_dir = nlog_daemon::paths::resolve_state_dir(cli.state_dir.as_deref())?;

    let command = match cli.command {
        // Daemon management doesn't need a client connection
        Commands::Daemon(args) => return daemon::handle(args, &state_dir).await,
        Commands::Client(command) => command,
    };

    // All other commands go through the daemon
    let client = DaemonClient::connect_or_start(&state_dir).await?;

    match command {
        ClientCommand::Recent(args) => history::recent(&client, args).await?,
        ClientCommand::Watch(args) => history::watch(&client, args).await?,
        ClientCommand::Purge { source } => history::purge(&client, &source).await?,
        ClientCommand::Delete { id } => history::delete(&client, id).await?,
        ClientCommand::Status => daemon::status(&client).await?,
        ClientCommand::Post(args) => source::post(&client, args).await?,
        ClientCommand::Remove { source } => source::remove(&client, source).await?,
        ClientCommand::Connect => source::lifecycle(&client, true).await?,
        ClientCommand::Disconnect => source::lifecycle(&client, false).await?,
    }

    Ok(())
}

/// Diagnostics to stderr, quiet unless RUST_LOG asks
fn setup_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
