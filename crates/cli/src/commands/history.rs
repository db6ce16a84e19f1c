// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reading and pruning stored history

use anyhow::Result;
use clap::builder::RangedU64ValueParser;
use clap::Args;
use nlog_core::RecordId;
use nlog_daemon::MAX_RECORDS_PER_RESPONSE;

use crate::client::DaemonClient;
use crate::output::{print_records, OutputFormat};

#[derive(Args)]
pub struct RecentArgs {
    /// Maximum number of records
    #[arg(short = 'n', long, default_value = "20", value_parser = limit_parser())]
    pub limit: usize,

    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

#[derive(Args)]
pub struct WatchArgs {
    /// Maximum number of records per snapshot
    #[arg(short = 'n', long, default_value = "10", value_parser = limit_parser())]
    pub limit: usize,

    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

/// Limits the daemon will serve in one response
fn limit_parser() -> RangedU64ValueParser<usize> {
    RangedU64ValueParser::new().range(1..=MAX_RECORDS_PER_RESPONSE as u64)
}

pub async fn recent(client: &DaemonClient, args: RecentArgs) -> Result<()> {
    let records = client.list_recent(args.limit).await?;
    print_records(&records, args.format);
    Ok(())
}

pub async fn watch(client: &DaemonClient, args: WatchArgs) -> Result<()> {
    let mut stream = client.watch(args.limit).await?;
    while let Some(records) = stream.next().await? {
        if matches!(args.format, OutputFormat::Text) {
            println!();
        }
        print_records(&records, args.format);
    }
    Ok(())
}

pub async fn purge(client: &DaemonClient, source: &str) -> Result<()> {
    let count = client.purge(source).await?;
    println!("Purged {} record(s) for {}", count, source);
    Ok(())
}

pub async fn delete(client: &DaemonClient, id: u64) -> Result<()> {
    if client.delete(RecordId(id)).await? {
        println!("Deleted record {}", id);
    } else {
        println!("No record {}", id);
    }
    Ok(())
}
