// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output formatting for CLI commands

use std::fmt;

use clap::ValueEnum;
use nlog_core::EventRecord;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// One record as a table row
#[derive(Serialize)]
#[serde(transparent)]
pub struct RecordRow<'a>(pub &'a EventRecord);

const TITLE_WIDTH: usize = 24;

impl fmt::Display for RecordRow<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.0;
        let title = r.title.as_deref().unwrap_or("-");
        let body = if r.sensitive {
            "(sensitive)"
        } else {
            r.body.as_deref().unwrap_or("")
        };
        write!(
            f,
            "{:<6} {:<14} {:<24} {:<width$} {}",
            r.id,
            r.observed_at_millis,
            truncate(&r.source, 24),
            truncate(title, TITLE_WIDTH),
            body,
            width = TITLE_WIDTH
        )
    }
}

pub fn record_header() -> String {
    format!(
        "{:<6} {:<14} {:<24} {:<width$} BODY",
        "ID",
        "POSTED_AT",
        "SOURCE",
        "TITLE",
        width = TITLE_WIDTH
    )
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Print a list of items
pub fn print_list<T: Serialize + fmt::Display>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Text => {
            for item in items {
                println!("{}", item);
            }
        }
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(items) {
                println!("{}", json);
            }
        }
    }
}

/// Print records as a table (with header) or JSON
pub fn print_records(records: &[EventRecord], format: OutputFormat) {
    if matches!(format, OutputFormat::Text) {
        if records.is_empty() {
            println!("No notifications");
            return;
        }
        println!("{}", record_header());
    }
    let rows: Vec<RecordRow<'_>> = records.iter().map(RecordRow).collect();
    print_list(&rows, format);
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
