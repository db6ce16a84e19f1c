// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

const PACKAGE: &str = "com.example.nlog";

fn check_with(contents: Option<&str>) -> (TempDir, EnabledListenersCheck) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("enabled_notification_listeners");
    if let Some(contents) = contents {
        std::fs::write(&path, contents).unwrap();
    }
    let check = EnabledListenersCheck::new(path, PACKAGE);
    (dir, check)
}

#[test]
fn permitted_when_package_listed() {
    let (_dir, check) = check_with(Some(
        "com.other/com.other.Listener:com.example.nlog/com.example.nlog.Listener\n",
    ));
    assert!(check.is_ingestion_permitted());
}

#[test]
fn denied_when_package_missing() {
    let (_dir, check) = check_with(Some("com.other/com.other.Listener"));
    assert!(!check.is_ingestion_permitted());
}

#[test]
fn denied_for_package_prefix_match() {
    let (_dir, check) = check_with(Some("com.example.nlog.extra/X"));
    assert!(!check.is_ingestion_permitted());
}

#[test]
fn denied_when_setting_absent() {
    let (_dir, check) = check_with(None);
    assert!(matches!(check.check(), Ok(false)));
    assert!(!check.is_ingestion_permitted());
}

#[test]
fn read_error_means_denied() {
    let dir = TempDir::new().unwrap();
    // A directory cannot be read as a string
    let check = EnabledListenersCheck::new(dir.path(), PACKAGE);
    assert!(check.check().is_err());
    assert!(!check.is_ingestion_permitted());
}

#[test]
fn static_check_returns_fixed_answer() {
    assert!(StaticAccessCheck(true).is_ingestion_permitted());
    assert!(!StaticAccessCheck(false).is_ingestion_permitted());
}
