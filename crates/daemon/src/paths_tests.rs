// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

#[test]
fn state_hash_is_stable_and_short() {
    let a = state_hash(Path::new("/var/lib/nlog"));
    let b = state_hash(Path::new("/var/lib/nlog"));
    assert_eq!(a, b);
    assert_eq!(a.len(), 16);
    assert_ne!(a, state_hash(Path::new("/var/lib/other")));
}

#[test]
fn resolve_creates_and_canonicalizes() {
    let temp = tempdir().unwrap();
    let nested = temp.path().join("nested").join("state");

    let resolved = resolve_state_dir(Some(&nested)).unwrap();

    assert!(resolved.is_dir());
    assert_eq!(resolved, temp.path().canonicalize().unwrap().join("nested/state"));
}

#[test]
fn socket_path_ends_with_hash() {
    let path = socket_path(Path::new("/var/lib/nlog"));
    let name = path.file_name().unwrap().to_string_lossy().to_string();
    assert_eq!(name, format!("{}.sock", state_hash(Path::new("/var/lib/nlog"))));
}
