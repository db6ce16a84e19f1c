// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem layout shared by the daemon and the CLI

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const PID_FILE: &str = "daemon.pid";
pub const VERSION_FILE: &str = "daemon.version";
pub const LOG_FILE: &str = "daemon.log";
pub const CONFIG_FILE: &str = "config.toml";

/// Startup marker prefix written to the log before anything else.
/// Full format: "--- nlogd: starting (pid: 12345) ---"
pub const STARTUP_MARKER_PREFIX: &str = "--- nlogd: starting (pid: ";

#[derive(Debug, Error)]
pub enum PathError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("State directory {0} is unusable: {1}")]
    Unusable(PathBuf, std::io::Error),
}

/// Default state directory
///
/// `NLOG_STATE_DIR` wins, then `$XDG_STATE_HOME/nlog`, then
/// `~/.local/state/nlog`.
pub fn default_state_dir() -> Result<PathBuf, PathError> {
    if let Ok(dir) = std::env::var("NLOG_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("nlog"));
    }

    let home = std::env::var("HOME").map_err(|_| PathError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/nlog"))
}

/// Create the state directory if needed and return its canonical form
///
/// Both sides hash the canonical path to find the socket, so they must
/// agree on it.
pub fn resolve_state_dir(explicit: Option<&Path>) -> Result<PathBuf, PathError> {
    let dir = match explicit {
        Some(dir) => dir.to_path_buf(),
        None => default_state_dir()?,
    };
    std::fs::create_dir_all(&dir).map_err(|e| PathError::Unusable(dir.clone(), e))?;
    dir.canonicalize()
        .map_err(|e| PathError::Unusable(dir.clone(), e))
}

/// Get the socket directory
///
/// Uses /tmp/nlog by default to keep paths short (macOS SUN_LEN = 104).
/// Can be overridden with NLOG_SOCKET_DIR for testing.
pub fn socket_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("NLOG_SOCKET_DIR") {
        return PathBuf::from(dir);
    }
    PathBuf::from("/tmp/nlog")
}

/// Socket path for the daemon owning `state_dir`
pub fn socket_path(state_dir: &Path) -> PathBuf {
    socket_dir().join(format!("{}.sock", state_hash(state_dir)))
}

/// Short stable identifier for a state directory
pub fn state_hash(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    let result = hasher.finalize();
    // First 16 hex chars
    result[..8].iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;
