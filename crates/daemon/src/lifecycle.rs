// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, shutdown.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use fs2::FileExt;
use nlog_adapters::{AccessCheck, EnabledListenersCheck, StaticAccessCheck, TracedStorage};
use nlog_core::{ConnectionTracker, SystemClock};
use nlog_daemon::paths::{self, PathError};
use nlog_engine::{IngestConfig, IngestPipeline, NotificationListener, QueryFacade, WriterTask};
use nlog_storage::{Storage, StorageError, WalStorage, WalStorageConfig};
use serde::Deserialize;
use thiserror::Error;
use tokio::net::UnixListener;
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::server::ServerContext;

/// Storage stack the daemon runs on
pub type DaemonStorage = TracedStorage<WalStorage>;

/// Tunables read from `<state_dir>/config.toml`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Package whose listener component the platform must have enabled
    pub package_name: String,
    /// File holding the platform's enabled-listeners setting; unset means
    /// no platform gate
    pub listener_settings: Option<PathBuf>,
    /// Compact the log after this many deletes; unset disables compaction
    pub compact_after_deletes: Option<u64>,
    #[serde(flatten)]
    pub ingest: IngestConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            package_name: "com.example.nlog".to_string(),
            listener_settings: None,
            compact_after_deletes: Some(1000),
            ingest: IngestConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings, falling back to defaults when the file is absent
    pub fn load(path: &Path) -> Result<Self, LifecycleError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content)
                .map_err(|e| LifecycleError::Config(path.to_path_buf(), e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// State directory (log, pid, version, WAL, config.toml)
    pub state_dir: PathBuf,
    /// Path to Unix socket
    pub socket_path: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to version file
    pub version_path: PathBuf,
    /// Path to daemon log file
    pub log_path: PathBuf,
    /// Path to the event log
    pub wal_path: PathBuf,
    /// Path to config.toml
    pub config_path: PathBuf,
    /// Skip the platform access check (NLOG_ASSUME_PERMITTED=1)
    pub assume_permitted: bool,
}

impl Config {
    /// Config for the given state directory, or the default one
    pub fn load(state_dir: Option<&Path>) -> Result<Self, LifecycleError> {
        let state_dir = paths::resolve_state_dir(state_dir)?;
        let assume_permitted = std::env::var("NLOG_ASSUME_PERMITTED").is_ok_and(|v| v == "1");
        Ok(Self::for_state_dir(state_dir, assume_permitted))
    }

    pub fn for_state_dir(state_dir: PathBuf, assume_permitted: bool) -> Self {
        Self {
            socket_path: paths::socket_path(&state_dir),
            lock_path: state_dir.join(paths::PID_FILE),
            version_path: state_dir.join(paths::VERSION_FILE),
            log_path: state_dir.join(paths::LOG_FILE),
            wal_path: state_dir.join("wal").join("events.wal"),
            config_path: state_dir.join(paths::CONFIG_FILE),
            state_dir,
            assume_permitted,
        }
    }

    fn access_check(&self, settings: &Settings) -> Box<dyn AccessCheck> {
        if self.assume_permitted {
            info!("NLOG_ASSUME_PERMITTED set, skipping notification access check");
            return Box::new(StaticAccessCheck(true));
        }
        match &settings.listener_settings {
            Some(path) => Box::new(EnabledListenersCheck::new(path, &settings.package_name)),
            None => Box::new(StaticAccessCheck(true)),
        }
    }
}

/// Daemon state during operation
pub struct DaemonState {
    /// Configuration
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    /// Unix socket listener
    pub listener: UnixListener,
    /// Shared with every connection handler
    pub context: ServerContext,
    writer: Option<WriterTask>,
    /// Signalled by an IPC shutdown request
    pub shutdown_requested: Arc<Notify>,
}

impl DaemonState {
    /// Shutdown the daemon gracefully
    pub async fn shutdown(&mut self) -> Result<(), LifecycleError> {
        info!("Shutting down daemon...");

        // 1. Drain the writer so everything accepted so far is durable
        if let Some(writer) = self.writer.take() {
            writer.shutdown().await;
        }
        info!(
            "Writer drained, {} records stored",
            self.context.query.len()
        );

        // 2. Remove socket file
        if self.config.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.socket_path) {
                warn!("Failed to remove socket file: {}", e);
            }
        }

        // 3. Remove PID file
        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                warn!("Failed to remove PID file: {}", e);
            }
        }

        // 4. Remove version file
        if self.config.version_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.version_path) {
                warn!("Failed to remove version file: {}", e);
            }
        }

        // 5. Lock file is released automatically when self.lock_file is dropped

        info!("Daemon shutdown complete");
        Ok(())
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("Invalid config at {0}: {1}")]
    Config(PathBuf, toml::de::Error),

    #[error("Notification access is not granted; ingestion not started")]
    AccessDenied,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Start the daemon
pub async fn startup(config: &Config) -> Result<DaemonState, LifecycleError> {
    match startup_inner(config).await {
        Ok(state) => Ok(state),
        // Another daemon owns these files
        Err(e @ LifecycleError::LockFailed(_)) => Err(e),
        Err(e) => {
            // Clean up any resources created before failure
            cleanup_on_failure(config);
            Err(e)
        }
    }
}

/// Inner startup logic - cleanup_on_failure called if this fails
async fn startup_inner(config: &Config) -> Result<DaemonState, LifecycleError> {
    // 1. Create state and socket directories
    std::fs::create_dir_all(&config.state_dir)?;
    if let Some(parent) = config.socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // 2. Acquire lock file FIRST - prevents races
    // Not truncated until locked: a running daemon's PID must survive
    let lock_file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&config.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;

    // Write PID to lock file
    use std::io::Write;
    lock_file.set_len(0)?;
    let mut lock_file = lock_file;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file;

    // Write version file
    std::fs::write(&config.version_path, env!("CARGO_PKG_VERSION"))?;

    // 3. Settings and access check BEFORE touching storage
    let settings = Settings::load(&config.config_path)?;
    if !config.access_check(&settings).is_ingestion_permitted() {
        return Err(LifecycleError::AccessDenied);
    }

    // 4. Load history from the WAL
    if let Some(parent) = config.wal_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let wal_storage = WalStorage::open(
        &config.wal_path,
        WalStorageConfig {
            compact_after_deletes: settings.compact_after_deletes,
        },
    )?;
    let storage = Arc::new(TracedStorage::new(wal_storage));
    info!("Loaded history: {} records", storage.len());

    // 5. Spawn the single writer
    let (pipeline, writer) = IngestPipeline::spawn(Arc::clone(&storage), settings.ingest.clone());
    let ingest = NotificationListener::new(pipeline.clone(), ConnectionTracker::new(SystemClock));
    let query = QueryFacade::new(storage, pipeline);

    // 6. Remove stale socket and bind (LAST - only after all validation passes)
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;

    let shutdown_requested = Arc::new(Notify::new());
    info!(
        "Daemon started with state dir: {}",
        config.state_dir.display()
    );

    Ok(DaemonState {
        config: config.clone(),
        lock_file,
        listener,
        context: ServerContext {
            ingest,
            query,
            start_time: Instant::now(),
            shutdown: Arc::clone(&shutdown_requested),
        },
        writer: Some(writer),
        shutdown_requested,
    })
}

/// Clean up resources on startup failure
fn cleanup_on_failure(config: &Config) {
    // Remove socket if we created it
    if config.socket_path.exists() {
        let _ = std::fs::remove_file(&config.socket_path);
    }

    // Remove version file
    if config.version_path.exists() {
        let _ = std::fs::remove_file(&config.version_path);
    }

    // Remove PID/lock file
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
