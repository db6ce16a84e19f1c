// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon client for CLI commands

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

use nlog_core::{ConnectionStats, EventRecord, PostedEvent, RecordId, RemovedEvent};
use nlog_daemon::paths::{self, PathError, STARTUP_MARKER_PREFIX};
use nlog_daemon::protocol::{self, ProtocolError};
use nlog_daemon::{Request, Response};
use nlog_engine::{IngestStatsSnapshot, Submission};
use thiserror::Error;
use tokio::net::unix::OwnedReadHalf;
use tokio::net::UnixStream;

// Timeout configuration (env vars in milliseconds)
fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Timeout for IPC requests
pub fn timeout_ipc() -> Duration {
    parse_duration_ms("NLOG_TIMEOUT_IPC_MS").unwrap_or(Duration::from_secs(5))
}

/// Timeout for waiting for daemon to start
pub fn timeout_connect() -> Duration {
    parse_duration_ms("NLOG_TIMEOUT_CONNECT_MS").unwrap_or(Duration::from_secs(5))
}

/// Timeout for waiting for process to exit
pub fn timeout_exit() -> Duration {
    parse_duration_ms("NLOG_TIMEOUT_EXIT_MS").unwrap_or(Duration::from_secs(2))
}

/// Polling interval for retries
pub fn poll_interval() -> Duration {
    parse_duration_ms("NLOG_POLL_INTERVAL_MS").unwrap_or(Duration::from_millis(50))
}

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Daemon not running")]
    DaemonNotRunning,

    #[error("Failed to start daemon: {0}")]
    DaemonStartFailed(String),

    #[error("Connection timeout waiting for daemon to start")]
    DaemonStartTimeout,

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Unexpected response from daemon")]
    UnexpectedResponse,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Path(#[from] PathError),
}

/// Daemon status as reported by `Status`
#[derive(Debug)]
pub struct DaemonStatus {
    pub uptime_secs: u64,
    pub connection: ConnectionStats,
    pub records: usize,
    pub stats: IngestStatsSnapshot,
}

/// Daemon client
pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    /// Connect to daemon, auto-starting if not running
    pub async fn connect_or_start(state_dir: &Path) -> Result<Self, ClientError> {
        // Check version file before connecting - restart daemon if version mismatch
        let version_path = state_dir.join(paths::VERSION_FILE);
        if let Ok(daemon_version) = std::fs::read_to_string(&version_path) {
            let cli_version = env!("CARGO_PKG_VERSION");
            if daemon_version.trim() != cli_version {
                // Version mismatch - stop old daemon first
                let _ = daemon_stop(state_dir).await;
            }
        }

        match Self::connect(state_dir) {
            Ok(client) => Ok(client),
            Err(ClientError::DaemonNotRunning) => {
                // Start daemon in background
                let child = start_daemon_background(state_dir)?;
                // Wait for socket with retry, watching for early exit
                Self::connect_with_retry(state_dir, timeout_connect(), child).await
            }
            Err(e) => Err(wrap_with_startup_error(e, state_dir)),
        }
    }

    /// Connect to existing daemon (no auto-start)
    pub fn connect(state_dir: &Path) -> Result<Self, ClientError> {
        let socket_path = paths::socket_path(state_dir);

        if !socket_path.exists() {
            return Err(ClientError::DaemonNotRunning);
        }

        Ok(Self { socket_path })
    }

    async fn connect_with_retry(
        state_dir: &Path,
        timeout: Duration,
        mut child: std::process::Child,
    ) -> Result<Self, ClientError> {
        let start = Instant::now();
        while start.elapsed() < timeout {
            // Check if daemon process exited early (startup failure)
            if let Ok(Some(status)) = child.try_wait() {
                // Poll for startup error in log (filesystem may need to sync)
                let poll_start = Instant::now();
                while poll_start.elapsed() < timeout_exit() {
                    if let Some(err) = read_startup_error(state_dir) {
                        return Err(ClientError::DaemonStartFailed(err));
                    }
                    tokio::time::sleep(poll_interval()).await;
                }
                return Err(ClientError::DaemonStartFailed(format!(
                    "exited with {}",
                    status
                )));
            }

            match Self::connect(state_dir) {
                Ok(client) => return Ok(client),
                Err(ClientError::DaemonNotRunning) => {
                    tokio::time::sleep(poll_interval()).await;
                }
                Err(e) => return Err(wrap_with_startup_error(e, state_dir)),
            }
        }

        // Timeout - check log for startup errors
        Err(wrap_with_startup_error(
            ClientError::DaemonStartTimeout,
            state_dir,
        ))
    }

    /// Send a request and receive a response with specific timeouts
    async fn send_with_timeout(
        &self,
        request: Request,
        read_timeout: Duration,
        write_timeout: Duration,
    ) -> Result<Response, ClientError> {
        let (mut reader, _writer) = self.open(&request, write_timeout).await?;

        // Read response with read timeout
        let response_bytes =
            tokio::time::timeout(read_timeout, protocol::read_message(&mut reader))
                .await
                .map_err(|_| ProtocolError::Timeout)??;

        let response: Response = protocol::decode(&response_bytes)?;
        Ok(response)
    }

    /// Connect and write one request, returning both halves
    async fn open(
        &self,
        request: &Request,
        write_timeout: Duration,
    ) -> Result<(OwnedReadHalf, tokio::net::unix::OwnedWriteHalf), ClientError> {
        let stream = UnixStream::connect(&self.socket_path).await?;
        let (reader, mut writer) = stream.into_split();

        // Encode and send request with write timeout
        let data = protocol::encode(request)?;
        tokio::time::timeout(write_timeout, protocol::write_message(&mut writer, &data))
            .await
            .map_err(|_| ProtocolError::Timeout)??;

        Ok((reader, writer))
    }

    /// Send a request and receive a response
    pub async fn send(&self, request: Request) -> Result<Response, ClientError> {
        self.send_with_timeout(request, timeout_ipc(), timeout_ipc())
            .await
    }

    /// Get daemon version via Hello handshake
    pub async fn hello(&self) -> Result<String, ClientError> {
        match self
            .send(Request::Hello {
                version: env!("CARGO_PKG_VERSION").to_string(),
            })
            .await?
        {
            Response::Hello { version } => Ok(version),
            other => Err(unexpected(other)),
        }
    }

    /// Most recent records, newest first
    pub async fn list_recent(&self, limit: usize) -> Result<Vec<EventRecord>, ClientError> {
        match self.send(Request::ListRecent { limit }).await? {
            Response::Records { records } => Ok(records),
            other => Err(unexpected(other)),
        }
    }

    /// Delete every record for a source
    pub async fn purge(&self, source: &str) -> Result<usize, ClientError> {
        match self
            .send(Request::Purge {
                source: source.to_string(),
            })
            .await?
        {
            Response::Purged { count } => Ok(count),
            other => Err(unexpected(other)),
        }
    }

    /// Delete one record
    pub async fn delete(&self, id: RecordId) -> Result<bool, ClientError> {
        match self.send(Request::Delete { id }).await? {
            Response::Deleted { removed } => Ok(removed),
            other => Err(unexpected(other)),
        }
    }

    /// Hand a posted event to the daemon as if the source delivered it
    pub async fn post(&self, event: PostedEvent) -> Result<Submission, ClientError> {
        self.submit(Request::Posted { event }).await
    }

    /// Hand a removal to the daemon as if the source delivered it
    pub async fn remove(&self, event: RemovedEvent) -> Result<Submission, ClientError> {
        self.submit(Request::Removed { event }).await
    }

    async fn submit(&self, request: Request) -> Result<Submission, ClientError> {
        match self.send(request).await? {
            Response::Accepted { submission } => Ok(submission),
            other => Err(unexpected(other)),
        }
    }

    /// Report a source lifecycle signal
    pub async fn lifecycle(&self, connected: bool) -> Result<(), ClientError> {
        let request = if connected {
            Request::Connected
        } else {
            Request::Disconnected
        };
        match self.send(request).await? {
            Response::Ok => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Get daemon status
    pub async fn status(&self) -> Result<DaemonStatus, ClientError> {
        match self.send(Request::Status).await? {
            Response::Status {
                uptime_secs,
                connection,
                records,
                stats,
            } => Ok(DaemonStatus {
                uptime_secs,
                connection,
                records,
                stats,
            }),
            other => Err(unexpected(other)),
        }
    }

    /// Request daemon shutdown
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        match self.send(Request::Shutdown).await? {
            Response::Ok | Response::ShuttingDown => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Open a watch stream; no read timeout, snapshots arrive on change
    pub async fn watch(&self, limit: usize) -> Result<WatchStream, ClientError> {
        let (reader, writer) = self.open(&Request::Watch { limit }, timeout_ipc()).await?;
        Ok(WatchStream {
            reader,
            _writer: writer,
        })
    }
}

/// Snapshots pushed by the daemon for a `Watch` request
pub struct WatchStream {
    reader: OwnedReadHalf,
    // Dropping the write half tells the daemon we left
    _writer: tokio::net::unix::OwnedWriteHalf,
}

impl WatchStream {
    /// Next snapshot, or `None` when the daemon closes the stream
    pub async fn next(&mut self) -> Result<Option<Vec<EventRecord>>, ClientError> {
        let bytes = match protocol::read_message(&mut self.reader).await {
            Ok(bytes) => bytes,
            Err(ProtocolError::ConnectionClosed) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match protocol::decode(&bytes)? {
            Response::Records { records } => Ok(Some(records)),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(response: Response) -> ClientError {
    match response {
        Response::Error { message } => ClientError::Rejected(message),
        _ => ClientError::UnexpectedResponse,
    }
}

/// Start the daemon in the background, returning the child process handle
fn start_daemon_background(state_dir: &Path) -> Result<std::process::Child, ClientError> {
    let nlogd_path = find_nlogd_binary();

    Command::new(&nlogd_path)
        .arg(state_dir)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .map_err(|e| ClientError::DaemonStartFailed(e.to_string()))
}

/// Stop the daemon (graceful first, then forceful)
/// Returns true if daemon was stopped, false if it wasn't running
pub async fn daemon_stop(state_dir: &Path) -> Result<bool, ClientError> {
    let client = match DaemonClient::connect(state_dir) {
        Ok(c) => c,
        Err(ClientError::DaemonNotRunning) => {
            // Clean up any stale files
            cleanup_stale_pid(state_dir);
            return Ok(false);
        }
        Err(e) => return Err(e),
    };

    // Try graceful shutdown (timeout handled by send())
    let shutdown_result = client.shutdown().await;

    if let Some(pid) = read_daemon_pid(state_dir) {
        if shutdown_result.is_ok() {
            // Graceful shutdown succeeded, wait for process to exit
            wait_for_exit(pid, timeout_exit()).await;
        }

        // Force kill if still running
        if process_exists(pid) {
            force_kill_daemon(pid);
            wait_for_exit(pid, timeout_exit()).await;
        }
    }

    cleanup_stale_pid(state_dir);
    Ok(true)
}

/// Wait for a process to exit
async fn wait_for_exit(pid: u32, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if !process_exists(pid) {
            return true;
        }
        tokio::time::sleep(poll_interval()).await;
    }
    false
}

/// Find the nlogd binary
fn find_nlogd_binary() -> PathBuf {
    // Explicit override (used by tests to ensure correct binary)
    if let Ok(path) = std::env::var("NLOG_DAEMON_BINARY") {
        return PathBuf::from(path);
    }

    // Check current executable's directory
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let sibling = dir.join("nlogd");
            if sibling.exists() {
                return sibling;
            }
        }
    }

    // Fall back to PATH lookup
    PathBuf::from("nlogd")
}

/// Clean up orphaned PID file
///
/// Called by daemon_stop when the daemon is not running or after stopping it.
fn cleanup_stale_pid(state_dir: &Path) {
    let pid_path = state_dir.join(paths::PID_FILE);
    if pid_path.exists() {
        let _ = std::fs::remove_file(&pid_path);
    }
}

/// Get the PID from the daemon PID file, if it exists
pub fn read_daemon_pid(state_dir: &Path) -> Option<u32> {
    let content = std::fs::read_to_string(state_dir.join(paths::PID_FILE)).ok()?;
    content.trim().parse::<u32>().ok()
}

/// Check if a process with the given PID exists
pub fn process_exists(pid: u32) -> bool {
    // Use kill -0 to check if process exists without sending a signal
    Command::new("kill")
        .args(["-0", &pid.to_string()])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Force kill a daemon process
pub fn force_kill_daemon(pid: u32) -> bool {
    Command::new("kill")
        .args(["-9", &pid.to_string()])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Read daemon log from startup marker, looking for errors.
/// Returns the error message if found, None otherwise.
pub fn read_startup_error(state_dir: &Path) -> Option<String> {
    let content = std::fs::read_to_string(state_dir.join(paths::LOG_FILE)).ok()?;

    // Find the last startup marker
    let start_pos = content.rfind(STARTUP_MARKER_PREFIX)?;
    let startup_log = &content[start_pos..];

    let errors: Vec<&str> = startup_log
        .lines()
        .filter(|line| line.contains(" ERROR ") || line.contains("Failed to start"))
        .collect();

    if errors.is_empty() {
        return None;
    }

    // Format: "timestamp LEVEL target: message"
    let error_messages: Vec<String> = errors
        .iter()
        .filter_map(|line| line.split_once(": ").map(|(_, msg)| msg.to_string()))
        .collect();

    if error_messages.is_empty() {
        Some(errors.join("\n"))
    } else {
        Some(error_messages.join("\n"))
    }
}

/// Wrap an error with startup log info if available.
fn wrap_with_startup_error(err: ClientError, state_dir: &Path) -> ClientError {
    // Don't double-wrap
    if matches!(err, ClientError::DaemonStartFailed(_)) {
        return err;
    }

    if let Some(startup_error) = read_startup_error(state_dir) {
        ClientError::DaemonStartFailed(startup_error)
    } else {
        err
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
