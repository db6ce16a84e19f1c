// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use nlog_engine::RemovalPolicy;
use std::time::Duration;
use tempfile::{tempdir, TempDir};

fn test_config(temp: &TempDir) -> Config {
    let mut config = Config::for_state_dir(temp.path().join("state"), true);
    config.socket_path = temp.path().join("sock").join("nlogd.sock");
    config
}

#[test]
fn settings_default_when_file_missing() {
    let temp = tempdir().unwrap();
    let settings = Settings::load(&temp.path().join("config.toml")).unwrap();
    assert_eq!(settings, Settings::default());
    assert_eq!(settings.compact_after_deletes, Some(1000));
}

#[test]
fn settings_parse_all_keys() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
package_name = "org.example.log"
listener_settings = "/data/enabled_listeners"
queue_capacity = 64
write_timeout = "250ms"
dedup_tolerance_ms = 10
removal_policy = "delete-most-recent"
compact_after_deletes = 5
"#,
    )
    .unwrap();

    let settings = Settings::load(&path).unwrap();

    assert_eq!(settings.package_name, "org.example.log");
    assert_eq!(
        settings.listener_settings,
        Some(PathBuf::from("/data/enabled_listeners"))
    );
    assert_eq!(settings.compact_after_deletes, Some(5));
    assert_eq!(settings.ingest.queue_capacity, 64);
    assert_eq!(settings.ingest.write_timeout, Duration::from_millis(250));
    assert_eq!(settings.ingest.dedup_tolerance_ms, 10);
    assert_eq!(
        settings.ingest.removal_policy,
        RemovalPolicy::DeleteMostRecent
    );
}

#[test]
fn settings_reject_bad_values() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(&path, "removal_policy = \"sometimes\"\n").unwrap();

    assert!(matches!(
        Settings::load(&path),
        Err(LifecycleError::Config(_, _))
    ));
}

#[test]
fn config_paths_live_under_state_dir() {
    let config = Config::for_state_dir(PathBuf::from("/var/lib/nlog"), false);

    assert_eq!(config.lock_path, PathBuf::from("/var/lib/nlog/daemon.pid"));
    assert_eq!(config.log_path, PathBuf::from("/var/lib/nlog/daemon.log"));
    assert_eq!(
        config.wal_path,
        PathBuf::from("/var/lib/nlog/wal/events.wal")
    );
    assert!(config
        .socket_path
        .to_string_lossy()
        .ends_with(&format!("{}.sock", paths::state_hash(Path::new("/var/lib/nlog")))));
}

#[tokio::test]
async fn startup_then_shutdown_cleans_up() {
    let temp = tempdir().unwrap();
    let config = test_config(&temp);

    let mut daemon = startup(&config).await.unwrap();
    assert!(config.socket_path.exists());
    assert!(config.lock_path.exists());
    assert_eq!(
        std::fs::read_to_string(&config.version_path).unwrap(),
        env!("CARGO_PKG_VERSION")
    );

    daemon.shutdown().await.unwrap();
    assert!(!config.socket_path.exists());
    assert!(!config.lock_path.exists());
    assert!(!config.version_path.exists());
}

#[tokio::test]
async fn second_daemon_fails_without_touching_the_first() {
    let temp = tempdir().unwrap();
    let config = test_config(&temp);

    let _daemon = startup(&config).await.unwrap();
    let pid = std::fs::read_to_string(&config.lock_path).unwrap();

    let second = startup(&config).await;
    assert!(matches!(second, Err(LifecycleError::LockFailed(_))));
    assert!(config.socket_path.exists());
    assert_eq!(std::fs::read_to_string(&config.lock_path).unwrap(), pid);
}

#[tokio::test]
async fn denied_access_aborts_startup() {
    let temp = tempdir().unwrap();
    let mut config = test_config(&temp);
    config.assume_permitted = false;
    std::fs::create_dir_all(&config.state_dir).unwrap();
    let listeners = temp.path().join("enabled_listeners");
    std::fs::write(&listeners, "com.other/.Listener").unwrap();
    std::fs::write(
        &config.config_path,
        format!(
            "package_name = \"com.example.nlog\"\nlistener_settings = {:?}\n",
            listeners
        ),
    )
    .unwrap();

    let result = startup(&config).await;

    assert!(matches!(result, Err(LifecycleError::AccessDenied)));
    assert!(!config.socket_path.exists());
    assert!(!config.lock_path.exists());
    assert!(!config.wal_path.exists());
}

#[tokio::test]
async fn granted_access_starts() {
    let temp = tempdir().unwrap();
    let mut config = test_config(&temp);
    config.assume_permitted = false;
    std::fs::create_dir_all(&config.state_dir).unwrap();
    let listeners = temp.path().join("enabled_listeners");
    std::fs::write(
        &listeners,
        "com.other/.Listener:com.example.nlog/.NotificationListener",
    )
    .unwrap();
    std::fs::write(
        &config.config_path,
        format!("listener_settings = {:?}\n", listeners),
    )
    .unwrap();

    let mut daemon = startup(&config).await.unwrap();
    daemon.shutdown().await.unwrap();
}

#[tokio::test]
async fn history_is_reloaded_on_restart() {
    let temp = tempdir().unwrap();
    let config = test_config(&temp);

    let mut daemon = startup(&config).await.unwrap();
    daemon
        .context
        .ingest
        .on_posted(nlog_core::PostedEvent::new("com.mail", 1000));
    daemon.shutdown().await.unwrap();
    drop(daemon);

    let mut daemon = startup(&config).await.unwrap();
    assert_eq!(daemon.context.query.len(), 1);
    daemon.shutdown().await.unwrap();
}
