//! Tests for reloading the relay when its config file changes.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use courier::config::{RelaySettings, TomlConfigStore};
use courier::relay::{persist_mode, LogMode, LogRelay};
use courier::watcher::ConfigWatcher;

use crate::support::{config_toml, RecordingNotifier};

fn relay_over_file(path: &Path) -> Arc<LogRelay> {
    let store = Arc::new(TomlConfigStore::open(path).expect("should open"));
    Arc::new(LogRelay::new(
        store,
        Arc::new(RecordingNotifier::new()),
        RelaySettings::default(),
    ))
}

// Replace the file in one step, as `TomlConfigStore::save` does, so the
// watcher never sees a half-written file.
fn replace_file(path: &Path, contents: &str) {
    let staged = path.with_extension("toml.edit");
    std::fs::write(&staged, contents).expect("should write staged file");
    std::fs::rename(&staged, path).expect("should rename over config");
}

fn wait_for(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let started = Instant::now();
    while started.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    condition()
}

#[test]
fn mode_written_by_another_store_reaches_running_relay() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let path = tmp.path().join("courier.toml");
    std::fs::write(&path, config_toml(LogMode::ImportantOnly, &[1])).expect("should write");

    let relay = relay_over_file(&path);
    let watcher = ConfigWatcher::spawn(&path, Arc::clone(&relay)).expect("watcher should start");
    assert_eq!(watcher.path(), path.as_path());

    let cli_store = TomlConfigStore::open(&path).expect("should open");
    persist_mode(&cli_store, LogMode::Disabled).expect("should persist");

    assert!(
        wait_for(Duration::from_secs(5), || relay.mode() == LogMode::Disabled),
        "relay should observe the new mode"
    );
    assert!(!relay.is_logs_enabled());
}

#[test]
fn broken_edit_keeps_mode_until_fixed() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let path = tmp.path().join("courier.toml");
    std::fs::write(&path, config_toml(LogMode::AllLogs, &[1])).expect("should write");

    let relay = relay_over_file(&path);
    let _watcher = ConfigWatcher::spawn(&path, Arc::clone(&relay)).expect("watcher should start");

    replace_file(&path, "[telegram\nadmin_ids = ");
    std::thread::sleep(Duration::from_millis(300));
    assert_eq!(relay.mode(), LogMode::AllLogs);

    replace_file(&path, &config_toml(LogMode::ImportantOnly, &[1]));
    assert!(wait_for(Duration::from_secs(5), || {
        relay.mode() == LogMode::ImportantOnly
    }));
}

#[test]
fn missing_directory_is_an_error() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let path = tmp.path().join("absent").join("courier.toml");
    let relay = relay_over_file(&path);
    assert!(ConfigWatcher::spawn(&path, relay).is_err());
}
