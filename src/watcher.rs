//! Hot reload of the relay switches when `courier.toml` changes on disk.
//!
//! `courier mode` runs as a separate process and rewrites the file; a
//! running `courier pipe` picks the change up through this watcher.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use crate::relay::LogRelay;

/// Keeps the file watcher alive. Dropping it stops reloading.
pub struct ConfigWatcher {
    path: PathBuf,
    _watcher: RecommendedWatcher,
}

impl std::fmt::Debug for ConfigWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigWatcher")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl ConfigWatcher {
    /// Watch `config_path` and call [`LogRelay::reload_config`] whenever it
    /// is written or replaced.
    ///
    /// The parent directory is watched so atomic rename-over saves are seen.
    ///
    /// # Errors
    ///
    /// Returns an error if the path has no file name or the watcher cannot
    /// be initialized.
    pub fn spawn(config_path: &Path, relay: Arc<LogRelay>) -> anyhow::Result<Self> {
        let file_name = config_path
            .file_name()
            .map(OsString::from)
            .ok_or_else(|| {
                anyhow::anyhow!("config path has no file name: {}", config_path.display())
            })?;
        let dir = match config_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (tx, rx) = std::sync::mpsc::channel::<PathBuf>();
        let mut watcher =
            notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
                if let Ok(evt) = event {
                    for path in evt.paths {
                        if let Err(e) = tx.send(path) {
                            warn!(error = %e, "failed to send watcher event");
                        }
                    }
                }
            })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        // Exits when the watcher, and with it the sender, is dropped.
        std::thread::spawn(move || {
            while let Ok(path) = rx.recv() {
                if path.file_name() != Some(file_name.as_os_str()) {
                    continue;
                }
                match relay.reload_config() {
                    Ok(snapshot) => debug!(
                        mode = %snapshot.mode,
                        destinations = snapshot.destinations.len(),
                        "relay config reloaded from disk"
                    ),
                    Err(e) => warn!(error = %e, "failed to reload relay config"),
                }
            }
        });

        info!(path = %config_path.display(), "watching config for changes");
        Ok(Self {
            path: config_path.to_path_buf(),
            _watcher: watcher,
        })
    }

    /// File being watched.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
