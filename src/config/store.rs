//! Persisted key/value settings backed by a TOML document.
//!
//! Keys are dotted paths (`telegram.notifications.log_mode`) that resolve to
//! nested TOML tables. Reads never fail: a missing or mistyped value yields
//! the caller's default. Writes stay in memory until [`ConfigStore::save`].

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::Context;
use toml::{Table, Value};

/// Errors produced when mutating or persisting the store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An intermediate path segment exists but is not a table.
    #[error("config key '{key}' conflicts with non-table value at '{segment}'")]
    NotATable {
        /// Full dotted key being written.
        key: String,
        /// Segment that holds a scalar.
        segment: String,
    },

    /// The key is empty or has an empty segment.
    #[error("invalid config key '{0}'")]
    InvalidKey(String),

    /// Writing the backing file failed.
    #[error("failed to persist config: {0:#}")]
    Persist(anyhow::Error),

    /// Re-reading the backing file failed.
    #[error("failed to reload config: {0:#}")]
    Load(anyhow::Error),
}

/// A value that can be written through [`ConfigStore::set`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValue {
    /// Boolean flag.
    Bool(bool),
    /// Free-form string.
    String(String),
    /// List of integer identifiers (e.g. chat IDs).
    I64List(Vec<i64>),
}

impl From<ConfigValue> for Value {
    fn from(value: ConfigValue) -> Self {
        match value {
            ConfigValue::Bool(b) => Value::Boolean(b),
            ConfigValue::String(s) => Value::String(s),
            ConfigValue::I64List(ids) => {
                Value::Array(ids.into_iter().map(Value::Integer).collect())
            }
        }
    }
}

/// Read/write access to persisted settings.
///
/// Implementations use interior mutability so a single store can be shared
/// as `Arc<dyn ConfigStore>` between the relay and the CLI.
pub trait ConfigStore: Send + Sync {
    /// Read a boolean, or `default` if absent or not a boolean.
    fn get_bool(&self, key: &str, default: bool) -> bool;

    /// Read a string, or `default` if absent or not a string.
    fn get_string(&self, key: &str, default: &str) -> String;

    /// Read a list of integers. Absent keys and non-integer entries are skipped.
    fn get_i64_list(&self, key: &str) -> Vec<i64>;

    /// Stage a value in memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is malformed or collides with a scalar.
    fn set(&self, key: &str, value: ConfigValue) -> Result<(), StoreError>;

    /// Flush staged values to durable storage.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Persist`] if the backing file cannot be written.
    fn save(&self) -> Result<(), StoreError>;

    /// Replace in-memory values with the durable copy. Unsaved writes are lost.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Load`] if the durable copy cannot be read.
    fn reload(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// [`ConfigStore`] over a TOML table, optionally backed by a file.
#[derive(Debug)]
pub struct TomlConfigStore {
    path: Option<PathBuf>,
    table: Mutex<Table>,
}

impl TomlConfigStore {
    /// Open the store at `path`. A missing file yields an empty table.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let table = read_table(path)?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            table: Mutex::new(table),
        })
    }

    /// Build a store with no backing file. `save` is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if `toml_str` is not valid TOML.
    pub fn in_memory(toml_str: &str) -> anyhow::Result<Self> {
        let table = toml::from_str::<Table>(toml_str).context("failed to parse config")?;
        Ok(Self {
            path: None,
            table: Mutex::new(table),
        })
    }

    /// Path of the backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Snapshot the whole document, e.g. to deserialize a typed section.
    pub fn snapshot(&self) -> Table {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self, key: &str) -> Option<Value> {
        let table = self.lock();
        lookup(&table, key).cloned()
    }
}

impl ConfigStore for TomlConfigStore {
    fn get_bool(&self, key: &str, default: bool) -> bool {
        self.read(key)
            .and_then(|v| v.as_bool())
            .unwrap_or(default)
    }

    fn get_string(&self, key: &str, default: &str) -> String {
        match self.read(key) {
            Some(Value::String(s)) => s,
            _ => default.to_owned(),
        }
    }

    fn get_i64_list(&self, key: &str) -> Vec<i64> {
        match self.read(key) {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_integer).collect(),
            _ => Vec::new(),
        }
    }

    fn set(&self, key: &str, value: ConfigValue) -> Result<(), StoreError> {
        let mut table = self.lock();
        insert(&mut table, key, value.into())
    }

    fn save(&self) -> Result<(), StoreError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        let rendered = {
            let table = self.lock();
            toml::to_string_pretty(&*table)
                .context("failed to serialize config")
                .map_err(StoreError::Persist)?
        };
        write_atomic(path, &rendered).map_err(StoreError::Persist)
    }

    fn reload(&self) -> Result<(), StoreError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        let table = read_table(path).map_err(StoreError::Load)?;
        *self.lock() = table;
        Ok(())
    }
}

/// Read and parse `path`; a missing file is an empty table.
fn read_table(path: &Path) -> anyhow::Result<Table> {
    if !path.exists() {
        return Ok(Table::new());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config at {}", path.display()))?;
    toml::from_str::<Table>(&contents)
        .with_context(|| format!("failed to parse config at {}", path.display()))
}

/// Resolve a dotted key against nested tables.
fn lookup<'a>(table: &'a Table, key: &str) -> Option<&'a Value> {
    let mut segments = key.split('.');
    let first = segments.next()?;
    let mut current = table.get(first)?;
    for segment in segments {
        current = current.as_table()?.get(segment)?;
    }
    Some(current)
}

/// Insert `value` at a dotted key, creating intermediate tables.
fn insert(table: &mut Table, key: &str, value: Value) -> Result<(), StoreError> {
    let segments: Vec<&str> = key.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(StoreError::InvalidKey(key.to_owned()));
    }
    let Some((last, parents)) = segments.split_last() else {
        return Err(StoreError::InvalidKey(key.to_owned()));
    };

    let mut current = table;
    for segment in parents {
        let entry = current
            .entry((*segment).to_owned())
            .or_insert_with(|| Value::Table(Table::new()));
        current = entry.as_table_mut().ok_or_else(|| StoreError::NotATable {
            key: key.to_owned(),
            segment: (*segment).to_owned(),
        })?;
    }
    current.insert((*last).to_owned(), value);
    Ok(())
}

/// Write to a `.tmp` sibling first, then rename over the target.
fn write_atomic(path: &Path, contents: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, contents)
        .with_context(|| format!("failed to write config temp file at {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("failed to rename config file to {}", path.display()))?;
    Ok(())
}
