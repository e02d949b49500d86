//! Key-value string store holding user preferences.
//!
//! Persistence is best-effort: nothing in here ever fails a user-facing
//! operation. Failures are handed to an [`ErrorHook`] instead.

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::PathBuf,
    sync::Arc,
};

use parking_lot::Mutex;
use thiserror::Error;

use crate::model::{RecentSearches, Unit};

pub const RECENT_SEARCHES_KEY: &str = "recent_searches";
pub const UNIT_PREFERENCE_KEY: &str = "units";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize value for '{key}': {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("stored value for '{key}' is unreadable: {reason}")]
    Corrupt { key: String, reason: String },
}

/// Synchronous string store, the shape of a browser's local storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Store kept in memory only.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Store backed by a single JSON object on disk.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io { path: self.path.clone(), source }
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StorageError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&contents).map_err(|e| StorageError::Corrupt {
            key: self.path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        // A corrupt file is replaced; any other read failure aborts the write
        // so the keys already on disk survive.
        let mut values = match self.read_all() {
            Ok(values) => values,
            Err(StorageError::Corrupt { .. }) => BTreeMap::new(),
            Err(e) => return Err(e),
        };
        values.insert(key.to_string(), value.to_string());

        let json = serde_json::to_string_pretty(&values)
            .map_err(|source| StorageError::Serialize { key: key.to_string(), source })?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        fs::write(&self.path, json).map_err(|e| self.io_error(e))
    }
}

/// Receives every persistence failure.
pub trait ErrorHook: Send + Sync {
    fn report(&self, error: &StorageError);
}

/// Default hook: log and move on.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogHook;

impl ErrorHook for LogHook {
    fn report(&self, error: &StorageError) {
        tracing::warn!(%error, "preference storage failed");
    }
}

/// Reads and writes the two persisted preferences.
pub struct Preferences {
    store: Box<dyn KeyValueStore>,
    hook: Box<dyn ErrorHook>,
}

impl std::fmt::Debug for Preferences {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preferences").finish_non_exhaustive()
    }
}

impl Preferences {
    pub fn new(store: impl KeyValueStore + 'static) -> Self {
        Self::with_hook(store, LogHook)
    }

    pub fn with_hook(store: impl KeyValueStore + 'static, hook: impl ErrorHook + 'static) -> Self {
        Self { store: Box::new(store), hook: Box::new(hook) }
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                self.hook.report(&e);
                None
            }
        }
    }

    fn write(&self, key: &str, value: &str) {
        if let Err(e) = self.store.set(key, value) {
            self.hook.report(&e);
        }
    }

    /// Missing or unreadable lists load as empty.
    pub fn load_recent(&self) -> RecentSearches {
        let Some(raw) = self.read(RECENT_SEARCHES_KEY) else {
            return RecentSearches::default();
        };
        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(cities) => RecentSearches::from_vec(cities),
            Err(e) => {
                self.hook.report(&StorageError::Corrupt {
                    key: RECENT_SEARCHES_KEY.to_string(),
                    reason: e.to_string(),
                });
                RecentSearches::default()
            }
        }
    }

    pub fn save_recent(&self, recent: &RecentSearches) {
        match serde_json::to_string(recent.as_slice()) {
            Ok(json) => self.write(RECENT_SEARCHES_KEY, &json),
            Err(source) => self.hook.report(&StorageError::Serialize {
                key: RECENT_SEARCHES_KEY.to_string(),
                source,
            }),
        }
    }

    /// `None` when nothing usable is stored.
    pub fn load_unit(&self) -> Option<Unit> {
        let raw = self.read(UNIT_PREFERENCE_KEY)?;
        match raw.parse::<Unit>() {
            Ok(unit) => Some(unit),
            Err(e) => {
                self.hook.report(&StorageError::Corrupt {
                    key: UNIT_PREFERENCE_KEY.to_string(),
                    reason: e.to_string(),
                });
                None
            }
        }
    }

    pub fn save_unit(&self, unit: Unit) {
        self.write(UNIT_PREFERENCE_KEY, unit.as_str());
    }
}
