use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde_json::{Map, Value};

use crate::error::Error;

/// Persistent key/value storage backing the session.
///
/// Plays the role browser local storage plays for a web dashboard: string
/// values under string keys, surviving process restarts.
pub trait TokenStorage: Send + Sync + 'static {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the backing medium is unreadable or corrupt.
    fn get(&self, key: &str) -> Result<Option<String>, Error>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the value could not be persisted.
    fn set(&self, key: &str, value: &str) -> Result<(), Error>;

    /// Remove `key`. Removing an absent key succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the backing medium could not be updated.
    fn remove(&self, key: &str) -> Result<(), Error>;
}

/// JSON file storage with owner-only permissions (0600 on Unix).
///
/// The file holds one JSON object mapping keys to string values. Keys this
/// crate does not own are preserved on every write.
pub struct FileStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<Map<String, Value>, Error> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let contents = fs::read_to_string(&self.path).map_err(|e| {
            Error::Storage(format!("failed to read {}: {e}", self.path.display()))
        })?;
        if contents.trim().is_empty() {
            return Ok(Map::new());
        }
        serde_json::from_str(&contents)
            .map_err(|e| Error::Storage(format!("failed to parse {}: {e}", self.path.display())))
    }

    // A corrupt file must not block sign-in, so writes start from scratch.
    fn read_map_for_write(&self) -> Map<String, Value> {
        self.read_map().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Discarding unreadable session storage");
            Map::new()
        })
    }

    fn write_map(&self, map: &Map<String, Value>) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    Error::Storage(format!("failed to create {}: {e}", parent.display()))
                })?;
            }
        }

        let contents = serde_json::to_string_pretty(map)
            .map_err(|e| Error::Storage(format!("failed to serialize storage: {e}")))?;

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&self.path).map_err(|e| {
            Error::Storage(format!("failed to open {}: {e}", self.path.display()))
        })?;
        file.write_all(contents.as_bytes()).map_err(|e| {
            Error::Storage(format!("failed to write {}: {e}", self.path.display()))
        })
    }
}

impl TokenStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let map = self.read_map()?;
        match map.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(value)) => Ok(Some(value.clone())),
            Some(_) => Err(Error::Storage(format!("value under {key} is not a string"))),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut map = self.read_map_for_write();
        map.insert(key.to_owned(), Value::String(value.to_owned()));
        self.write_map(&map)
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut map = self.read_map_for_write();
        if map.remove(key).is_none() {
            return Ok(());
        }
        self.write_map(&map)
    }
}

/// In-process storage. Nothing survives the process; useful for tests and
/// throwaway sessions.
#[derive(Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.remove(key);
        Ok(())
    }
}
