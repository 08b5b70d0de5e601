//! Local persistence for the timer runtime
//!
//! Raw key-value backends implement [`KeyValueStore`]:
//!
//! - [`SledStore`] -- embedded `sled` database on disk, survives restarts.
//! - [`MemoryStore`] -- process-local map, for tests and ephemeral runs.
//!
//! [`LocalState`] sits on top and gives the runtime typed, namespaced,
//! failure-tolerant access. Nothing stored here is authoritative; the
//! backend is.

use crate::error::StorageError;
use directories::ProjectDirs;
use sled::Db;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub mod local;
pub mod types;

pub use local::LocalState;
pub use types::StoredActiveSession;

/// Byte-oriented key-value storage
pub trait KeyValueStore: Send + Sync {
    /// Read a value
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Write a value
    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;

    /// Delete a value; deleting a missing key is not an error
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Key-value store backed by an embedded `sled` database
pub struct SledStore {
    db: Db,
}

impl SledStore {
    /// Open or create a store at `path`
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Backend` if the database cannot be opened
    ///
    /// # Examples
    ///
    /// ```
    /// use coursetimers::storage::{KeyValueStore, SledStore};
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let store = SledStore::open(dir.path().join("state")).unwrap();
    /// store.set("greeting", b"hello").unwrap();
    /// assert_eq!(store.get("greeting").unwrap(), Some(b"hello".to_vec()));
    /// ```
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Location(format!(
                    "Failed to create {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Default on-disk location in the user's data directory
    pub fn default_path() -> Result<PathBuf, StorageError> {
        let dirs = ProjectDirs::from("org", "coursetimers", "coursetimers").ok_or_else(|| {
            StorageError::Location("Could not determine data directory".to_string())
        })?;
        Ok(dirs.data_dir().join("state"))
    }
}

impl KeyValueStore for SledStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.db.get(key.as_bytes())?.map(|value| value.to_vec()))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.db.insert(key.as_bytes(), value)?;
        self.db.flush()?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.db.remove(key.as_bytes())?;
        self.db.flush()?;
        Ok(())
    }
}

/// Process-local key-value store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.entries().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries().remove(key);
        Ok(())
    }
}
