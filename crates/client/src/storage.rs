//! Durable local key-value storage.
//!
//! Session credentials and cart lines survive process restarts through a
//! small namespaced store. Each key is written independently: clearing the
//! credential never touches the cart lines and vice versa. Values are JSON
//! strings; callers own (de)serialization.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;

/// Storage keys for client state.
pub mod keys {
    /// Key for the persisted session credential.
    pub const CREDENTIAL: &str = "credential";

    /// Key for the persisted cart line list.
    pub const CART_LINES: &str = "cart_lines";
}

/// Errors from the local durable store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),
}

/// A durable key-value store for client state.
///
/// Implementations must be safe to call from multiple tasks; writes are
/// synchronous from the caller's perspective.
pub trait StateStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn put(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete the value under `key`. Deleting a missing key is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// File-backed store: one JSON file per key under a state directory.
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Open (creating if needed) a store rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        // Keys become file names; restrict them so a key can never escape
        // the state directory.
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }

    /// The directory backing this store.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl StateStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        // Write-then-rename so a crash mid-write never truncates the
        // previous value.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory store for tests and ephemeral contexts.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonFileStore::new(dir.path()).expect("store");

        assert_eq!(store.get(keys::CREDENTIAL).expect("get"), None);

        store.put(keys::CREDENTIAL, "{\"a\":1}").expect("put");
        assert_eq!(
            store.get(keys::CREDENTIAL).expect("get"),
            Some("{\"a\":1}".to_string())
        );

        store.delete(keys::CREDENTIAL).expect("delete");
        assert_eq!(store.get(keys::CREDENTIAL).expect("get"), None);

        // Deleting again is a no-op.
        store.delete(keys::CREDENTIAL).expect("delete");
    }

    #[test]
    fn test_keys_are_independent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonFileStore::new(dir.path()).expect("store");

        store.put(keys::CREDENTIAL, "cred").expect("put");
        store.put(keys::CART_LINES, "[]").expect("put");

        store.delete(keys::CREDENTIAL).expect("delete");

        assert_eq!(store.get(keys::CREDENTIAL).expect("get"), None);
        assert_eq!(
            store.get(keys::CART_LINES).expect("get"),
            Some("[]".to_string())
        );
    }

    #[test]
    fn test_rejects_path_traversal_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonFileStore::new(dir.path()).expect("store");

        assert!(matches!(
            store.put("../escape", "x"),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(store.get(""), Err(StorageError::InvalidKey(_))));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        store.put("k", "v").expect("put");
        assert_eq!(store.get("k").expect("get"), Some("v".to_string()));
        store.delete("k").expect("delete");
        assert_eq!(store.get("k").expect("get"), None);
    }
}
