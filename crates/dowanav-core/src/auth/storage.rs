//! Key-value backends for the persisted session.
//!
//! The session manager only ever talks to a [`TokenStorage`]; which backend
//! sits behind it is decided by the owner (see [`crate::config::StorageKind`]).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use keyring::Entry;
use thiserror::Error;
use tracing::debug;

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode or decode stored session: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Storage lock poisoned")]
    Poisoned,
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Minimal get/set/remove interface over a durable key-value store.
pub trait TokenStorage: Send + Sync {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Removing a key that does not exist is not an error.
    fn remove(&self, key: &str) -> StorageResult<()>;
}

// ============================================================================
// In-memory
// ============================================================================

/// Process-local storage. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStorage for MemoryStorage {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let entries = self.entries.read().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut entries = self.entries.write().map_err(|_| StorageError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let mut entries = self.entries.write().map_err(|_| StorageError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

// ============================================================================
// JSON file
// ============================================================================

/// Stores every key in a single `session.json` object inside `dir`.
///
/// The file is re-read on each access so that two processes sharing a cache
/// directory see each other's writes. Writes hold a lock only within this
/// process.
pub struct FileStorage {
    dir: PathBuf,
    write_lock: RwLock<()>,
}

impl FileStorage {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            write_lock: RwLock::new(()),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }

    fn read_all(&self) -> StorageResult<HashMap<String, String>> {
        let path = self.path();
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let contents = std::fs::read_to_string(&path)?;
        if contents.trim().is_empty() {
            return Ok(HashMap::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn write_all(&self, entries: &HashMap<String, String>) -> StorageResult<()> {
        let path = self.path();
        if entries.is_empty() {
            if path.exists() {
                std::fs::remove_file(&path)?;
                debug!(path = %path.display(), "Removed empty session file");
            }
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(entries)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

impl TokenStorage for FileStorage {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let _guard = self.write_lock.read().map_err(|_| StorageError::Poisoned)?;
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let _guard = self.write_lock.write().map_err(|_| StorageError::Poisoned)?;
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let _guard = self.write_lock.write().map_err(|_| StorageError::Poisoned)?;
        let mut entries = self.read_all()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

// ============================================================================
// OS keychain
// ============================================================================

/// One keychain entry per key, grouped under `service`.
pub struct KeyringStorage {
    service: String,
}

impl KeyringStorage {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    fn entry(&self, key: &str) -> StorageResult<Entry> {
        Ok(Entry::new(&self.service, key)?)
    }
}

impl TokenStorage for KeyringStorage {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.entry(key)?.set_password(value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()), // Already deleted
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_set_get_remove() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("auth_token").unwrap(), None);

        storage.set("auth_token", "abc").unwrap();
        assert_eq!(storage.get("auth_token").unwrap().as_deref(), Some("abc"));

        storage.set("auth_token", "def").unwrap();
        assert_eq!(storage.get("auth_token").unwrap().as_deref(), Some("def"));

        storage.remove("auth_token").unwrap();
        assert_eq!(storage.get("auth_token").unwrap(), None);
    }

    #[test]
    fn test_memory_storage_remove_missing_is_ok() {
        let storage = MemoryStorage::new();
        assert!(storage.remove("nothing-here").is_ok());
    }

    #[test]
    fn test_file_storage_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let first = FileStorage::new(dir.path().join("nested"));
        first.set("auth_token", "abc").unwrap();
        first.set("refresh_token", "r1").unwrap();

        let second = FileStorage::new(dir.path().join("nested"));
        assert_eq!(second.get("auth_token").unwrap().as_deref(), Some("abc"));
        assert_eq!(second.get("refresh_token").unwrap().as_deref(), Some("r1"));
        assert_eq!(second.get("current_user").unwrap(), None);
    }

    #[test]
    fn test_file_storage_removes_file_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf());
        storage.set("auth_token", "abc").unwrap();
        assert!(storage.path().exists());

        storage.remove("auth_token").unwrap();
        assert!(!storage.path().exists());
        assert_eq!(storage.get("auth_token").unwrap(), None);
    }

    #[test]
    fn test_file_storage_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf());
        std::fs::write(storage.path(), "{not json").unwrap();
        assert!(matches!(
            storage.get("auth_token"),
            Err(StorageError::Serialize(_))
        ));
    }

    #[test]
    #[ignore] // Requires system keyring
    fn test_keyring_roundtrip() {
        let storage = KeyringStorage::new("dowanav-test");
        storage.set("auth_token", "test-access-token").unwrap();
        assert_eq!(
            storage.get("auth_token").unwrap().as_deref(),
            Some("test-access-token")
        );
        storage.remove("auth_token").unwrap();
        assert_eq!(storage.get("auth_token").unwrap(), None);
    }
}
