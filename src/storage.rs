//! On-device key-value storage.
//!
//! Every record is a named string. Structured values are JSON-encoded before
//! they are written and decoded after they are read; a record that fails to
//! decode is treated as absent. Write failures are logged by the typed
//! helpers and never reach the caller.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::error::StorageError;

/// Record names shared with every client of the store.
pub mod keys {
    pub const CURRENT_USER: &str = "muse_current_user";
    pub const GUEST_ID: &str = "muse_guest_id";
    pub const CHARACTERS: &str = "muse_characters";
    pub const DEADLINE: &str = "muse_deadline";
    pub const LOCATION: &str = "muse_location";

    const VOTE_PREFIX: &str = "muse_vote_";

    pub fn vote_receipt(identity: &str) -> String {
        format!("{VOTE_PREFIX}{identity}")
    }
}

/// A key that was written or removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreChange {
    pub key: String,
}

pub trait LocalStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;

    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}

/// Reads and decodes a JSON record. Malformed content counts as absent.
pub fn load_json<T: DeserializeOwned>(store: &dyn LocalStore, key: &str) -> Option<T> {
    let raw = store.get(key)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Discarding malformed record {}: {}", key, e);
            None
        }
    }
}

/// Encodes and writes a JSON record. Returns whether the write landed.
pub fn save_json<T: Serialize>(store: &dyn LocalStore, key: &str, value: &T) -> bool {
    let encoded = match serde_json::to_string(value) {
        Ok(encoded) => encoded,
        Err(e) => {
            tracing::error!("Could not encode record {}: {}", key, e);
            return false;
        }
    };
    save_text(store, key, &encoded)
}

pub fn save_text(store: &dyn LocalStore, key: &str, value: &str) -> bool {
    match store.set(key, value) {
        Ok(()) => true,
        Err(e) => {
            tracing::error!("Could not write record {}: {}", key, e);
            false
        }
    }
}

pub fn remove_key(store: &dyn LocalStore, key: &str) {
    if let Err(e) = store.remove(key) {
        tracing::error!("Could not remove record {}: {}", key, e);
    }
}

fn change_channel() -> broadcast::Sender<StoreChange> {
    let (tx, _) = broadcast::channel(64);
    tx
}

/// Store held entirely in memory. An optional byte quota mimics the limits
/// of a browser store.
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    quota: Option<usize>,
    changes: broadcast::Sender<StoreChange>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            quota: None,
            changes: change_channel(),
        }
    }

    pub fn with_quota(bytes: usize) -> Self {
        Self {
            quota: Some(bytes),
            ..Self::new()
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(quota) = self.quota {
                let used: usize = entries
                    .iter()
                    .filter(|(k, _)| k.as_str() != key)
                    .map(|(k, v)| k.len() + v.len())
                    .sum();
                if used + key.len() + value.len() > quota {
                    return Err(StorageError::QuotaExceeded {
                        key: key.to_string(),
                    });
                }
            }
            entries.insert(key.to_string(), value.to_string());
        }
        let _ = self.changes.send(StoreChange {
            key: key.to_string(),
        });
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let removed = {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            entries.remove(key).is_some()
        };
        if removed {
            let _ = self.changes.send(StoreChange {
                key: key.to_string(),
            });
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

/// Store persisted as a single JSON object on disk. Writing a value that is
/// already stored does not touch the file.
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
    changes: broadcast::Sender<StoreChange>,
}

impl FileStore {
    /// Opens the store at `path`. A missing file starts empty; an unreadable
    /// or malformed one is logged and also starts empty.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!("Ignoring malformed store file {}: {}", path.display(), e);
                HashMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                tracing::warn!("Could not read store file {}: {}", path.display(), e);
                HashMap::new()
            }
        };
        tracing::debug!("Opened store {} with {} records", path.display(), entries.len());

        Self {
            path,
            entries: Mutex::new(entries),
            changes: change_channel(),
        }
    }

    fn flush(&self, entries: &HashMap<String, String>) -> Result<(), StorageError> {
        let encoded = serde_json::to_vec_pretty(entries)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, encoded)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl LocalStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            if entries.get(key).is_some_and(|current| current == value) {
                return Ok(());
            }
            let previous = entries.insert(key.to_string(), value.to_string());
            if let Err(e) = self.flush(&entries) {
                match previous {
                    Some(old) => entries.insert(key.to_string(), old),
                    None => entries.remove(key),
                };
                return Err(e);
            }
        }
        let _ = self.changes.send(StoreChange {
            key: key.to_string(),
        });
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            if entries.remove(key).is_none() {
                return Ok(());
            }
            self.flush(&entries)?;
        }
        let _ = self.changes.send(StoreChange {
            key: key.to_string(),
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}
