//! Local persistence for the page's small lists.
//!
//! A [`KeyValueStore`] is the per-origin string store; a [`JsonSlot`] binds
//! one [`StoreKey`] to one value type and is handed to the component that
//! owns that key. Nothing else reads or writes the key.

use std::{
    collections::HashMap,
    fmt::Debug,
    fs, io,
    marker::PhantomData,
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::Mutex;
use serde::{Serialize, de::DeserializeOwned};
use tracing::warn;

use crate::error::StoreError;

/// The fixed keys this app persists under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKey {
    RecentSearches,
    OfflineQueue,
}

impl StoreKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKey::RecentSearches => "recentSearches",
            StoreKey::OfflineQueue => "offlineWeatherQueue",
        }
    }
}

/// String-valued storage with synchronous writes.
pub trait KeyValueStore: Send + Sync + Debug {
    fn get(&self, key: StoreKey) -> Result<Option<String>, StoreError>;
    fn set(&self, key: StoreKey, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: StoreKey) -> Result<(), StoreError>;
}

/// One JSON file per key inside a data directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: StoreKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.as_str()))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: StoreKey) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    fn set(&self, key: StoreKey, value: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;

        // Write beside the target, then rename over it: a reader sees the old
        // value or the new one, never a partial write.
        let path = self.path_for(key);
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, value).map_err(|source| StoreError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, &path).map_err(|source| StoreError::Io { path, source })
    }

    fn remove(&self, key: StoreKey) -> Result<(), StoreError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }
}

/// In-memory store; nothing outlives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<StoreKey, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: StoreKey) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().get(&key).cloned())
    }

    fn set(&self, key: StoreKey, value: &str) -> Result<(), StoreError> {
        self.entries.lock().insert(key, value.to_string());
        Ok(())
    }

    fn remove(&self, key: StoreKey) -> Result<(), StoreError> {
        self.entries.lock().remove(&key);
        Ok(())
    }
}

/// A typed view of one key.
#[derive(Debug)]
pub struct JsonSlot<T> {
    key: StoreKey,
    store: Arc<dyn KeyValueStore>,
    _value: PhantomData<fn() -> T>,
}

impl<T> Clone for JsonSlot<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            store: Arc::clone(&self.store),
            _value: PhantomData,
        }
    }
}

impl<T: Serialize + DeserializeOwned> JsonSlot<T> {
    pub fn new(store: Arc<dyn KeyValueStore>, key: StoreKey) -> Self {
        Self {
            key,
            store,
            _value: PhantomData,
        }
    }

    pub fn key(&self) -> StoreKey {
        self.key
    }

    /// The stored value, or `None` when missing, unreadable or corrupt.
    pub fn load(&self) -> Option<T> {
        let raw = match self.store.get(self.key) {
            Ok(raw) => raw?,
            Err(err) => {
                warn!(key = self.key.as_str(), error = %err, "Failed to read stored value");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key = self.key.as_str(), error = %err, "Ignoring corrupt stored value");
                None
            }
        }
    }

    pub fn save(&self, value: &T) -> Result<(), StoreError> {
        let json = serde_json::to_string(value).map_err(|source| StoreError::Serialize {
            key: self.key.as_str(),
            source,
        })?;
        self.store.set(self.key, &json)
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.remove(self.key)
    }
}
