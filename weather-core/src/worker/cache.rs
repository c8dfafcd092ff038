//! Named response caches, keyed by generation name then by absolute URL.
//!
//! [`CacheStorage`] is a shared handle: it belongs to the origin, not to a
//! worker, so a new worker generation sees (and purges) what older ones
//! stored.

use std::{collections::BTreeMap, fs, io, path::Path, sync::Arc};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::network::Response;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub response: Response,
    pub cached_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cache {
    entries: BTreeMap<String, CachedResponse>,
}

impl Cache {
    pub fn put(&mut self, url: &str, response: Response) {
        self.entries.insert(
            url.to_string(),
            CachedResponse {
                response,
                cached_at: Utc::now(),
            },
        );
    }

    pub fn match_url(&self, url: &str) -> Option<&CachedResponse> {
        self.entries.get(url)
    }

    pub fn keys(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CacheStorage {
    caches: Arc<RwLock<BTreeMap<String, Cache>>>,
}

impl CacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, name: &str) -> bool {
        self.caches.read().contains_key(name)
    }

    pub fn keys(&self) -> Vec<String> {
        self.caches.read().keys().cloned().collect()
    }

    pub fn delete(&self, name: &str) -> bool {
        self.caches.write().remove(name).is_some()
    }

    /// Store every pair in the named cache, creating it if needed.
    pub fn put_all(&self, name: &str, responses: impl IntoIterator<Item = (String, Response)>) {
        let mut caches = self.caches.write();
        let cache = caches.entry(name.to_string()).or_default();
        for (url, response) in responses {
            cache.put(&url, response);
        }
    }

    /// First hit for `url` across all caches.
    pub fn match_url(&self, url: &str) -> Option<Response> {
        self.caches
            .read()
            .values()
            .find_map(|cache| cache.match_url(url))
            .map(|hit| hit.response.clone())
    }

    pub fn match_in(&self, name: &str, url: &str) -> Option<Response> {
        self.caches
            .read()
            .get(name)?
            .match_url(url)
            .map(|hit| hit.response.clone())
    }

    pub fn entry_count(&self, name: &str) -> usize {
        self.caches.read().get(name).map_or(0, Cache::len)
    }

    /// Load a snapshot written by [`CacheStorage::save`]. A missing or
    /// corrupt file is an empty storage.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Failed to read cache snapshot: {}", path.display()));
            }
        };

        let caches: BTreeMap<String, Cache> = match serde_json::from_str(&contents) {
            Ok(caches) => caches,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Ignoring corrupt cache snapshot");
                return Ok(Self::new());
            }
        };

        Ok(Self {
            caches: Arc::new(RwLock::new(caches)),
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create cache directory: {}", parent.display())
            })?;
        }

        let json = serde_json::to_string(&*self.caches.read())
            .context("Failed to serialize cache snapshot")?;

        // The snapshot is replaced whole or not at all.
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, json)
            .with_context(|| format!("Failed to write cache snapshot: {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to replace cache snapshot: {}", path.display()))
    }
}
