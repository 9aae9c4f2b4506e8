//! Local key-value persistence.
//!
//! [`KeyValueStore`] is the device-storage capability; [`credentials`] and
//! [`lists`] layer the app's key conventions on top of it.

pub mod credentials;
pub mod lists;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{OpendError, Result};

pub use credentials::CredentialStore;
pub use lists::{ListEntry, ListKind, NftListStore};

/// String key-value storage.
///
/// `set_many` and `remove_many` must apply all-or-nothing: readers never
/// observe half of a batch.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.set_many(&[(key, value)]).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.remove_many(&[key]).await
    }

    async fn set_many(&self, entries: &[(&str, &str)]) -> Result<()>;

    async fn remove_many(&self, keys: &[&str]) -> Result<()>;
}

/// In-memory store, used by tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
    writes: std::sync::atomic::AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set_many` batches applied so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub async fn keys(&self) -> Vec<String> {
        self.entries.lock().await.keys().cloned().collect()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        let mut map = self.entries.lock().await;
        for (k, v) in entries {
            map.insert((*k).to_string(), (*v).to_string());
        }
        self.writes
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    async fn remove_many(&self, keys: &[&str]) -> Result<()> {
        let mut map = self.entries.lock().await;
        for k in keys {
            map.remove(*k);
        }
        Ok(())
    }
}

/// Store backed by a single JSON object file.
///
/// Every mutation rewrites the file through a temporary sibling and a rename,
/// so a killed process leaves either the old or the new contents.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    cache: Mutex<Option<BTreeMap<String, String>>>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) if text.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(text) => match serde_json::from_str(&text) {
                Ok(map) => Ok(map),
                Err(e) => {
                    let aside = self.path.with_extension("corrupt");
                    warn!(path = %self.path.display(), error = %e, "store file is corrupt, starting empty");
                    if let Err(e) = tokio::fs::rename(&self.path, &aside).await {
                        warn!(path = %aside.display(), error = %e, "failed to move corrupt store aside");
                    }
                    Ok(BTreeMap::new())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn persist(&self, map: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        let body = serde_json::to_vec_pretty(map)?;
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), keys = map.len(), "store persisted");
        Ok(())
    }

    async fn with_map<T>(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, String>) -> (T, bool),
    ) -> Result<T> {
        let mut cache = self.cache.lock().await;
        if cache.is_none() {
            *cache = Some(self.load().await?);
        }
        let Some(map) = cache.as_mut() else {
            return Err(OpendError::Storage("store cache unavailable".into()));
        };

        let mut next = map.clone();
        let (out, dirty) = f(&mut next);
        if dirty {
            self.persist(&next).await?;
            *map = next;
        }
        Ok(out)
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.with_map(|map| (map.get(key).cloned(), false)).await
    }

    async fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        self.with_map(|map| {
            for (k, v) in entries {
                map.insert((*k).to_string(), (*v).to_string());
            }
            ((), true)
        })
        .await
    }

    async fn remove_many(&self, keys: &[&str]) -> Result<()> {
        self.with_map(|map| {
            let mut dirty = false;
            for k in keys {
                dirty |= map.remove(*k).is_some();
            }
            ((), dirty)
        })
        .await
    }
}
