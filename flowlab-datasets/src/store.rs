//! Opaque key-value blob storage.
//!
//! Every collection (datasets, evaluation runs, online configuration) is
//! stored as one JSON document under a single key and is always read and
//! written whole.

use crate::error::{DatasetError, DatasetResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Text blob store.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Read the blob under `key`.
    async fn get(&self, key: &str) -> DatasetResult<Option<String>>;

    /// Replace the blob under `key`.
    async fn set(&self, key: &str, value: String) -> DatasetResult<()>;
}

/// Logical keys of the persisted collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreKeys {
    /// Dataset collection.
    pub datasets: String,
    /// Evaluation run history.
    pub evaluation_runs: String,
    /// Online-evaluation configuration.
    pub online_config: String,
}

impl Default for StoreKeys {
    fn default() -> Self {
        Self {
            datasets: "flowlab.datasets".to_string(),
            evaluation_runs: "flowlab.evaluation_runs".to_string(),
            online_config: "flowlab.online_config".to_string(),
        }
    }
}

/// Decode the JSON document under `key`, or `None` when absent.
pub async fn read_json<T: DeserializeOwned>(
    store: &dyn BlobStore,
    key: &str,
) -> DatasetResult<Option<T>> {
    match store.get(key).await? {
        Some(text) => serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| DatasetError::corrupt(key, e.to_string())),
        None => Ok(None),
    }
}

/// Encode `value` as JSON and store it under `key`.
pub async fn write_json<T: Serialize + ?Sized>(
    store: &dyn BlobStore,
    key: &str,
    value: &T,
) -> DatasetResult<()> {
    let text = serde_json::to_string(value)?;
    store.set(key, text).await
}

/// In-memory blob store. Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBlobStore {
    blobs: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryBlobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }

    /// Remove everything.
    pub fn clear(&self) {
        self.blobs.write().clear();
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn get(&self, key: &str) -> DatasetResult<Option<String>> {
        Ok(self.blobs.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> DatasetResult<()> {
        self.blobs.write().insert(key.to_string(), value);
        Ok(())
    }
}

/// File-backed blob store: one `<key>.json` file per key.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    directory: PathBuf,
}

impl FileBlobStore {
    /// Create a store rooted at `directory`.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Ensure the directory exists.
    pub async fn ensure_dir(&self) -> DatasetResult<()> {
        tokio::fs::create_dir_all(&self.directory).await?;
        Ok(())
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.directory.join(format!("{}.json", file))
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn get(&self, key: &str) -> DatasetResult<Option<String>> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: String) -> DatasetResult<()> {
        self.ensure_dir().await?;
        tokio::fs::write(self.path_for(key), value).await?;
        Ok(())
    }
}
