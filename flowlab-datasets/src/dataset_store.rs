//! Dataset CRUD over a [`BlobStore`].

use crate::error::{DatasetError, DatasetResult};
use crate::identifier::IdGenerator;
use crate::model::{DataPoint, Dataset, DatasetSource};
use crate::store::{read_json, write_json, BlobStore};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

/// Persistent dataset collection.
///
/// Every operation reads or writes the full collection. Concurrent savers
/// may clobber each other; the store assumes a single writer.
#[derive(Clone)]
pub struct DatasetStore {
    store: Arc<dyn BlobStore>,
    ids: Arc<dyn IdGenerator>,
    key: String,
}

impl DatasetStore {
    /// Create a store persisting under `key`.
    pub fn new(
        store: Arc<dyn BlobStore>,
        ids: Arc<dyn IdGenerator>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            store,
            ids,
            key: key.into(),
        }
    }

    /// The store key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Build a new empty dataset with a fresh id. Nothing is persisted
    /// until [`save`](Self::save).
    pub fn create(
        &self,
        name: impl Into<String>,
        description: Option<String>,
        source: DatasetSource,
    ) -> Dataset {
        Dataset::new(self.ids.next_id("ds"), name, description, source)
    }

    /// Load every dataset in insertion order.
    pub async fn load(&self) -> DatasetResult<Vec<Dataset>> {
        Ok(read_json(self.store.as_ref(), &self.key)
            .await?
            .unwrap_or_default())
    }

    /// Get a dataset by id.
    pub async fn get(&self, id: &str) -> DatasetResult<Option<Dataset>> {
        Ok(self.load().await?.into_iter().find(|d| d.id == id))
    }

    /// Get a dataset by id, failing when absent.
    pub async fn require(&self, id: &str) -> DatasetResult<Dataset> {
        self.get(id)
            .await?
            .ok_or_else(|| DatasetError::NotFound(id.to_string()))
    }

    /// Insert or replace a dataset by id. An update refreshes `updated_at`;
    /// a new dataset is appended. Returns the stored value.
    pub async fn save(&self, mut dataset: Dataset) -> DatasetResult<Dataset> {
        let points = std::mem::take(&mut dataset.data_points);
        dataset.data_points = points.into_iter().map(DataPoint::normalized).collect();
        let mut all = self.load().await?;

        match all.iter_mut().find(|d| d.id == dataset.id) {
            Some(existing) => {
                dataset.updated_at = Utc::now();
                *existing = dataset.clone();
                debug!(dataset_id = %dataset.id, points = dataset.len(), "Updated dataset");
            }
            None => {
                all.push(dataset.clone());
                info!(dataset_id = %dataset.id, points = dataset.len(), "Created dataset");
            }
        }

        write_json(self.store.as_ref(), &self.key, &all).await?;
        Ok(dataset)
    }

    /// Remove a dataset. Returns whether it existed.
    pub async fn delete(&self, id: &str) -> DatasetResult<bool> {
        let mut all = self.load().await?;
        let before = all.len();
        all.retain(|d| d.id != id);
        let removed = all.len() != before;

        if removed {
            write_json(self.store.as_ref(), &self.key, &all).await?;
            info!(dataset_id = %id, "Deleted dataset");
        }
        Ok(removed)
    }
}

impl std::fmt::Debug for DatasetStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetStore").field("key", &self.key).finish()
    }
}
