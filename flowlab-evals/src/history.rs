//! Persisted evaluation run history.

use crate::error::EvalResult;
use crate::run::EvaluationRun;
use flowlab_datasets::{read_json, write_json, BlobStore};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Runs kept by default.
pub const MAX_RUNS: usize = 50;

/// Most-recent-first run history under one store key.
#[derive(Clone)]
pub struct RunHistory {
    store: Arc<dyn BlobStore>,
    key: String,
    capacity: usize,
}

impl RunHistory {
    /// History persisting under `key`, keeping [`MAX_RUNS`] runs.
    pub fn new(store: Arc<dyn BlobStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            capacity: MAX_RUNS,
        }
    }

    /// Keep at most `capacity` runs.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Every stored run, newest first.
    pub async fn load(&self) -> EvalResult<Vec<EvaluationRun>> {
        Ok(read_json(self.store.as_ref(), &self.key)
            .await?
            .unwrap_or_default())
    }

    /// Store `run` at the front, replacing an older copy with the same id.
    /// Runs beyond the capacity are dropped from the back.
    pub async fn save(&self, run: &EvaluationRun) -> EvalResult<()> {
        let mut runs = self.load().await?;
        runs.retain(|r| r.id != run.id);
        runs.insert(0, run.clone());

        if runs.len() > self.capacity {
            let dropped = runs.len() - self.capacity;
            runs.truncate(self.capacity);
            debug!(dropped, capacity = self.capacity, "Truncated run history");
        }

        write_json(self.store.as_ref(), &self.key, &runs).await?;
        info!(run = %run.id, status = %run.status, "Saved evaluation run");
        Ok(())
    }

    /// Get a run by id.
    pub async fn get(&self, id: &str) -> EvalResult<Option<EvaluationRun>> {
        Ok(self.load().await?.into_iter().find(|r| r.id == id))
    }

    /// Remove a run. Returns whether it existed.
    pub async fn delete(&self, id: &str) -> EvalResult<bool> {
        let mut runs = self.load().await?;
        let before = runs.len();
        runs.retain(|r| r.id != id);
        if runs.len() == before {
            return Ok(false);
        }
        write_json(self.store.as_ref(), &self.key, &runs).await?;
        Ok(true)
    }

    /// Remove every run.
    pub async fn clear(&self) -> EvalResult<()> {
        write_json::<[EvaluationRun]>(self.store.as_ref(), &self.key, &[]).await?;
        Ok(())
    }
}

impl fmt::Debug for RunHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunHistory")
            .field("key", &self.key)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::{RunConfig, RunMode, RunStatus};
    use flowlab_datasets::InMemoryBlobStore;

    fn history() -> RunHistory {
        RunHistory::new(Arc::new(InMemoryBlobStore::new()), "runs")
    }

    fn run(id: &str) -> EvaluationRun {
        EvaluationRun::new(id, id, RunMode::Offline, RunConfig::default())
    }

    #[tokio::test]
    async fn test_most_recent_first() {
        let history = history();
        history.save(&run("a")).await.unwrap();
        history.save(&run("b")).await.unwrap();

        let ids: Vec<_> = history.load().await.unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_resave_moves_to_front() {
        let history = history();
        history.save(&run("a")).await.unwrap();
        history.save(&run("b")).await.unwrap();

        let mut updated = run("a");
        updated.start().unwrap();
        history.save(&updated).await.unwrap();

        let runs = history.load().await.unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].id, "a");
        assert_eq!(runs[0].status, RunStatus::Running);
    }

    #[tokio::test]
    async fn test_keeps_last_fifty() {
        let history = history();
        for i in 0..(MAX_RUNS + 5) {
            history.save(&run(&format!("run_{}", i))).await.unwrap();
        }
        let runs = history.load().await.unwrap();
        assert_eq!(runs.len(), MAX_RUNS);
        assert_eq!(runs[0].id, format!("run_{}", MAX_RUNS + 4));
        assert_eq!(runs[MAX_RUNS - 1].id, "run_5");
        assert!(history.get("run_4").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let history = history().with_capacity(3);
        history.save(&run("a")).await.unwrap();
        history.save(&run("b")).await.unwrap();

        assert!(history.delete("a").await.unwrap());
        assert!(!history.delete("a").await.unwrap());
        assert!(history.get("b").await.unwrap().is_some());

        history.clear().await.unwrap();
        assert!(history.load().await.unwrap().is_empty());
    }
}
