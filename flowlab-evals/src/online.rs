//! Online evaluation configuration.

use crate::error::EvalResult;
use crate::types::EvaluatorConfig;
use flowlab_datasets::{read_json, write_json, BlobStore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Whether and how live executions are sampled for evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OnlineEvaluationConfig {
    /// Sampling switch.
    pub enabled: bool,
    /// Share of executions sampled, in `[0, 1]`.
    pub sampling_rate: f64,
    /// Evaluators applied to sampled executions.
    pub evaluators: Vec<EvaluatorConfig>,
    /// Dataset sampled executions are appended to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset_id: Option<String>,
}

impl Default for OnlineEvaluationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sampling_rate: 0.1,
            evaluators: Vec::new(),
            dataset_id: None,
        }
    }
}

impl OnlineEvaluationConfig {
    /// Whether an execution with random `roll` in `[0, 1)` is sampled.
    pub fn should_sample(&self, roll: f64) -> bool {
        self.enabled && !self.evaluators.is_empty() && roll < self.sampling_rate.clamp(0.0, 1.0)
    }
}

/// Load/save of the [`OnlineEvaluationConfig`] under one store key.
#[derive(Clone)]
pub struct OnlineConfigStore {
    store: Arc<dyn BlobStore>,
    key: String,
}

impl OnlineConfigStore {
    /// Store persisting under `key`.
    pub fn new(store: Arc<dyn BlobStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// The stored configuration, or the default when none was saved.
    pub async fn load(&self) -> EvalResult<OnlineEvaluationConfig> {
        Ok(read_json(self.store.as_ref(), &self.key)
            .await?
            .unwrap_or_default())
    }

    /// Replace the stored configuration.
    pub async fn save(&self, config: &OnlineEvaluationConfig) -> EvalResult<()> {
        write_json(self.store.as_ref(), &self.key, config).await?;
        info!(
            enabled = config.enabled,
            sampling_rate = config.sampling_rate,
            "Saved online evaluation config"
        );
        Ok(())
    }
}

impl fmt::Debug for OnlineConfigStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnlineConfigStore")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EvaluatorType;
    use flowlab_datasets::InMemoryBlobStore;
    use rstest::rstest;

    fn enabled(rate: f64) -> OnlineEvaluationConfig {
        OnlineEvaluationConfig {
            enabled: true,
            sampling_rate: rate,
            evaluators: vec![EvaluatorConfig::new(EvaluatorType::Contains)],
            dataset_id: None,
        }
    }

    #[rstest]
    #[case(0.25, 0.1, true)]
    #[case(0.25, 0.25, false)]
    #[case(0.0, 0.0, false)]
    #[case(1.0, 0.999, true)]
    #[case(3.0, 0.999, true)]
    fn test_should_sample(#[case] rate: f64, #[case] roll: f64, #[case] sampled: bool) {
        assert_eq!(enabled(rate).should_sample(roll), sampled);
    }

    #[test]
    fn test_disabled_never_samples() {
        let mut config = enabled(1.0);
        config.enabled = false;
        assert!(!config.should_sample(0.0));
        assert!(!OnlineEvaluationConfig {
            evaluators: Vec::new(),
            ..enabled(1.0)
        }
        .should_sample(0.0));
    }

    #[tokio::test]
    async fn test_load_default_then_save() {
        let store = OnlineConfigStore::new(Arc::new(InMemoryBlobStore::new()), "online");
        assert_eq!(store.load().await.unwrap(), OnlineEvaluationConfig::default());

        let config = OnlineEvaluationConfig {
            dataset_id: Some("ds_1".to_string()),
            ..enabled(0.5)
        };
        store.save(&config).await.unwrap();
        assert_eq!(store.load().await.unwrap(), config);
    }
}
