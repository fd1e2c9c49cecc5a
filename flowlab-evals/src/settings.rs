//! Settings documents and default evaluator configurations.

use crate::error::{EvalError, EvalResult};
use crate::runner::EvalOptions;
use crate::scorers::{
    ContainsConfig, ContextPrecisionConfig, ExactMatchConfig, JsonSimilarityConfig,
    OutputJudgeConfig, TrajectoryJudgeConfig, TrajectoryMatchConfig,
};
use crate::types::{EvaluatorConfig, EvaluatorType};
use flowlab_datasets::{BlobStore, FileBlobStore, InMemoryBlobStore, Record, StoreKeys};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

fn options_record<T: Serialize>(options: &T) -> Record {
    match serde_json::to_value(options) {
        Ok(Value::Object(map)) => map,
        _ => Record::new(),
    }
}

/// Default options for one evaluator type, as a config record.
pub fn default_options(evaluator_type: EvaluatorType) -> Record {
    match evaluator_type {
        EvaluatorType::ExactMatch => options_record(&ExactMatchConfig::default()),
        EvaluatorType::Contains => options_record(&ContainsConfig::default()),
        EvaluatorType::JsonSimilarity => options_record(&JsonSimilarityConfig::default()),
        EvaluatorType::ContextPrecision => options_record(&ContextPrecisionConfig::default()),
        EvaluatorType::LlmJudgeOutput => options_record(&OutputJudgeConfig::default()),
        EvaluatorType::LlmJudgeTrajectory => options_record(&TrajectoryJudgeConfig::default()),
        EvaluatorType::TrajectoryMatch => options_record(&TrajectoryMatchConfig::default()),
    }
}

/// One config per evaluator type with its default options.
pub fn default_evaluators() -> Vec<EvaluatorConfig> {
    EvaluatorType::ALL
        .iter()
        .map(|&t| EvaluatorConfig {
            config: default_options(t),
            ..EvaluatorConfig::new(t)
        })
        .collect()
}

/// Evaluation settings, as read from YAML or JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EvalSettings {
    /// Data points evaluated at once.
    pub concurrency: usize,
    /// Per-evaluator deadline in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluator_timeout_ms: Option<u64>,
    /// Run a case's evaluators concurrently.
    pub parallel_evaluators: bool,
    /// Stop a dataset run after the first failed case.
    pub fail_fast: bool,
    /// Directory for file-backed persistence; in-memory when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_dir: Option<PathBuf>,
    /// Persistence keys.
    pub store_keys: StoreKeys,
    /// Evaluators applied when a run names none.
    pub evaluators: Vec<EvaluatorConfig>,
}

impl Default for EvalSettings {
    fn default() -> Self {
        let options = EvalOptions::default();
        Self {
            concurrency: options.concurrency,
            evaluator_timeout_ms: None,
            parallel_evaluators: options.parallel_evaluators,
            fail_fast: options.fail_fast,
            store_dir: None,
            store_keys: StoreKeys::default(),
            evaluators: default_evaluators(),
        }
    }
}

impl EvalSettings {
    /// Parse a YAML document.
    pub fn from_yaml_str(text: &str) -> EvalResult<Self> {
        let settings: Self =
            serde_yaml::from_str(text).map_err(|e| EvalError::Yaml(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse a JSON document.
    pub fn from_json_str(text: &str) -> EvalResult<Self> {
        let settings: Self = serde_json::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read a settings file; `.json` files are JSON, anything else YAML.
    pub async fn load(path: impl AsRef<Path>) -> EvalResult<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path).await?;
        debug!(path = %path.display(), "Loading evaluation settings");
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&text)
        } else {
            Self::from_yaml_str(&text)
        }
    }

    /// Reject settings no run could use.
    pub fn validate(&self) -> EvalResult<()> {
        if self.concurrency == 0 {
            return Err(EvalError::Settings(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if let Some(bad) = self
            .evaluators
            .iter()
            .find(|e| !(e.weight.is_finite() && e.weight >= 0.0))
        {
            return Err(EvalError::Settings(format!(
                "evaluator '{}' has invalid weight {}",
                bad.name, bad.weight
            )));
        }
        Ok(())
    }

    /// Runner options.
    pub fn eval_options(&self) -> EvalOptions {
        let mut options = EvalOptions::new().concurrency(self.concurrency);
        if let Some(ms) = self.evaluator_timeout_ms {
            options = options.evaluator_timeout(Duration::from_millis(ms));
        }
        if self.parallel_evaluators {
            options = options.parallel_evaluators();
        }
        if self.fail_fast {
            options = options.fail_fast();
        }
        options
    }

    /// The configured blob store.
    pub fn blob_store(&self) -> Arc<dyn BlobStore> {
        match &self.store_dir {
            Some(dir) => Arc::new(FileBlobStore::new(dir.clone())),
            None => Arc::new(InMemoryBlobStore::new()),
        }
    }
}
