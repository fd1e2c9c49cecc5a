//! Evaluation errors.

use crate::run::RunStatus;
use crate::types::EvaluatorType;
use flowlab_datasets::DatasetError;
use thiserror::Error;

/// Errors that can occur during evaluation.
#[derive(Debug, Error)]
pub enum EvalError {
    /// Evaluator error.
    #[error("Evaluator '{evaluator}' failed: {message}")]
    EvaluatorFailed {
        /// Evaluator name.
        evaluator: String,
        /// Error message.
        message: String,
    },

    /// Evaluator options could not be decoded.
    #[error("Invalid config for '{evaluator}': {message}")]
    InvalidConfig {
        /// Evaluator type.
        evaluator: EvaluatorType,
        /// Decoder message.
        message: String,
    },

    /// No evaluator registered for a type.
    #[error("No evaluator registered for type '{0}'")]
    UnknownEvaluator(EvaluatorType),

    /// Judge backend error.
    #[error("Judge backend '{backend}' failed: {message}")]
    Judge {
        /// Backend name.
        backend: String,
        /// Error message.
        message: String,
    },

    /// Agent execution error.
    #[error("Task execution failed: {0}")]
    TaskFailed(String),

    /// Operation exceeded its deadline.
    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Illegal run status transition.
    #[error("Cannot move evaluation run from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: RunStatus,
        /// Requested status.
        to: RunStatus,
    },

    /// Settings could not be loaded.
    #[error("Invalid settings: {0}")]
    Settings(String),

    /// Dataset or storage error.
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error.
    #[error("YAML error: {0}")]
    Yaml(String),

    /// Other error.
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl EvalError {
    /// Create an evaluator failed error.
    pub fn evaluator_failed(evaluator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EvaluatorFailed {
            evaluator: evaluator.into(),
            message: message.into(),
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(evaluator: EvaluatorType, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            evaluator,
            message: message.into(),
        }
    }

    /// Create a judge backend error.
    pub fn judge(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Judge {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Create a task failed error.
    pub fn task_failed(msg: impl Into<String>) -> Self {
        Self::TaskFailed(msg.into())
    }
}

/// Result type for evaluation operations.
pub type EvalResult<T> = Result<T, EvalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluator_failed() {
        let err = EvalError::evaluator_failed("Exact Match", "no expected output");
        let s = err.to_string();
        assert!(s.contains("Exact Match"));
        assert!(s.contains("no expected output"));
    }

    #[test]
    fn test_invalid_config_names_type() {
        let err = EvalError::invalid_config(EvaluatorType::Contains, "keywords must be a list");
        assert!(err.to_string().contains("contains"));
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = EvalError::InvalidTransition {
            from: RunStatus::Completed,
            to: RunStatus::Running,
        };
        assert_eq!(
            err.to_string(),
            "Cannot move evaluation run from completed to running"
        );
    }
}
