//! Normalized string equality.

use super::unwrap_value;
use crate::error::EvalResult;
use crate::evaluator::{decode_config, EvaluationContext, Evaluator};
use crate::similarity::value_text;
use crate::types::{EvaluationOutcome, EvaluatorType};
use async_trait::async_trait;
use flowlab_datasets::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Options for [`ExactMatchEvaluator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExactMatchConfig {
    /// Compare case-sensitively.
    pub case_sensitive: bool,
    /// Trim both sides first.
    pub trim_whitespace: bool,
}

impl Default for ExactMatchConfig {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            trim_whitespace: true,
        }
    }
}

impl ExactMatchConfig {
    fn normalize(&self, text: String) -> String {
        let text = if self.trim_whitespace {
            text.trim().to_string()
        } else {
            text
        };
        if self.case_sensitive {
            text
        } else {
            text.to_lowercase()
        }
    }
}

/// Scores 1 when the stringified sides are equal after normalization.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatchEvaluator;

#[async_trait]
impl Evaluator for ExactMatchEvaluator {
    fn evaluator_type(&self) -> EvaluatorType {
        EvaluatorType::ExactMatch
    }

    async fn evaluate(
        &self,
        actual: &Value,
        expected: Option<&Value>,
        config: &Record,
        _ctx: &EvaluationContext,
    ) -> EvalResult<EvaluationOutcome> {
        let options: ExactMatchConfig = decode_config(self.evaluator_type(), config)?;
        let actual = unwrap_value(actual);

        let Some(expected) = expected.map(unwrap_value) else {
            return Ok(EvaluationOutcome::new(0.0, false)
                .with_values(None, Some(actual.clone()))
                .with_reasoning("No expected output to compare against"));
        };

        let left = options.normalize(value_text(actual));
        let right = options.normalize(value_text(expected));
        let matched = left == right;

        let reasoning = if matched {
            "Output matches expected value"
        } else {
            "Output differs from expected value"
        };
        Ok(
            EvaluationOutcome::new(if matched { 1.0 } else { 0.0 }, matched)
                .with_values(Some(expected.clone()), Some(actual.clone()))
                .with_reasoning(reasoning),
        )
    }
}
