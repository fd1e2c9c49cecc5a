//! Grounding relevance and expected-token coverage.

use super::unwrap_value;
use crate::error::EvalResult;
use crate::evaluator::{decode_config, EvaluationContext, Evaluator};
use crate::similarity::{content_tokens, overlap_ratio, value_text};
use crate::types::{EvaluationOutcome, EvaluatorType};
use async_trait::async_trait;
use flowlab_datasets::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Relevance assigned when the data point carries no grounding context.
pub const NEUTRAL_RELEVANCE: f64 = 0.5;

/// Options for [`ContextPrecisionEvaluator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContextPrecisionConfig {
    /// Pass threshold.
    pub threshold: f64,
    /// Weight of the relevance term.
    pub relevance_weight: f64,
    /// Weight of the coverage term.
    pub coverage_weight: f64,
}

impl Default for ContextPrecisionConfig {
    fn default() -> Self {
        Self {
            threshold: 0.8,
            relevance_weight: 0.6,
            coverage_weight: 0.4,
        }
    }
}

/// Relevance is the share of response tokens found in the context;
/// coverage is the share of expected tokens found in the response.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextPrecisionEvaluator;

#[async_trait]
impl Evaluator for ContextPrecisionEvaluator {
    fn evaluator_type(&self) -> EvaluatorType {
        EvaluatorType::ContextPrecision
    }

    async fn evaluate(
        &self,
        actual: &Value,
        expected: Option<&Value>,
        config: &Record,
        ctx: &EvaluationContext,
    ) -> EvalResult<EvaluationOutcome> {
        let options: ContextPrecisionConfig = decode_config(self.evaluator_type(), config)?;

        let response = content_tokens(&value_text(unwrap_value(actual)));
        let expected_tokens = expected
            .map(|e| content_tokens(&value_text(unwrap_value(e))))
            .unwrap_or_default();

        let grounding = ctx
            .context_used
            .as_deref()
            .filter(|c| !c.trim().is_empty());
        let relevance = match grounding {
            Some(context) => overlap_ratio(&response, &content_tokens(context)).unwrap_or(0.0),
            None => NEUTRAL_RELEVANCE,
        };
        let coverage = overlap_ratio(&expected_tokens, &response).unwrap_or(1.0);

        let score = (options.relevance_weight * relevance + options.coverage_weight * coverage)
            .clamp(0.0, 1.0);

        let breakdown = BTreeMap::from([
            ("relevance".to_string(), relevance),
            ("coverage".to_string(), coverage),
        ]);
        Ok(EvaluationOutcome::thresholded(score, options.threshold)
            .with_breakdown(breakdown)
            .with_reasoning(format!(
                "Relevance {:.2}, coverage {:.2}",
                relevance, coverage
            )))
    }
}
