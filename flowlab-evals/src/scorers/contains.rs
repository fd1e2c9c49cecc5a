//! Keyword containment.

use super::unwrap_value;
use crate::error::EvalResult;
use crate::evaluator::{decode_config, EvaluationContext, Evaluator};
use crate::similarity::value_text;
use crate::types::{EvaluationOutcome, EvaluatorType};
use async_trait::async_trait;
use flowlab_datasets::Record;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Options for [`ContainsEvaluator`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContainsConfig {
    /// Substrings to look for.
    pub keywords: Vec<String>,
    /// Require every keyword rather than any.
    pub match_all: bool,
    /// Match case-sensitively.
    pub case_sensitive: bool,
}

/// Scores the fraction of keywords found in the output.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainsEvaluator;

#[async_trait]
impl Evaluator for ContainsEvaluator {
    fn evaluator_type(&self) -> EvaluatorType {
        EvaluatorType::Contains
    }

    async fn evaluate(
        &self,
        actual: &Value,
        _expected: Option<&Value>,
        config: &Record,
        _ctx: &EvaluationContext,
    ) -> EvalResult<EvaluationOutcome> {
        let options: ContainsConfig = decode_config(self.evaluator_type(), config)?;

        if options.keywords.is_empty() {
            return Ok(EvaluationOutcome::new(1.0, true).with_reasoning("No keywords configured"));
        }

        let text = value_text(unwrap_value(actual));
        let haystack = if options.case_sensitive {
            text
        } else {
            text.to_lowercase()
        };

        let (found, missing): (Vec<&String>, Vec<&String>) =
            options.keywords.iter().partition(|keyword| {
                if options.case_sensitive {
                    haystack.contains(keyword.as_str())
                } else {
                    haystack.contains(&keyword.to_lowercase())
                }
            });

        let score = found.len() as f64 / options.keywords.len() as f64;
        let passed = if options.match_all {
            missing.is_empty()
        } else {
            !found.is_empty()
        };

        Ok(EvaluationOutcome::new(score, passed)
            .with_diff(json!({"found": found, "missing": missing}))
            .with_reasoning(format!(
                "Found {} of {} keywords",
                found.len(),
                options.keywords.len()
            )))
    }
}
