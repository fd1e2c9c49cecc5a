//! Built-in evaluators, one per [`EvaluatorType`](crate::types::EvaluatorType).

mod contains;
mod context_precision;
mod exact_match;
mod json_similarity;
mod llm_judge;
mod trajectory;

pub use contains::{ContainsConfig, ContainsEvaluator};
pub use context_precision::{ContextPrecisionConfig, ContextPrecisionEvaluator};
pub use exact_match::{ExactMatchConfig, ExactMatchEvaluator};
pub use json_similarity::{JsonSimilarityConfig, JsonSimilarityEvaluator};
pub use llm_judge::{
    OutputJudgeConfig, OutputJudgeEvaluator, TrajectoryJudgeConfig, TrajectoryJudgeEvaluator,
};
pub use trajectory::{
    align_trajectory, trajectory_score, TrajectoryAlignment, TrajectoryMatchConfig,
    TrajectoryMatchEvaluator,
};

use serde_json::Value;

/// Pass threshold for `trajectory_match`.
pub const TRAJECTORY_PASS_THRESHOLD: f64 = 0.8;

/// Pass threshold for both judge evaluators.
pub const JUDGE_PASS_THRESHOLD: f64 = 0.7;

/// Imported plain-text cells arrive wrapped as `{"value": ...}`; scorers
/// that compare text look through the wrapper.
pub(crate) fn unwrap_value(value: &Value) -> &Value {
    match value {
        Value::Object(map) if map.len() == 1 => map.get("value").unwrap_or(value),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unwrap_value() {
        assert_eq!(unwrap_value(&json!({"value": "hi"})), &json!("hi"));
        assert_eq!(unwrap_value(&json!({"other": "hi"})), &json!({"other": "hi"}));
        assert_eq!(
            unwrap_value(&json!({"value": 1, "b": 2})),
            &json!({"value": 1, "b": 2})
        );
    }
}
