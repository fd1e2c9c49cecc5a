//! Recursive structural similarity between JSON values.

use super::unwrap_value;
use crate::error::EvalResult;
use crate::evaluator::{decode_config, EvaluationContext, Evaluator};
use crate::similarity::{text_similarity, value_text};
use crate::types::{EvaluationOutcome, EvaluatorType};
use async_trait::async_trait;
use flowlab_datasets::Record;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Credit for a key present in the actual value but not the expected one.
/// Missing keys get nothing.
pub const EXTRA_KEY_CREDIT: f64 = 0.5;

/// Options for [`JsonSimilarityEvaluator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JsonSimilarityConfig {
    /// Pass threshold.
    pub threshold: f64,
    /// Field paths (`a.b`) or bare key names that always score 1.
    pub ignore_fields: Vec<String>,
    /// Score 0 on any JSON type mismatch and skip fuzzy primitive matching.
    pub strict_type_matching: bool,
}

impl Default for JsonSimilarityConfig {
    fn default() -> Self {
        Self {
            threshold: 0.9,
            ignore_fields: Vec::new(),
            strict_type_matching: false,
        }
    }
}

/// Strings that hold JSON are compared as the JSON they hold.
fn parse_if_string(value: &Value) -> Value {
    match value {
        Value::String(s) => serde_json::from_str(s).unwrap_or_else(|_| value.clone()),
        other => other.clone(),
    }
}

fn kind(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

struct Comparer<'a> {
    options: &'a JsonSimilarityConfig,
    diff: Map<String, Value>,
}

impl Comparer<'_> {
    fn ignored(&self, path: &str) -> bool {
        let relative = path.trim_start_matches('$').trim_start_matches('.');
        if relative.is_empty() {
            return false;
        }
        let last = relative.rsplit('.').next().unwrap_or(relative);
        self.options
            .ignore_fields
            .iter()
            .any(|field| field == relative || field == last)
    }

    fn record(&mut self, path: &str, expected: Option<&Value>, actual: Option<&Value>) {
        self.diff.insert(
            path.to_string(),
            json!({
                "expected": expected.cloned().unwrap_or(Value::Null),
                "actual": actual.cloned().unwrap_or(Value::Null),
            }),
        );
    }

    fn compare(&mut self, actual: &Value, expected: &Value, path: &str) -> f64 {
        if self.ignored(path) {
            return 1.0;
        }

        match (actual, expected) {
            (Value::Null, Value::Null) => 1.0,
            (Value::Null, _) | (_, Value::Null) => {
                self.record(path, Some(expected), Some(actual));
                0.0
            }
            _ if self.options.strict_type_matching && kind(actual) != kind(expected) => {
                self.record(path, Some(expected), Some(actual));
                0.0
            }
            (Value::Array(a), Value::Array(e)) => self.compare_arrays(a, e, path),
            (Value::Object(a), Value::Object(e)) => self.compare_objects(a, e, path),
            (Value::Array(_) | Value::Object(_), _) | (_, Value::Array(_) | Value::Object(_)) => {
                self.record(path, Some(expected), Some(actual));
                0.0
            }
            _ => self.compare_primitives(actual, expected, path),
        }
    }

    fn compare_primitives(&mut self, actual: &Value, expected: &Value, path: &str) -> f64 {
        let a = value_text(actual);
        let e = value_text(expected);
        if a == e {
            return 1.0;
        }
        self.record(path, Some(expected), Some(actual));
        if self.options.strict_type_matching {
            0.0
        } else {
            text_similarity(&a, &e)
        }
    }

    fn compare_arrays(&mut self, actual: &[Value], expected: &[Value], path: &str) -> f64 {
        let len = actual.len().max(expected.len());
        if len == 0 {
            return 1.0;
        }
        let mut total = 0.0;
        for i in 0..len {
            let item_path = format!("{}[{}]", path, i);
            match (actual.get(i), expected.get(i)) {
                (Some(a), Some(e)) => total += self.compare(a, e, &item_path),
                (a, e) => self.record(&item_path, e, a),
            }
        }
        total / len as f64
    }

    fn compare_objects(
        &mut self,
        actual: &Map<String, Value>,
        expected: &Map<String, Value>,
        path: &str,
    ) -> f64 {
        let keys: Vec<&String> = expected
            .keys()
            .chain(actual.keys().filter(|k| !expected.contains_key(*k)))
            .collect();

        let mut count = 0usize;
        let mut total = 0.0;
        for key in keys {
            let key_path = format!("{}.{}", path, key);
            if self.ignored(&key_path) {
                continue;
            }
            count += 1;
            match (actual.get(key), expected.get(key)) {
                (Some(a), Some(e)) => total += self.compare(a, e, &key_path),
                (None, e) => self.record(&key_path, e, None),
                (a, None) => {
                    self.record(&key_path, None, a);
                    total += EXTRA_KEY_CREDIT;
                }
            }
        }

        if count == 0 {
            1.0
        } else {
            total / count as f64
        }
    }
}

/// Similarity of `actual` to `expected` in `[0, 1]` plus a diff keyed by
/// path (`$`, `$.a`, `$.items[0]`). A `{"value": ...}` wrapper on either
/// side is compared as the value it wraps.
pub fn json_similarity(
    actual: &Value,
    expected: &Value,
    options: &JsonSimilarityConfig,
) -> (f64, Map<String, Value>) {
    let mut comparer = Comparer {
        options,
        diff: Map::new(),
    };
    let actual = parse_if_string(unwrap_value(actual));
    let expected = parse_if_string(unwrap_value(expected));
    let score = comparer.compare(&actual, &expected, "$");
    (score.clamp(0.0, 1.0), comparer.diff)
}

/// Scores structural similarity and passes at or above the threshold.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSimilarityEvaluator;

#[async_trait]
impl Evaluator for JsonSimilarityEvaluator {
    fn evaluator_type(&self) -> EvaluatorType {
        EvaluatorType::JsonSimilarity
    }

    async fn evaluate(
        &self,
        actual: &Value,
        expected: Option<&Value>,
        config: &Record,
        _ctx: &EvaluationContext,
    ) -> EvalResult<EvaluationOutcome> {
        let options: JsonSimilarityConfig = decode_config(self.evaluator_type(), config)?;

        let Some(expected) = expected else {
            return Ok(EvaluationOutcome::new(0.0, false)
                .with_values(None, Some(actual.clone()))
                .with_reasoning("No expected output to compare against"));
        };

        let (score, diff) = json_similarity(actual, expected, &options);
        let differences = diff.len();
        let mut outcome = EvaluationOutcome::thresholded(score, options.threshold)
            .with_values(Some(expected.clone()), Some(actual.clone()))
            .with_reasoning(format!(
                "Similarity {:.2} against threshold {:.2} ({} differing paths)",
                score, options.threshold, differences
            ));
        if differences > 0 {
            outcome = outcome.with_diff(Value::Object(diff));
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn defaults() -> JsonSimilarityConfig {
        JsonSimilarityConfig::default()
    }

    #[test]
    fn test_one_of_two_keys_differs() {
        let (score, diff) =
            json_similarity(&json!({"a": 1, "b": 2}), &json!({"a": 1, "b": 3}), &defaults());
        assert_eq!(score, 0.5);
        assert_eq!(diff.get("$.b"), Some(&json!({"expected": 3, "actual": 2})));
    }

    #[tokio::test]
    async fn test_evaluator_fails_below_threshold() {
        let outcome = JsonSimilarityEvaluator
            .evaluate(
                &json!({"a": 1, "b": 2}),
                Some(&json!({"a": 1, "b": 3})),
                &Record::new(),
                &EvaluationContext::default(),
            )
            .await
            .unwrap();
        assert_eq!(outcome.score, 0.5);
        assert!(!outcome.passed);
    }

    #[test]
    fn test_extra_and_missing_keys_are_asymmetric() {
        let (extra, _) = json_similarity(&json!({"a": 1, "x": 9}), &json!({"a": 1}), &defaults());
        assert_eq!(extra, 0.75);

        let (missing, diff) =
            json_similarity(&json!({"a": 1}), &json!({"a": 1, "x": 9}), &defaults());
        assert_eq!(missing, 0.5);
        assert_eq!(diff.get("$.x"), Some(&json!({"expected": 9, "actual": null})));
    }

    #[test]
    fn test_arrays_average_over_longer_side() {
        let (score, diff) = json_similarity(&json!([1, 2]), &json!([1, 2, 3, 4]), &defaults());
        assert_eq!(score, 0.5);
        assert!(diff.contains_key("$[2]"));
        assert!(diff.contains_key("$[3]"));
    }

    #[test]
    fn test_ignored_fields() {
        let options = JsonSimilarityConfig {
            ignore_fields: vec!["timestamp".to_string(), "meta.id".to_string()],
            ..defaults()
        };
        let (score, diff) = json_similarity(
            &json!({"a": 1, "timestamp": 1, "meta": {"id": "x"}}),
            &json!({"a": 1, "timestamp": 2, "meta": {"id": "y"}}),
            &options,
        );
        assert_eq!(score, 1.0);
        assert!(diff.is_empty());
    }

    #[test]
    fn test_nulls_match_only_each_other() {
        assert_eq!(json_similarity(&json!(null), &json!(null), &defaults()).0, 1.0);
        assert_eq!(json_similarity(&json!({"a": null}), &json!({"a": 0}), &defaults()).0, 0.0);
    }

    #[test]
    fn test_strict_type_matching() {
        let strict = JsonSimilarityConfig {
            strict_type_matching: true,
            ..defaults()
        };
        assert_eq!(json_similarity(&json!({"n": "1"}), &json!({"n": 1}), &defaults()).0, 1.0);
        assert_eq!(json_similarity(&json!({"n": "1"}), &json!({"n": 1}), &strict).0, 0.0);
    }

    #[test]
    fn test_string_sides_are_parsed() {
        let (score, _) =
            json_similarity(&json!("{\"a\": [1, 2]}"), &json!({"a": [1, 2]}), &defaults());
        assert_eq!(score, 1.0);
    }

    #[test]
    fn test_wrapped_text_matches_plain_output() {
        let (score, diff) =
            json_similarity(&json!("Paris"), &json!({"value": "Paris"}), &defaults());
        assert_eq!(score, 1.0);
        assert!(diff.is_empty());

        let (score, _) =
            json_similarity(&json!({"value": "{\"a\": 1}"}), &json!({"a": 1}), &defaults());
        assert_eq!(score, 1.0);
    }

    #[test]
    fn test_fuzzy_primitive_credit() {
        let (score, _) = json_similarity(
            &json!({"answer": "the capital is paris"}),
            &json!({"answer": "the capital is Paris."}),
            &defaults(),
        );
        assert!(score > 0.5 && score < 1.0);
    }
}
