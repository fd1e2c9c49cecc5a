//! Order-aware execution path alignment.

use super::TRAJECTORY_PASS_THRESHOLD;
use crate::error::EvalResult;
use crate::evaluator::{decode_config, EvaluationContext, Evaluator};
use crate::types::{EvaluationOutcome, EvaluatorType};
use async_trait::async_trait;
use flowlab_datasets::Record;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};

/// Score lost per extra step beyond the allowance.
pub const EXTRA_STEP_PENALTY: f64 = 0.1;

/// Share of the missing ratio taken off the score.
pub const MISSING_STEP_FACTOR: f64 = 0.5;

/// Score for a non-empty actual path against an empty expected path that
/// stays within the extra-step allowance.
pub const EMPTY_EXPECTATION_BASELINE: f64 = 0.5;

/// Options for [`TrajectoryMatchEvaluator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrajectoryMatchConfig {
    /// Expected path; falls back to the data point's expected trajectory.
    pub expected_path: Vec<String>,
    /// Require expected steps to appear in order.
    pub strict_order: bool,
    /// Skip the missing-step reduction.
    pub allow_missing_steps: bool,
    /// Extra steps tolerated before the penalty applies.
    pub max_extra_steps: usize,
}

impl Default for TrajectoryMatchConfig {
    fn default() -> Self {
        Self {
            expected_path: Vec::new(),
            strict_order: true,
            allow_missing_steps: false,
            max_extra_steps: 2,
        }
    }
}

/// How an actual path lines up against an expected one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrajectoryAlignment {
    /// Expected steps found.
    pub matched: Vec<String>,
    /// Expected steps not found.
    pub missing: Vec<String>,
    /// Actual steps not accounted for by the expectation.
    pub extra: Vec<String>,
}

impl TrajectoryAlignment {
    /// Number of expected steps considered.
    pub fn expected_len(&self) -> usize {
        self.matched.len() + self.missing.len()
    }
}

fn unique(steps: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    steps
        .iter()
        .filter(|s| seen.insert(s.as_str()))
        .cloned()
        .collect()
}

/// Align `actual` against `expected`.
///
/// In strict mode each expected step, in order, consumes actual steps until
/// it finds itself; everything it skips is extra. Once the actual path runs
/// out the remaining expected steps are missing. Otherwise both paths are
/// compared as sets.
pub fn align_trajectory(
    expected: &[String],
    actual: &[String],
    strict: bool,
) -> TrajectoryAlignment {
    let mut alignment = TrajectoryAlignment::default();

    if strict {
        let mut cursor = 0;
        for step in expected {
            loop {
                match actual.get(cursor) {
                    None => {
                        alignment.missing.push(step.clone());
                        break;
                    }
                    Some(candidate) => {
                        cursor += 1;
                        if candidate == step {
                            alignment.matched.push(step.clone());
                            break;
                        }
                        alignment.extra.push(candidate.clone());
                    }
                }
            }
        }
        alignment.extra.extend(actual.iter().skip(cursor).cloned());
    } else {
        let actual_set: HashSet<&String> = actual.iter().collect();
        let expected_set: HashSet<&String> = expected.iter().collect();
        for step in unique(expected) {
            if actual_set.contains(&step) {
                alignment.matched.push(step);
            } else {
                alignment.missing.push(step);
            }
        }
        alignment.extra = unique(actual)
            .into_iter()
            .filter(|s| !expected_set.contains(s))
            .collect();
    }

    alignment
}

/// Score an alignment in `[0, 1]`.
pub fn trajectory_score(
    alignment: &TrajectoryAlignment,
    actual_len: usize,
    allow_missing_steps: bool,
    max_extra_steps: usize,
) -> f64 {
    let expected_len = alignment.expected_len();

    if expected_len == 0 {
        if actual_len == 0 {
            return 1.0;
        }
        if actual_len <= max_extra_steps {
            return EMPTY_EXPECTATION_BASELINE;
        }
        return EMPTY_EXPECTATION_BASELINE * max_extra_steps as f64 / actual_len as f64;
    }

    let mut score = alignment.matched.len() as f64 / expected_len as f64;
    if !allow_missing_steps {
        let missing_ratio = alignment.missing.len() as f64 / expected_len as f64;
        score *= 1.0 - missing_ratio * MISSING_STEP_FACTOR;
    }
    let excess = alignment.extra.len().saturating_sub(max_extra_steps);
    score -= EXTRA_STEP_PENALTY * excess as f64;

    score.clamp(0.0, 1.0)
}

/// Scores how closely the actual path follows the expected one.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrajectoryMatchEvaluator;

#[async_trait]
impl Evaluator for TrajectoryMatchEvaluator {
    fn evaluator_type(&self) -> EvaluatorType {
        EvaluatorType::TrajectoryMatch
    }

    async fn evaluate(
        &self,
        _actual: &Value,
        _expected: Option<&Value>,
        config: &Record,
        ctx: &EvaluationContext,
    ) -> EvalResult<EvaluationOutcome> {
        let options: TrajectoryMatchConfig = decode_config(self.evaluator_type(), config)?;

        let expected: &[String] = if options.expected_path.is_empty() {
            ctx.expected_trajectory.as_deref().unwrap_or(&[])
        } else {
            &options.expected_path
        };
        let alignment = align_trajectory(expected, &ctx.trajectory, options.strict_order);
        let score = trajectory_score(
            &alignment,
            ctx.trajectory.len(),
            options.allow_missing_steps,
            options.max_extra_steps,
        );

        let breakdown = BTreeMap::from([
            ("matched".to_string(), alignment.matched.len() as f64),
            ("missing".to_string(), alignment.missing.len() as f64),
            ("extra".to_string(), alignment.extra.len() as f64),
        ]);
        let reasoning = format!(
            "Matched {} of {} expected steps, {} missing, {} extra",
            alignment.matched.len(),
            alignment.expected_len(),
            alignment.missing.len(),
            alignment.extra.len()
        );

        Ok(
            EvaluationOutcome::thresholded(score, TRAJECTORY_PASS_THRESHOLD)
                .with_values(Some(json!(expected)), Some(json!(ctx.trajectory)))
                .with_diff(json!({
                    "matched": alignment.matched,
                    "missing": alignment.missing,
                    "extra": alignment.extra,
                }))
                .with_breakdown(breakdown)
                .with_reasoning(reasoning),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn steps(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    async fn evaluate(expected: &[&str], actual: &[&str], config: Value) -> EvaluationOutcome {
        let ctx = EvaluationContext::with_trajectory(actual.iter().copied())
            .expected_trajectory(expected.iter().copied());
        TrajectoryMatchEvaluator
            .evaluate(
                &Value::Null,
                None,
                &config.as_object().cloned().unwrap_or_default(),
                &ctx,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_strict_with_allowed_extra() {
        let outcome = evaluate(
            &["t1", "llm1", "out1"],
            &["t1", "extra1", "llm1", "out1"],
            json!({"strictOrder": true, "maxExtraSteps": 2}),
        )
        .await;
        assert_eq!(outcome.score, 1.0);
        assert!(outcome.passed);
        assert_eq!(
            outcome.details.diff,
            Some(json!({"matched": ["t1", "llm1", "out1"], "missing": [], "extra": ["extra1"]}))
        );
    }

    #[tokio::test]
    async fn test_non_strict_missing_step() {
        let outcome = evaluate(&["a", "b"], &["b"], json!({"strictOrder": false})).await;
        assert_eq!(outcome.score, 0.375);
        assert!(!outcome.passed);
        assert_eq!(
            outcome.details.diff,
            Some(json!({"matched": ["b"], "missing": ["a"], "extra": []}))
        );
    }

    #[test]
    fn test_strict_out_of_order_consumes_path() {
        let alignment = align_trajectory(&steps(&["a", "b"]), &steps(&["b", "a"]), true);
        assert_eq!(alignment.matched, steps(&["a"]));
        assert_eq!(alignment.missing, steps(&["b"]));
        assert_eq!(alignment.extra, steps(&["b"]));
    }

    #[test]
    fn test_strict_exhausted_path() {
        let alignment = align_trajectory(&steps(&["a", "b", "c"]), &steps(&["x", "y"]), true);
        assert!(alignment.matched.is_empty());
        assert_eq!(alignment.missing, steps(&["a", "b", "c"]));
        assert_eq!(alignment.extra, steps(&["x", "y"]));
    }

    #[rstest]
    #[case(0, 2, 1.0)]
    #[case(2, 2, 0.5)]
    #[case(4, 2, 0.25)]
    #[case(3, 0, 0.0)]
    fn test_empty_expectation(
        #[case] actual_len: usize,
        #[case] max_extra: usize,
        #[case] want: f64,
    ) {
        let actual: Vec<String> = (0..actual_len).map(|i| format!("s{}", i)).collect();
        let alignment = align_trajectory(&[], &actual, true);
        assert_eq!(trajectory_score(&alignment, actual_len, false, max_extra), want);
    }

    #[test]
    fn test_extra_step_penalty() {
        let alignment = align_trajectory(&steps(&["a"]), &steps(&["a", "x", "y", "z", "w"]), true);
        let score = trajectory_score(&alignment, 5, false, 2);
        assert!((score - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_allow_missing_steps() {
        let alignment = align_trajectory(&steps(&["a", "b"]), &steps(&["b"]), false);
        assert_eq!(trajectory_score(&alignment, 1, true, 2), 0.5);
    }

    #[tokio::test]
    async fn test_config_path_overrides_context() {
        let outcome = evaluate(&["z"], &["a", "b"], json!({"expectedPath": ["a", "b"]})).await;
        assert_eq!(outcome.score, 1.0);
    }
}
