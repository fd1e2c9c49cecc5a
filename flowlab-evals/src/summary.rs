//! Run-level statistics.

use crate::types::{EvaluatorType, TestCaseResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregate statistics over a set of test case results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationSummary {
    /// Number of cases.
    pub total_tests: usize,
    /// Cases that passed.
    pub passed: usize,
    /// Cases that failed.
    pub failed: usize,
    /// `passed / total_tests`, 0 when empty.
    pub pass_rate: f64,
    /// Mean aggregate score.
    pub average_score: f64,
    /// Mean weighted score per evaluator type, over the cases it ran on.
    pub score_by_evaluator: BTreeMap<EvaluatorType, f64>,
    /// Mean raw score per evaluator type, over the cases it ran on.
    #[serde(default)]
    pub raw_score_by_evaluator: BTreeMap<EvaluatorType, f64>,
    /// Mean case execution time.
    pub average_latency_ms: f64,
    /// Among cases with a non-empty actual path, the share where some
    /// trajectory evaluator passed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trajectory_accuracy: Option<f64>,
}

fn mean(total: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

/// Reduce `results` to an [`EvaluationSummary`].
pub fn calculate_summary(results: &[TestCaseResult]) -> EvaluationSummary {
    let total = results.len();
    let passed = results.iter().filter(|r| r.passed).count();

    let mut weighted: BTreeMap<EvaluatorType, (f64, usize)> = BTreeMap::new();
    let mut raw: BTreeMap<EvaluatorType, (f64, usize)> = BTreeMap::new();
    for result in results.iter().flat_map(|r| &r.evaluator_results) {
        let entry = weighted.entry(result.evaluator_type).or_default();
        entry.0 += result.weighted_score;
        entry.1 += 1;
        let entry = raw.entry(result.evaluator_type).or_default();
        entry.0 += result.score;
        entry.1 += 1;
    }

    let with_path: Vec<&TestCaseResult> = results
        .iter()
        .filter(|r| !r.actual_trajectory.is_empty())
        .collect();
    let trajectory_accuracy = (!with_path.is_empty()).then(|| {
        let accurate = with_path
            .iter()
            .filter(|r| {
                r.evaluator_results
                    .iter()
                    .any(|e| e.evaluator_type.is_trajectory() && e.passed)
            })
            .count();
        accurate as f64 / with_path.len() as f64
    });

    EvaluationSummary {
        total_tests: total,
        passed,
        failed: total - passed,
        pass_rate: mean(passed as f64, total),
        average_score: mean(results.iter().map(|r| r.aggregate_score).sum(), total),
        score_by_evaluator: weighted
            .into_iter()
            .map(|(t, (sum, n))| (t, mean(sum, n)))
            .collect(),
        raw_score_by_evaluator: raw
            .into_iter()
            .map(|(t, (sum, n))| (t, mean(sum, n)))
            .collect(),
        average_latency_ms: mean(results.iter().map(|r| r.execution_time_ms).sum(), total),
        trajectory_accuracy,
    }
}
