//! Evaluator configuration, results and execution traces.

use chrono::{DateTime, Utc};
use flowlab_datasets::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// The seven built-in scoring strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluatorType {
    /// Normalized string equality.
    ExactMatch,
    /// Keyword hits.
    Contains,
    /// Recursive structural similarity.
    JsonSimilarity,
    /// Grounding relevance and expected-token coverage.
    ContextPrecision,
    /// Judge-scored output quality.
    LlmJudgeOutput,
    /// Judge-scored execution path and reasoning.
    LlmJudgeTrajectory,
    /// Order-aware path alignment.
    TrajectoryMatch,
}

impl EvaluatorType {
    /// Every type, in declaration order.
    pub const ALL: [EvaluatorType; 7] = [
        Self::ExactMatch,
        Self::Contains,
        Self::JsonSimilarity,
        Self::ContextPrecision,
        Self::LlmJudgeOutput,
        Self::LlmJudgeTrajectory,
        Self::TrajectoryMatch,
    ];

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExactMatch => "exact_match",
            Self::Contains => "contains",
            Self::JsonSimilarity => "json_similarity",
            Self::ContextPrecision => "context_precision",
            Self::LlmJudgeOutput => "llm_judge_output",
            Self::LlmJudgeTrajectory => "llm_judge_trajectory",
            Self::TrajectoryMatch => "trajectory_match",
        }
    }

    /// Default display name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::ExactMatch => "Exact Match",
            Self::Contains => "Contains Keywords",
            Self::JsonSimilarity => "JSON Similarity",
            Self::ContextPrecision => "Context Precision",
            Self::LlmJudgeOutput => "LLM Judge (Output)",
            Self::LlmJudgeTrajectory => "LLM Judge (Trajectory)",
            Self::TrajectoryMatch => "Trajectory Match",
        }
    }

    /// Default description.
    pub fn description(&self) -> &'static str {
        match self {
            Self::ExactMatch => "Checks that the output equals the expected value",
            Self::Contains => "Checks that the output contains the configured keywords",
            Self::JsonSimilarity => "Scores structural similarity between JSON values",
            Self::ContextPrecision => {
                "Scores grounding in the supplied context and expected coverage"
            }
            Self::LlmJudgeOutput => "Judge model rates the output against quality criteria",
            Self::LlmJudgeTrajectory => "Judge model rates the execution path and reasoning",
            Self::TrajectoryMatch => "Aligns the actual execution path with the expected path",
        }
    }

    /// Whether this type scores execution paths.
    pub fn is_trajectory(&self) -> bool {
        matches!(self, Self::TrajectoryMatch | Self::LlmJudgeTrajectory)
    }
}

impl fmt::Display for EvaluatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A configured evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluatorConfig {
    /// Strategy.
    #[serde(rename = "type")]
    pub evaluator_type: EvaluatorType,
    /// Display name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Relative weight (non-negative).
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Strategy-specific options.
    #[serde(default)]
    pub config: Record,
}

fn default_weight() -> f64 {
    1.0
}

impl EvaluatorConfig {
    /// Config with the type's default name and description, weight 1.
    pub fn new(evaluator_type: EvaluatorType) -> Self {
        Self {
            evaluator_type,
            name: evaluator_type.display_name().to_string(),
            description: evaluator_type.description().to_string(),
            weight: 1.0,
            config: Record::new(),
        }
    }

    /// Set the name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the weight.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Set one option.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// Weight clamped to a finite non-negative value.
    pub fn effective_weight(&self) -> f64 {
        if self.weight.is_finite() {
            self.weight.max(0.0)
        } else {
            0.0
        }
    }
}

/// Supporting detail attached to a score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluatorDetails {
    /// What was expected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
    /// What was produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<Value>,
    /// Structured difference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<Value>,
    /// Human-readable explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// Named sub-scores.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<BTreeMap<String, f64>>,
}

/// What an evaluator returns: an unweighted score in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationOutcome {
    /// Raw score.
    pub score: f64,
    /// Whether the evaluator's own threshold was met.
    pub passed: bool,
    /// Supporting detail.
    pub details: EvaluatorDetails,
}

impl EvaluationOutcome {
    /// Create an outcome.
    pub fn new(score: f64, passed: bool) -> Self {
        Self {
            score,
            passed,
            details: EvaluatorDetails::default(),
        }
    }

    /// An outcome that passes when `score >= threshold`.
    pub fn thresholded(score: f64, threshold: f64) -> Self {
        Self::new(score, score >= threshold)
    }

    /// Set the expected/actual pair.
    pub fn with_values(mut self, expected: Option<Value>, actual: Option<Value>) -> Self {
        self.details.expected = expected;
        self.details.actual = actual;
        self
    }

    /// Set the diff.
    pub fn with_diff(mut self, diff: Value) -> Self {
        self.details.diff = Some(diff);
        self
    }

    /// Set the reasoning.
    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.details.reasoning = Some(reasoning.into());
        self
    }

    /// Set the breakdown.
    pub fn with_breakdown(mut self, breakdown: BTreeMap<String, f64>) -> Self {
        self.details.breakdown = Some(breakdown);
        self
    }
}

/// One evaluator's verdict on one test case.
///
/// `score` is never overwritten by the weight; `weighted_score` carries
/// `weight * score`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluatorResult {
    /// Strategy.
    pub evaluator_type: EvaluatorType,
    /// Configured name.
    pub evaluator_name: String,
    /// Raw score in `[0, 1]`.
    pub score: f64,
    /// Weight applied.
    pub weight: f64,
    /// `weight * score`.
    pub weighted_score: f64,
    /// Whether the evaluator passed.
    pub passed: bool,
    /// Supporting detail.
    pub details: EvaluatorDetails,
    /// Wall time spent evaluating.
    pub latency_ms: f64,
}

impl EvaluatorResult {
    /// Build a result from an outcome, clamping the raw score.
    pub fn from_outcome(
        config: &EvaluatorConfig,
        outcome: EvaluationOutcome,
        latency: Duration,
    ) -> Self {
        let score = if outcome.score.is_finite() {
            outcome.score.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let weight = config.effective_weight();
        Self {
            evaluator_type: config.evaluator_type,
            evaluator_name: config.name.clone(),
            score,
            weight,
            weighted_score: score * weight,
            passed: outcome.passed,
            details: outcome.details,
            latency_ms: latency.as_secs_f64() * 1000.0,
        }
    }

    /// A zero-score failure carrying `message` as its reasoning.
    pub fn failure(
        config: &EvaluatorConfig,
        message: impl Into<String>,
        latency: Duration,
    ) -> Self {
        Self::from_outcome(
            config,
            EvaluationOutcome::new(0.0, false).with_reasoning(message),
            latency,
        )
    }
}

/// One executed node, as reported by the execution engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStep {
    /// Node id.
    pub node_id: String,
    /// Node display name.
    #[serde(default)]
    pub node_name: String,
    /// Node type (e.g. `llm`).
    #[serde(default)]
    pub node_type: String,
    /// Node input.
    #[serde(default)]
    pub input: Value,
    /// Node output; null when the node produced nothing.
    #[serde(default)]
    pub output: Value,
    /// Node duration.
    #[serde(default)]
    pub duration_ms: f64,
    /// When the node ran.
    pub timestamp: DateTime<Utc>,
}

impl ExecutionStep {
    /// A step with no input/output yet.
    pub fn new(node_id: impl Into<String>, node_type: impl Into<String>) -> Self {
        let node_id = node_id.into();
        Self {
            node_name: node_id.clone(),
            node_id,
            node_type: node_type.into(),
            input: Value::Null,
            output: Value::Null,
            duration_ms: 0.0,
            timestamp: Utc::now(),
        }
    }

    /// Set the output.
    pub fn with_output(mut self, output: Value) -> Self {
        self.output = output;
        self
    }

    /// Set the duration.
    pub fn with_duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Whether the node produced output.
    pub fn has_output(&self) -> bool {
        !self.output.is_null()
    }
}

/// Verdict on one data point across all configured evaluators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseResult {
    /// Data point id.
    pub data_point_id: String,
    /// Data point input.
    pub input: Record,
    /// What the agent produced.
    pub actual_output: Value,
    /// Path the agent took.
    pub actual_trajectory: Vec<String>,
    /// Per-evaluator results, in configuration order.
    pub evaluator_results: Vec<EvaluatorResult>,
    /// `sum(weighted) / sum(weights)`, or 0 without weight.
    pub aggregate_score: f64,
    /// Every evaluator passed and the aggregate cleared the gate.
    pub passed: bool,
    /// Wall time spent evaluating.
    pub execution_time_ms: f64,
}

impl TestCaseResult {
    /// Result for a given evaluator type, if configured.
    pub fn result_for(&self, evaluator_type: EvaluatorType) -> Option<&EvaluatorResult> {
        self.evaluator_results
            .iter()
            .find(|r| r.evaluator_type == evaluator_type)
    }

    /// Names of failing evaluators.
    pub fn failing_evaluators(&self) -> Vec<&str> {
        self.evaluator_results
            .iter()
            .filter(|r| !r.passed)
            .map(|r| r.evaluator_name.as_str())
            .collect()
    }
}
