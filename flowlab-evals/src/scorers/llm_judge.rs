//! Judge-backed evaluators for outputs and trajectories.

use super::trajectory::{align_trajectory, trajectory_score};
use super::{unwrap_value, JUDGE_PASS_THRESHOLD};
use crate::error::EvalResult;
use crate::evaluator::{decode_config, EvaluationContext, Evaluator};
use crate::judge::{check_score_scale, JudgeBackend, OutputJudgeRequest, DEFAULT_CRITERIA};
use crate::similarity::value_text;
use crate::types::{EvaluationOutcome, EvaluatorType};
use async_trait::async_trait;
use flowlab_datasets::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Weight of the alignment term in the trajectory judge.
pub const TRAJECTORY_WEIGHT: f64 = 0.6;

/// Weight of the reasoning term in the trajectory judge.
pub const REASONING_WEIGHT: f64 = 0.4;

/// Options for [`OutputJudgeEvaluator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OutputJudgeConfig {
    /// Criteria to grade.
    pub criteria: Vec<String>,
    /// Top of the per-criterion scale.
    pub score_scale: f64,
    /// Passed through to the backend.
    pub rubric: Option<String>,
}

impl Default for OutputJudgeConfig {
    fn default() -> Self {
        Self {
            criteria: DEFAULT_CRITERIA.iter().map(|c| c.to_string()).collect(),
            score_scale: 5.0,
            rubric: None,
        }
    }
}

/// Grades output quality through a [`JudgeBackend`].
#[derive(Clone)]
pub struct OutputJudgeEvaluator {
    judge: Arc<dyn JudgeBackend>,
}

impl OutputJudgeEvaluator {
    /// Evaluator backed by `judge`.
    pub fn new(judge: Arc<dyn JudgeBackend>) -> Self {
        Self { judge }
    }
}

impl fmt::Debug for OutputJudgeEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputJudgeEvaluator")
            .field("judge", &self.judge.name())
            .finish()
    }
}

#[async_trait]
impl Evaluator for OutputJudgeEvaluator {
    fn evaluator_type(&self) -> EvaluatorType {
        EvaluatorType::LlmJudgeOutput
    }

    async fn evaluate(
        &self,
        actual: &Value,
        expected: Option<&Value>,
        config: &Record,
        ctx: &EvaluationContext,
    ) -> EvalResult<EvaluationOutcome> {
        let mut options: OutputJudgeConfig = decode_config(self.evaluator_type(), config)?;
        check_score_scale(options.score_scale)?;
        if options.criteria.is_empty() {
            options.criteria = OutputJudgeConfig::default().criteria;
        }

        let request = OutputJudgeRequest {
            input: ctx.input.clone(),
            actual: value_text(unwrap_value(actual)),
            expected: expected.map(|e| value_text(unwrap_value(e))),
            criteria: options.criteria,
            score_scale: options.score_scale,
            rubric: options.rubric,
        };
        let verdict = self.judge.score_output(&request).await?;

        Ok(
            EvaluationOutcome::thresholded(verdict.overall, JUDGE_PASS_THRESHOLD)
                .with_values(expected.cloned(), Some(actual.clone()))
                .with_breakdown(verdict.scores)
                .with_reasoning(verdict.reasoning),
        )
    }
}

/// Options for [`TrajectoryJudgeEvaluator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrajectoryJudgeConfig {
    /// Tolerate any number of extra steps.
    pub allow_extra_steps: bool,
    /// Blend in the backend's reasoning score.
    pub evaluate_reasoning: bool,
}

impl Default for TrajectoryJudgeConfig {
    fn default() -> Self {
        Self {
            allow_extra_steps: true,
            evaluate_reasoning: true,
        }
    }
}

/// Grades the execution path (strict alignment) and, optionally, the
/// reasoning visible in the execution trace.
#[derive(Clone)]
pub struct TrajectoryJudgeEvaluator {
    judge: Arc<dyn JudgeBackend>,
}

impl TrajectoryJudgeEvaluator {
    /// Evaluator backed by `judge`.
    pub fn new(judge: Arc<dyn JudgeBackend>) -> Self {
        Self { judge }
    }
}

impl fmt::Debug for TrajectoryJudgeEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrajectoryJudgeEvaluator")
            .field("judge", &self.judge.name())
            .finish()
    }
}

#[async_trait]
impl Evaluator for TrajectoryJudgeEvaluator {
    fn evaluator_type(&self) -> EvaluatorType {
        EvaluatorType::LlmJudgeTrajectory
    }

    async fn evaluate(
        &self,
        _actual: &Value,
        _expected: Option<&Value>,
        config: &Record,
        ctx: &EvaluationContext,
    ) -> EvalResult<EvaluationOutcome> {
        let options: TrajectoryJudgeConfig = decode_config(self.evaluator_type(), config)?;

        let expected = ctx.expected_trajectory.as_deref().unwrap_or(&[]);
        let max_extra = if options.allow_extra_steps { usize::MAX } else { 0 };
        let alignment = align_trajectory(expected, &ctx.trajectory, true);
        let path_score = trajectory_score(&alignment, ctx.trajectory.len(), false, max_extra);

        let mut breakdown = BTreeMap::from([("trajectory".to_string(), path_score)]);
        let (score, reasoning) = if options.evaluate_reasoning {
            let trace = ctx.execution_trace.as_deref().unwrap_or(&[]);
            let verdict = self.judge.score_reasoning(trace).await?;
            breakdown.insert("reasoning".to_string(), verdict.overall);
            (
                TRAJECTORY_WEIGHT * path_score + REASONING_WEIGHT * verdict.overall,
                format!("Trajectory {:.2}; {}", path_score, verdict.reasoning),
            )
        } else {
            (path_score, format!("Trajectory {:.2}", path_score))
        };

        Ok(EvaluationOutcome::thresholded(score, JUDGE_PASS_THRESHOLD)
            .with_breakdown(breakdown)
            .with_reasoning(reasoning))
    }
}
