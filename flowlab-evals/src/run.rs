//! Evaluation run records and their status lifecycle.

use crate::error::{EvalError, EvalResult};
use crate::summary::EvaluationSummary;
use crate::types::{EvaluatorConfig, TestCaseResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the run was triggered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Replayed against a stored dataset.
    #[default]
    Offline,
    /// Sampled from live executions.
    Online,
}

/// Run lifecycle state. Transitions only move forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Created, not started.
    #[default]
    Pending,
    /// Evaluating.
    Running,
    /// Finished with results.
    Completed,
    /// Aborted.
    Failed,
}

impl RunStatus {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether the run can move from `self` to `next`.
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Failed)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }

    /// Completed or failed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What part of the workflow was evaluated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EvaluationScope {
    /// The whole workflow end to end.
    #[default]
    FullWorkflow,
    /// One node in isolation.
    SingleNode {
        /// Node under test.
        #[serde(rename = "nodeId")]
        node_id: String,
    },
}

/// Configuration snapshot stored with a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    /// Evaluated scope.
    #[serde(default)]
    pub scope: EvaluationScope,
    /// Evaluators applied to every case.
    #[serde(default)]
    pub evaluators: Vec<EvaluatorConfig>,
    /// Dataset the cases came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_id: Option<String>,
}

/// One evaluation invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationRun {
    /// Unique id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Trigger mode.
    pub mode: RunMode,
    /// Lifecycle state.
    pub status: RunStatus,
    /// Configuration snapshot.
    pub config: RunConfig,
    /// When the run was created or started.
    pub started_at: DateTime<Utc>,
    /// When the run reached a terminal state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Per-case results in dataset order.
    #[serde(default)]
    pub results: Vec<TestCaseResult>,
    /// Aggregate statistics.
    #[serde(default)]
    pub summary: EvaluationSummary,
    /// Failure reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EvaluationRun {
    /// A pending run.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        mode: RunMode,
        config: RunConfig,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            mode,
            status: RunStatus::Pending,
            config,
            started_at: Utc::now(),
            completed_at: None,
            results: Vec::new(),
            summary: EvaluationSummary::default(),
            error: None,
        }
    }

    fn transition(&mut self, to: RunStatus) -> EvalResult<()> {
        if !self.status.can_transition_to(to) {
            return Err(EvalError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// `pending -> running`.
    pub fn start(&mut self) -> EvalResult<()> {
        self.transition(RunStatus::Running)?;
        self.started_at = Utc::now();
        Ok(())
    }

    /// `running -> completed`, recording results and summary.
    pub fn complete(
        &mut self,
        results: Vec<TestCaseResult>,
        summary: EvaluationSummary,
    ) -> EvalResult<()> {
        self.transition(RunStatus::Completed)?;
        self.results = results;
        self.summary = summary;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// `pending|running -> failed`.
    pub fn fail(&mut self, error: impl Into<String>) -> EvalResult<()> {
        self.transition(RunStatus::Failed)?;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
        Ok(())
    }
}
