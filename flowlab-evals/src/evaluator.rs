//! The evaluator capability and its registry.

use crate::error::{EvalError, EvalResult};
use crate::judge::{HeuristicJudge, JudgeBackend};
use crate::scorers::{
    ContainsEvaluator, ContextPrecisionEvaluator, ExactMatchEvaluator, JsonSimilarityEvaluator,
    OutputJudgeEvaluator, TrajectoryJudgeEvaluator, TrajectoryMatchEvaluator,
};
use crate::types::{EvaluationOutcome, EvaluatorType, ExecutionStep};
use async_trait::async_trait;
use flowlab_datasets::Record;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Everything about a test case an evaluator may look at besides the
/// actual and expected outputs.
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    /// Data point input.
    pub input: Record,
    /// Path the agent actually took.
    pub trajectory: Vec<String>,
    /// Path the data point expects.
    pub expected_trajectory: Option<Vec<String>>,
    /// Grounding context recorded on the data point.
    pub context_used: Option<String>,
    /// Per-node trace from the execution engine.
    pub execution_trace: Option<Vec<ExecutionStep>>,
}

impl EvaluationContext {
    /// Context with only an actual trajectory.
    pub fn with_trajectory(trajectory: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            trajectory: trajectory.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Set the expected trajectory.
    pub fn expected_trajectory(
        mut self,
        expected: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.expected_trajectory = Some(expected.into_iter().map(Into::into).collect());
        self
    }

    /// Set the grounding context.
    pub fn context_used(mut self, context: impl Into<String>) -> Self {
        self.context_used = Some(context.into());
        self
    }

    /// Set the execution trace.
    pub fn execution_trace(mut self, trace: Vec<ExecutionStep>) -> Self {
        self.execution_trace = Some(trace);
        self
    }
}

/// A scoring strategy.
///
/// Implementations are stateless with respect to the case being scored and
/// return an unweighted score in `[0, 1]`.
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// The type tag this evaluator is registered under.
    fn evaluator_type(&self) -> EvaluatorType;

    /// Score `actual` against `expected`.
    async fn evaluate(
        &self,
        actual: &Value,
        expected: Option<&Value>,
        config: &Record,
        ctx: &EvaluationContext,
    ) -> EvalResult<EvaluationOutcome>;
}

/// Decode an evaluator's option record into its typed form.
pub fn decode_config<T: DeserializeOwned>(
    evaluator: EvaluatorType,
    config: &Record,
) -> EvalResult<T> {
    serde_json::from_value(Value::Object(config.clone()))
        .map_err(|e| EvalError::invalid_config(evaluator, e.to_string()))
}

/// Lookup of evaluators keyed by type.
#[derive(Clone, Default)]
pub struct EvaluatorRegistry {
    evaluators: HashMap<EvaluatorType, Arc<dyn Evaluator>>,
}

impl EvaluatorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// All seven built-in evaluators, with both judge evaluators backed by
    /// `judge`.
    pub fn builtin(judge: Arc<dyn JudgeBackend>) -> Self {
        Self::new()
            .with(ExactMatchEvaluator)
            .with(ContainsEvaluator)
            .with(JsonSimilarityEvaluator)
            .with(ContextPrecisionEvaluator)
            .with(OutputJudgeEvaluator::new(judge.clone()))
            .with(TrajectoryJudgeEvaluator::new(judge))
            .with(TrajectoryMatchEvaluator)
    }

    /// Built-ins backed by [`HeuristicJudge`].
    pub fn heuristic() -> Self {
        Self::builtin(Arc::new(HeuristicJudge::new()))
    }

    /// Add an evaluator, replacing any registered under the same type.
    pub fn with<E: Evaluator + 'static>(mut self, evaluator: E) -> Self {
        self.register(Arc::new(evaluator));
        self
    }

    /// Add an evaluator, returning the one it replaced.
    pub fn register(&mut self, evaluator: Arc<dyn Evaluator>) -> Option<Arc<dyn Evaluator>> {
        self.evaluators.insert(evaluator.evaluator_type(), evaluator)
    }

    /// Evaluator for a type.
    pub fn get(&self, evaluator_type: EvaluatorType) -> Option<Arc<dyn Evaluator>> {
        self.evaluators.get(&evaluator_type).cloned()
    }

    /// Number of registered evaluators.
    pub fn len(&self) -> usize {
        self.evaluators.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.evaluators.is_empty()
    }
}

impl fmt::Debug for EvaluatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.evaluators.keys().collect();
        types.sort();
        f.debug_struct("EvaluatorRegistry")
            .field("types", &types)
            .finish()
    }
}
