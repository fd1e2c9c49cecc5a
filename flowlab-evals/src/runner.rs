//! Evaluation runner.

use crate::error::{EvalError, EvalResult};
use crate::evaluator::{EvaluationContext, EvaluatorRegistry};
use crate::run::{EvaluationRun, EvaluationScope, RunConfig, RunMode};
use crate::summary::calculate_summary;
use crate::types::{EvaluatorConfig, EvaluatorResult, ExecutionStep, TestCaseResult};
use async_trait::async_trait;
use flowlab_datasets::{DataPoint, Dataset, DefaultIdGenerator, IdGenerator};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Aggregate score a case must reach, on top of every evaluator passing.
pub const CASE_PASS_THRESHOLD: f64 = 0.7;

/// Options for running evaluations.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalOptions {
    /// Maximum data points evaluated at once.
    pub concurrency: usize,
    /// Deadline for a single evaluator call.
    pub evaluator_timeout: Option<Duration>,
    /// Run a case's evaluators concurrently.
    pub parallel_evaluators: bool,
    /// Stop a dataset run after the first failed case.
    pub fail_fast: bool,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            evaluator_timeout: None,
            parallel_evaluators: false,
            fail_fast: false,
        }
    }
}

impl EvalOptions {
    /// Create new options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set concurrency.
    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    /// Set the per-evaluator timeout.
    pub fn evaluator_timeout(mut self, timeout: Duration) -> Self {
        self.evaluator_timeout = Some(timeout);
        self
    }

    /// Run evaluators concurrently within a case.
    pub fn parallel_evaluators(mut self) -> Self {
        self.parallel_evaluators = true;
        self
    }

    /// Enable fail-fast mode.
    pub fn fail_fast(mut self) -> Self {
        self.fail_fast = true;
        self
    }
}

/// What the execution engine produced for one data point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentExecution {
    /// Final output.
    pub output: Value,
    /// Visited step ids, in order.
    pub trajectory: Vec<String>,
    /// Per-node trace.
    pub trace: Option<Vec<ExecutionStep>>,
}

impl AgentExecution {
    /// An execution with an output and a path.
    pub fn new(output: Value, trajectory: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            output,
            trajectory: trajectory.into_iter().map(Into::into).collect(),
            trace: None,
        }
    }

    /// Attach a trace.
    pub fn with_trace(mut self, trace: Vec<ExecutionStep>) -> Self {
        self.trace = Some(trace);
        self
    }
}

/// Produces actual outputs for data points.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    /// Execute the workflow under test on one data point.
    async fn execute(&self, data_point: &DataPoint) -> EvalResult<AgentExecution>;
}

/// Replays executions recorded ahead of time, keyed by data point id.
#[derive(Debug, Clone, Default)]
pub struct RecordedExecutor {
    executions: HashMap<String, AgentExecution>,
}

impl RecordedExecutor {
    /// An executor with nothing recorded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the execution for a data point.
    pub fn record(mut self, data_point_id: impl Into<String>, execution: AgentExecution) -> Self {
        self.executions.insert(data_point_id.into(), execution);
        self
    }
}

#[async_trait]
impl AgentExecutor for RecordedExecutor {
    async fn execute(&self, data_point: &DataPoint) -> EvalResult<AgentExecution> {
        self.executions.get(&data_point.id).cloned().ok_or_else(|| {
            EvalError::task_failed(format!(
                "No recorded execution for data point '{}'",
                data_point.id
            ))
        })
    }
}

/// Evaluation runner.
pub struct EvalRunner {
    registry: EvaluatorRegistry,
    options: EvalOptions,
    ids: Arc<dyn IdGenerator>,
}

impl EvalRunner {
    /// Runner over `registry`.
    pub fn new(registry: EvaluatorRegistry) -> Self {
        Self {
            registry,
            options: EvalOptions::default(),
            ids: Arc::new(DefaultIdGenerator::new()),
        }
    }

    /// Set options.
    pub fn options(mut self, options: EvalOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the id generator used for run ids.
    pub fn ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Current options.
    pub fn current_options(&self) -> &EvalOptions {
        &self.options
    }

    /// Score one data point against its actual output and path.
    ///
    /// Evaluator errors, timeouts and unregistered types become zero-score
    /// failing results for that evaluator; the rest still run.
    pub async fn run_case(
        &self,
        data_point: &DataPoint,
        actual_output: Value,
        actual_trajectory: Vec<String>,
        evaluators: &[EvaluatorConfig],
        execution_trace: Option<Vec<ExecutionStep>>,
    ) -> TestCaseResult {
        let start = Instant::now();
        let expected = data_point.expected_output.clone().map(Value::Object);
        let ctx = EvaluationContext {
            input: data_point.input.clone(),
            trajectory: actual_trajectory,
            expected_trajectory: data_point.expected_trajectory.clone(),
            context_used: data_point.context.clone(),
            execution_trace,
        };

        let evaluator_results = if self.options.parallel_evaluators {
            futures::future::join_all(
                evaluators.iter().map(|config| {
                    self.evaluate_one(config, &actual_output, expected.as_ref(), &ctx)
                }),
            )
            .await
        } else {
            let mut results = Vec::with_capacity(evaluators.len());
            for config in evaluators {
                results.push(
                    self.evaluate_one(config, &actual_output, expected.as_ref(), &ctx)
                        .await,
                );
            }
            results
        };

        let result = assemble_case(
            data_point,
            actual_output,
            ctx.trajectory,
            evaluator_results,
            start.elapsed(),
        );
        debug!(
            data_point = %result.data_point_id,
            score = result.aggregate_score,
            passed = result.passed,
            "Evaluated test case"
        );
        result
    }

    async fn evaluate_one(
        &self,
        config: &EvaluatorConfig,
        actual: &Value,
        expected: Option<&Value>,
        ctx: &EvaluationContext,
    ) -> EvaluatorResult {
        let start = Instant::now();

        let outcome = match self.registry.get(config.evaluator_type) {
            None => Err(EvalError::UnknownEvaluator(config.evaluator_type)),
            Some(evaluator) => {
                let call = evaluator.evaluate(actual, expected, &config.config, ctx);
                match self.options.evaluator_timeout {
                    Some(limit) => match timeout(limit, call).await {
                        Ok(result) => result,
                        Err(_) => Err(EvalError::Timeout(limit)),
                    },
                    None => call.await,
                }
            }
        };

        match outcome {
            Ok(outcome) => EvaluatorResult::from_outcome(config, outcome, start.elapsed()),
            Err(e) => {
                let error = EvalError::evaluator_failed(&config.name, e.to_string());
                warn!(
                    evaluator = %config.name,
                    evaluator_type = %config.evaluator_type,
                    error = %e,
                    "Evaluator failed"
                );
                EvaluatorResult::failure(config, error.to_string(), start.elapsed())
            }
        }
    }

    async fn run_point(
        &self,
        data_point: &DataPoint,
        evaluators: &[EvaluatorConfig],
        executor: &dyn AgentExecutor,
    ) -> TestCaseResult {
        let start = Instant::now();
        match executor.execute(data_point).await {
            Ok(execution) => {
                self.run_case(
                    data_point,
                    execution.output,
                    execution.trajectory,
                    evaluators,
                    execution.trace,
                )
                .await
            }
            Err(e) => {
                warn!(data_point = %data_point.id, error = %e, "Execution failed");
                let message = e.to_string();
                let results = evaluators
                    .iter()
                    .map(|config| EvaluatorResult::failure(config, message.clone(), Duration::ZERO))
                    .collect();
                assemble_case(data_point, Value::Null, Vec::new(), results, start.elapsed())
            }
        }
    }

    /// Execute and score every data point of `dataset` over the whole
    /// workflow.
    pub async fn run_dataset(
        &self,
        name: impl Into<String>,
        dataset: &Dataset,
        evaluators: Vec<EvaluatorConfig>,
        executor: &dyn AgentExecutor,
        mode: RunMode,
    ) -> EvalResult<EvaluationRun> {
        let config = RunConfig {
            scope: EvaluationScope::FullWorkflow,
            evaluators,
            dataset_id: Some(dataset.id.clone()),
        };
        self.run_with_config(name, dataset, config, executor, mode)
            .await
    }

    /// Execute and score every data point of `dataset` under `config`.
    ///
    /// The returned run is `failed` when there is nothing to evaluate and
    /// `completed` otherwise; results keep dataset order.
    pub async fn run_with_config(
        &self,
        name: impl Into<String>,
        dataset: &Dataset,
        config: RunConfig,
        executor: &dyn AgentExecutor,
        mode: RunMode,
    ) -> EvalResult<EvaluationRun> {
        let mut run = EvaluationRun::new(self.ids.next_id("run"), name, mode, config);

        if dataset.is_empty() {
            run.fail("Dataset has no data points")?;
            return Ok(run);
        }
        if run.config.evaluators.is_empty() {
            run.fail("No evaluators configured")?;
            return Ok(run);
        }

        run.start()?;
        info!(
            run = %run.id,
            dataset = %dataset.id,
            cases = dataset.len(),
            evaluators = run.config.evaluators.len(),
            "Starting evaluation run"
        );

        let evaluators = run.config.evaluators.as_slice();
        let results = if self.options.fail_fast {
            let mut results = Vec::new();
            for point in &dataset.data_points {
                let result = self.run_point(point, evaluators, executor).await;
                let failed = !result.passed;
                results.push(result);
                if failed {
                    debug!(run = %run.id, data_point = %point.id, "Stopping after failed case");
                    break;
                }
            }
            results
        } else {
            let semaphore = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
            let tasks: Vec<_> = dataset
                .data_points
                .iter()
                .map(|point| {
                    let sem = semaphore.clone();
                    async move {
                        let _permit = sem.acquire().await.ok();
                        self.run_point(point, evaluators, executor).await
                    }
                })
                .collect();
            futures::future::join_all(tasks).await
        };

        let summary = calculate_summary(&results);
        run.complete(results, summary)?;
        info!(
            run = %run.id,
            passed = run.summary.passed,
            failed = run.summary.failed,
            pass_rate = run.summary.pass_rate,
            "Evaluation run completed"
        );
        Ok(run)
    }
}

fn assemble_case(
    data_point: &DataPoint,
    actual_output: Value,
    actual_trajectory: Vec<String>,
    evaluator_results: Vec<EvaluatorResult>,
    elapsed: Duration,
) -> TestCaseResult {
    let total_weight: f64 = evaluator_results.iter().map(|r| r.weight).sum();
    let weighted: f64 = evaluator_results.iter().map(|r| r.weighted_score).sum();
    let aggregate_score = if total_weight > 0.0 {
        weighted / total_weight
    } else {
        0.0
    };
    let passed =
        evaluator_results.iter().all(|r| r.passed) && aggregate_score >= CASE_PASS_THRESHOLD;

    TestCaseResult {
        data_point_id: data_point.id.clone(),
        input: data_point.input.clone(),
        actual_output,
        actual_trajectory,
        evaluator_results,
        aggregate_score,
        passed,
        execution_time_ms: elapsed.as_secs_f64() * 1000.0,
    }
}

impl fmt::Debug for EvalRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvalRunner")
            .field("registry", &self.registry)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
