//! # flowlab-evals
//!
//! Scoring of agent outputs and execution paths against test datasets.
//!
//! ## Core Concepts
//!
//! - **[`Evaluator`]**: A scoring strategy, looked up by [`EvaluatorType`]
//!   in an [`EvaluatorRegistry`]
//! - **[`EvalRunner`]**: Scores one data point ([`EvalRunner::run_case`]) or
//!   executes and scores a whole dataset ([`EvalRunner::run_dataset`])
//! - **[`calculate_summary`]**: Reduces case results to an
//!   [`EvaluationSummary`]
//! - **[`RunHistory`]**: The last runs, most recent first
//! - **[`JudgeBackend`]**: What the judge evaluators delegate grading to
//!
//! ## Built-in Evaluators
//!
//! - **`exact_match`**: Normalized string equality
//! - **`contains`**: Keyword hits
//! - **`json_similarity`**: Recursive structural similarity with a diff
//! - **`context_precision`**: Grounding relevance and expected coverage
//! - **`llm_judge_output`**: Judge-graded output quality
//! - **`llm_judge_trajectory`**: Judge-graded path and reasoning
//! - **`trajectory_match`**: Order-aware path alignment
//!
//! ## Example
//!
//! ```ignore
//! use flowlab_evals::prelude::*;
//!
//! let runner = EvalRunner::new(EvaluatorRegistry::heuristic());
//! let evaluators = vec![
//!     EvaluatorConfig::new(EvaluatorType::ExactMatch),
//!     EvaluatorConfig::new(EvaluatorType::TrajectoryMatch).with_weight(2.0),
//! ];
//!
//! let run = runner
//!     .run_dataset("nightly", &dataset, evaluators, &executor, RunMode::Offline)
//!     .await?;
//! history.save(&run).await?;
//! println!("Pass rate: {:.1}%", run.summary.pass_rate * 100.0);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod evaluator;
pub mod history;
pub mod judge;
pub mod online;
pub mod run;
pub mod runner;
pub mod scorers;
pub mod settings;
pub mod similarity;
pub mod summary;
pub mod types;

// Re-exports
pub use error::{EvalError, EvalResult};
pub use evaluator::{decode_config, EvaluationContext, Evaluator, EvaluatorRegistry};
pub use history::{RunHistory, MAX_RUNS};
pub use judge::{
    HeuristicJudge, JudgeBackend, JudgeClient, JudgeVerdict, OutputJudgeRequest, PromptJudge,
};
pub use online::{OnlineConfigStore, OnlineEvaluationConfig};
pub use run::{EvaluationRun, EvaluationScope, RunConfig, RunMode, RunStatus};
pub use runner::{
    AgentExecution, AgentExecutor, EvalOptions, EvalRunner, RecordedExecutor, CASE_PASS_THRESHOLD,
};
pub use scorers::{align_trajectory, trajectory_score, TrajectoryAlignment};
pub use settings::{default_evaluators, default_options, EvalSettings};
pub use summary::{calculate_summary, EvaluationSummary};
pub use types::{
    EvaluationOutcome, EvaluatorConfig, EvaluatorDetails, EvaluatorResult, EvaluatorType,
    ExecutionStep, TestCaseResult,
};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        calculate_summary, default_evaluators, AgentExecution, AgentExecutor, EvalOptions,
        EvalResult, EvalRunner, EvaluationContext, EvaluationOutcome, EvaluationRun,
        EvaluationSummary, Evaluator, EvaluatorConfig, EvaluatorRegistry, EvaluatorType,
        ExecutionStep, JudgeBackend, RecordedExecutor, RunHistory, RunMode, RunStatus,
        TestCaseResult,
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowlab_datasets::{DataPoint, DatasetSource, Record};
    use serde_json::json;

    #[test]
    fn test_prelude_imports() {
        use crate::prelude::*;

        let _runner = EvalRunner::new(EvaluatorRegistry::heuristic());
        let _config = EvaluatorConfig::new(EvaluatorType::Contains);
        let _summary: EvaluationSummary = calculate_summary(&[]);
    }

    #[test]
    fn test_anyhow_errors_convert() {
        let err: EvalError = anyhow::anyhow!("model unavailable").into();
        assert_eq!(err.to_string(), "model unavailable");
    }

    #[test]
    fn test_run_case_blocking() {
        let runner = EvalRunner::new(EvaluatorRegistry::heuristic());
        let point = DataPoint::new("dp_1", Record::new(), DatasetSource::Manual);
        let result = tokio_test::block_on(runner.run_case(
            &point,
            json!("anything"),
            Vec::new(),
            &[EvaluatorConfig::new(EvaluatorType::Contains)],
            None,
        ));
        assert!(result.passed);
        assert_eq!(result.aggregate_score, 1.0);
    }
}
