//! Generate a dataset, store it, evaluate it and keep the run.

use flowlab_datasets::{
    parse_csv, DatasetSource, DatasetStore, GeneratorOptions, IdGenerator, InMemoryBlobStore,
    SequentialIdGenerator, StoreKeys, TestCaseGenerator,
};
use flowlab_evals::{
    default_evaluators, AgentExecution, EvalOptions, EvalRunner, EvaluatorConfig,
    EvaluatorRegistry, EvaluatorType, ExecutionStep, OnlineConfigStore, OnlineEvaluationConfig,
    RecordedExecutor, RunHistory, RunMode, RunStatus,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;

#[tokio::test]
async fn generated_dataset_round_trip_through_history() {
    let blobs = Arc::new(InMemoryBlobStore::new());
    let keys = StoreKeys::default();
    let ids: Arc<dyn IdGenerator> = Arc::new(SequentialIdGenerator::new());

    let datasets = DatasetStore::new(blobs.clone(), ids.clone(), keys.datasets.clone());
    let points = TestCaseGenerator::new(ids.clone()).generate(
        &GeneratorOptions::new(5)
            .node_types(["trigger", "llm", "output"])
            .negative_cases(false),
    );
    let dataset = datasets
        .save(
            datasets
                .create("generated", None, DatasetSource::Generated)
                .with_data_points(points),
        )
        .await
        .unwrap();

    // Standard cases follow the expected path exactly; edge cases wander.
    let mut executor = RecordedExecutor::new();
    for point in &dataset.data_points {
        let execution = match &point.expected_trajectory {
            Some(path) => AgentExecution::new(Value::Object(point.input.clone()), path.clone()),
            None => AgentExecution::new(json!("noop"), ["trigger-1", "fallback-1"]),
        };
        executor = executor.record(point.id.clone(), execution);
    }

    let evaluators = vec![EvaluatorConfig::new(EvaluatorType::TrajectoryMatch)];
    let runner = EvalRunner::new(EvaluatorRegistry::heuristic())
        .options(EvalOptions::new().concurrency(3))
        .ids(ids.clone());
    let stored = datasets.require(&dataset.id).await.unwrap();
    let run = runner
        .run_dataset("generated", &stored, evaluators, &executor, RunMode::Offline)
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.results.len(), stored.len());
    let standard = stored
        .data_points
        .iter()
        .filter(|p| p.expected_trajectory.is_some())
        .count();
    assert_eq!(run.summary.passed, standard);
    assert_eq!(run.summary.trajectory_accuracy, Some(standard as f64 / stored.len() as f64));

    let history = RunHistory::new(blobs.clone(), keys.evaluation_runs.clone());
    history.save(&run).await.unwrap();
    let reloaded = history.get(&run.id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, RunStatus::Completed);
    assert_eq!(reloaded.summary.passed, run.summary.passed);
    assert_eq!(reloaded.summary.total_tests, run.summary.total_tests);
    assert_eq!(reloaded.results.len(), run.results.len());
}

#[tokio::test]
async fn imported_csv_scored_with_default_evaluators() {
    let ids = SequentialIdGenerator::new();
    let csv = concat!(
        "input,expected_output,expected_trajectory,context\n",
        "\"{\"\"query\"\": \"\"capital of France\"\"}\",Paris,\"retrieval-1,llm-1\",",
        "Paris is the capital of France\n",
    );
    let imported = parse_csv(csv, &ids);
    assert!(imported.success, "{:?}", imported.errors);
    let point = &imported.data_points[0];

    let trace = vec![
        ExecutionStep::new("retrieval-1", "retrieval")
            .with_output(json!(["doc"]))
            .with_duration_ms(40.0),
        ExecutionStep::new("llm-1", "llm")
            .with_output(json!("Paris"))
            .with_duration_ms(900.0),
    ];
    let runner = EvalRunner::new(EvaluatorRegistry::heuristic());
    let result = runner
        .run_case(
            point,
            json!("Paris"),
            vec!["retrieval-1".to_string(), "llm-1".to_string()],
            &default_evaluators(),
            Some(trace),
        )
        .await;

    assert_eq!(result.evaluator_results.len(), 7);
    assert!(result.evaluator_results.iter().all(|r| (0.0..=1.0).contains(&r.score)));
    assert_eq!(result.result_for(EvaluatorType::ExactMatch).map(|r| r.passed), Some(true));
    assert_eq!(result.result_for(EvaluatorType::TrajectoryMatch).map(|r| r.score), Some(1.0));
    assert_eq!(
        result.result_for(EvaluatorType::LlmJudgeTrajectory).map(|r| r.passed),
        Some(true)
    );
}

#[tokio::test]
async fn online_config_survives_reload() {
    let blobs = Arc::new(InMemoryBlobStore::new());
    let keys = StoreKeys::default();
    let store = OnlineConfigStore::new(blobs.clone(), keys.online_config.clone());

    let config = OnlineEvaluationConfig {
        enabled: true,
        sampling_rate: 0.2,
        evaluators: default_evaluators(),
        dataset_id: Some("ds_live".to_string()),
    };
    store.save(&config).await.unwrap();

    let reopened = OnlineConfigStore::new(blobs, keys.online_config);
    let loaded = reopened.load().await.unwrap();
    assert_eq!(loaded, config);
    assert!(loaded.should_sample(0.1));
    assert!(!loaded.should_sample(0.5));
}
