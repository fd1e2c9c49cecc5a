//! Canonical export/import round trips.

use flowlab_datasets::{
    export_to_csv, export_to_json, parse_csv, parse_json, DataPoint, Dataset, DatasetSource,
    DatasetStore, FileBlobStore, Record, SequentialIdGenerator,
};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::{json, Value};
use std::sync::Arc;

fn record(value: Value) -> Record {
    value.as_object().cloned().unwrap_or_default()
}

fn sample_dataset() -> Dataset {
    Dataset::new("ds_1", "roundtrip", Some("mixed cases".to_string()), DatasetSource::Manual)
        .with_data_points([
            DataPoint::new(
                "dp_1",
                record(json!({"query": "What's the \"weather\", today?", "n": 3})),
                DatasetSource::Manual,
            )
            .with_expected_output(record(json!({"answer": "sunny", "tags": ["a", "b"]})))
            .with_expected_trajectory(["trigger-1", "llm-1", "output-1"])
            .with_context("Forecast: sunny,\nwarm"),
            DataPoint::new("dp_2", record(json!({"value": "plain text"})), DatasetSource::Manual),
            DataPoint::new(
                "dp_3",
                record(json!({"nested": {"deep": [1, 2, {"x": null}]}})),
                DatasetSource::Manual,
            )
            .with_expected_trajectory(["retrieval-1"]),
        ])
}

type Canonical = (Record, Option<Record>, Option<String>, Option<Vec<String>>);

fn canonical(points: &[DataPoint]) -> Vec<Canonical> {
    points
        .iter()
        .map(|p| {
            (
                p.input.clone(),
                p.expected_output.clone(),
                p.context.clone(),
                p.expected_trajectory.clone(),
            )
        })
        .collect()
}

#[test]
fn csv_export_reimports_canonical_fields() {
    let dataset = sample_dataset();
    let csv = export_to_csv(&dataset);

    let imported = parse_csv(&csv, &SequentialIdGenerator::new());
    assert!(imported.success);
    assert!(imported.errors.is_empty(), "{:?}", imported.errors);
    assert_eq!(canonical(&imported.data_points), canonical(&dataset.data_points));
}

#[test]
fn json_export_reimports_canonical_fields() {
    let dataset = sample_dataset();
    let text = export_to_json(&dataset).unwrap();

    let imported = parse_json(&text, &SequentialIdGenerator::new());
    assert!(imported.success);
    assert!(imported.errors.is_empty(), "{:?}", imported.errors);
    assert_eq!(canonical(&imported.data_points), canonical(&dataset.data_points));
}

fn single_point(point: DataPoint) -> Dataset {
    Dataset::new("ds_edge", "edge", None, DatasetSource::Manual).with_data_points([point])
}

fn base_point() -> DataPoint {
    DataPoint::new("dp_1", record(json!({"query": "hi"})), DatasetSource::Manual)
}

fn blank_fields_point() -> DataPoint {
    let mut point = base_point();
    point.context = Some("   ".to_string());
    point.expected_trajectory = Some(Vec::new());
    point
}

#[rstest]
#[case::empty_context(base_point().with_context(""))]
#[case::whitespace_context(base_point().with_context(" \t "))]
#[case::padded_context(base_point().with_context("  padded  "))]
#[case::quote_only_context(base_point().with_context("\"\""))]
#[case::empty_trajectory(base_point().with_expected_trajectory(Vec::<String>::new()))]
#[case::padded_step(base_point().with_expected_trajectory([" a ", "b"]))]
#[case::quote_only_output(base_point().with_expected_output(record(json!({"value": "\"\""}))))]
#[case::empty_output(base_point().with_expected_output(Record::new()))]
#[case::blank_fields_assigned_directly(blank_fields_point())]
fn edge_points_survive_both_codecs(#[case] point: DataPoint) {
    let dataset = single_point(point);
    let stored = canonical(&dataset.data_points);

    let csv = parse_csv(&export_to_csv(&dataset), &SequentialIdGenerator::new());
    assert!(csv.errors.is_empty(), "{:?}", csv.errors);
    assert_eq!(canonical(&csv.data_points), stored);

    let json = parse_json(&export_to_json(&dataset).unwrap(), &SequentialIdGenerator::new());
    assert!(json.errors.is_empty(), "{:?}", json.errors);
    assert_eq!(canonical(&json.data_points), stored);
}

#[test]
fn blank_values_are_stored_as_absent() {
    let dataset = single_point(blank_fields_point());
    assert_eq!(dataset.data_points[0].context, None);
    assert_eq!(dataset.data_points[0].expected_trajectory, None);

    let padded = base_point().with_expected_trajectory([" a "]);
    assert_eq!(padded.expected_trajectory, Some(vec!["a".to_string()]));
}

#[tokio::test]
async fn file_store_persists_datasets() {
    let dir = std::env::temp_dir().join(format!("flowlab_roundtrip_{}", uuid::Uuid::new_v4()));
    let ids = Arc::new(SequentialIdGenerator::new());

    let store = DatasetStore::new(Arc::new(FileBlobStore::new(&dir)), ids.clone(), "datasets");
    store.save(sample_dataset()).await.unwrap();

    let reopened = DatasetStore::new(Arc::new(FileBlobStore::new(&dir)), ids, "datasets");
    let loaded = reopened.require("ds_1").await.unwrap();
    assert_eq!(loaded, sample_dataset_with_times(&loaded));

    let _ = tokio::fs::remove_dir_all(&dir).await;
}

fn sample_dataset_with_times(loaded: &Dataset) -> Dataset {
    let mut expected = sample_dataset();
    expected.created_at = loaded.created_at;
    expected.updated_at = loaded.updated_at;
    for (point, stored) in expected.data_points.iter_mut().zip(&loaded.data_points) {
        point.metadata.created_at = stored.metadata.created_at;
    }
    expected
}
