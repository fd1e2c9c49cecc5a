//! JSON import/export.

use super::{into_record, stringify, ImportResult};
use crate::identifier::IdGenerator;
use crate::model::{DataPoint, Dataset, DatasetSource, Record};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

const INPUT_KEYS: &[&str] = &["input", "query"];
const EXPECTED_KEYS: &[&str] = &["expected_output", "expectedOutput", "expected", "output"];
const TRAJECTORY_KEYS: &[&str] = &["expected_trajectory", "expectedTrajectory", "trajectory"];

/// First present, non-null value among `keys`.
fn pick<'a>(item: &'a Record, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| item.get(*k))
        .find(|v| !v.is_null())
}

fn parse_item(
    index: usize,
    item: Value,
    ids: &dyn IdGenerator,
    warnings: &mut Vec<String>,
) -> Result<DataPoint, String> {
    let n = index + 1;
    let fields = match item {
        Value::Null => return Err(format!("Item {}: entry is null", n)),
        Value::Object(map) => map,
        scalar => {
            return Ok(DataPoint::new(
                ids.next_id("dp"),
                into_record(scalar),
                DatasetSource::Import,
            ))
        }
    };

    let input = match pick(&fields, INPUT_KEYS) {
        Some(value) => into_record(value.clone()),
        None => fields.clone(),
    };
    if input.is_empty() {
        return Err(format!("Item {}: input is empty", n));
    }

    let mut point = DataPoint::new(ids.next_id("dp"), input, DatasetSource::Import);

    point.expected_output = pick(&fields, EXPECTED_KEYS).map(|v| into_record(v.clone()));

    match pick(&fields, TRAJECTORY_KEYS) {
        Some(Value::Array(steps)) => {
            point = point.with_expected_trajectory(steps.iter().map(stringify));
        }
        Some(_) => warnings.push(format!("Item {}: trajectory ignored (not an array)", n)),
        None => {}
    }

    if let Some(context) = fields.get("context").filter(|v| !v.is_null()) {
        point = point.with_context(stringify(context));
    }

    Ok(point)
}

/// Parse JSON content into data points.
///
/// Accepts an array, an object wrapping a `dataPoints` or `data` array, or
/// a single object. Invalid JSON is fatal; item failures are collected.
pub fn parse_json(content: &str, ids: &dyn IdGenerator) -> ImportResult {
    let root: Value = match serde_json::from_str(content) {
        Ok(value) => value,
        Err(e) => return ImportResult::fatal(format!("Invalid JSON: {}", e)),
    };

    let items = match root {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            let wrapper = ["dataPoints", "data"]
                .into_iter()
                .find(|k| map.get(*k).is_some_and(Value::is_array));
            match wrapper.and_then(|k| map.remove(k)) {
                Some(Value::Array(items)) => items,
                _ => vec![Value::Object(map)],
            }
        }
        _ => return ImportResult::fatal("JSON root must be an array or an object"),
    };

    let total = items.len();
    let mut result = ImportResult::default();
    for (index, item) in items.into_iter().enumerate() {
        match parse_item(index, item, ids, &mut result.warnings) {
            Ok(point) => result.data_points.push(point),
            Err(e) => {
                warn!(index, error = %e, "Skipping JSON item");
                result.errors.push(e);
            }
        }
    }

    debug!(
        items = total,
        imported = result.data_points.len(),
        errors = result.errors.len(),
        "Parsed JSON import"
    );
    result.finish()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DatasetExport<'a> {
    id: &'a str,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    source: DatasetSource,
    exported_at: DateTime<Utc>,
    data_points: Vec<ExportedPoint<'a>>,
}

#[derive(Serialize)]
struct ExportedPoint<'a> {
    input: &'a Record,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected_output: Option<&'a Record>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected_trajectory: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a str>,
}

/// Export a dataset with canonical field names, its metadata and an
/// export timestamp.
pub fn export_to_json(dataset: &Dataset) -> serde_json::Result<String> {
    let points: Vec<DataPoint> = dataset
        .data_points
        .iter()
        .cloned()
        .map(DataPoint::normalized)
        .collect();
    let export = DatasetExport {
        id: &dataset.id,
        name: &dataset.name,
        description: dataset.description.as_deref(),
        source: dataset.source,
        exported_at: Utc::now(),
        data_points: points
            .iter()
            .map(|p| ExportedPoint {
                input: &p.input,
                expected_output: p.expected_output.as_ref(),
                expected_trajectory: p.expected_trajectory.as_deref(),
                context: p.context.as_deref(),
            })
            .collect(),
    };
    serde_json::to_string_pretty(&export)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::SequentialIdGenerator;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn parse(content: &str) -> ImportResult {
        parse_json(content, &SequentialIdGenerator::new())
    }

    #[test]
    fn test_invalid_json_is_fatal() {
        let result = parse("[{\"input\": ");
        assert!(!result.success);
        assert!(result.data_points.is_empty());
        assert!(result.errors[0].starts_with("Invalid JSON"));
    }

    #[test]
    fn test_scalar_root_is_fatal() {
        let result = parse("42");
        assert!(!result.success);
    }

    #[test]
    fn test_wrapper_shapes() {
        let wrapped = parse(r#"{"dataPoints": [{"input": "a"}, {"input": "b"}]}"#);
        assert_eq!(wrapped.data_points.len(), 2);
        assert_eq!(parse(r#"{"data": [{"query": "a"}]}"#).data_points.len(), 1);
        assert_eq!(parse(r#"{"input": {"q": 1}}"#).data_points.len(), 1);
    }

    #[test]
    fn test_aliases() {
        let result = parse(
            r#"[
                {"query": "hi", "expected": "hello", "trajectory": ["a", "b"],
                 "context": "greeting"},
                {"input": {"q": 2}, "expectedOutput": {"answer": 4}, "expectedTrajectory": "nope"}
            ]"#,
        );
        assert!(result.success);
        let first = &result.data_points[0];
        assert_eq!(Value::Object(first.input.clone()), json!({"value": "hi"}));
        assert_eq!(
            first.expected_output.clone().map(Value::Object),
            Some(json!({"value": "hello"}))
        );
        assert_eq!(first.expected_trajectory, Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(first.context.as_deref(), Some("greeting"));

        let second = &result.data_points[1];
        assert_eq!(
            second.expected_output.clone().map(Value::Object),
            Some(json!({"answer": 4}))
        );
        assert_eq!(second.expected_trajectory, None);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_whole_item_is_input_without_input_key() {
        let result = parse(r#"[{"question": "why", "output": "because"}]"#);
        let point = &result.data_points[0];
        assert_eq!(
            Value::Object(point.input.clone()),
            json!({"question": "why", "output": "because"})
        );
        assert!(point.expected_output.is_some());
    }

    #[test]
    fn test_null_item_collected_as_error() {
        let result = parse(r#"[null, {"input": "ok"}, {}]"#);
        assert!(result.success);
        assert_eq!(result.data_points.len(), 1);
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_null_alias_falls_through() {
        let result = parse(r#"[{"input": null, "query": "fallback"}]"#);
        assert_eq!(
            Value::Object(result.data_points[0].input.clone()),
            json!({"value": "fallback"})
        );
    }

    #[test]
    fn test_blank_context_and_empty_path_import_as_absent() {
        let result = parse(r#"[{"input": "a", "trajectory": [], "context": "  "}]"#);
        let point = &result.data_points[0];
        assert_eq!(point.expected_trajectory, None);
        assert_eq!(point.context, None);

        let result = parse(r#"[{"input": "a", "trajectory": [" t1 ", 2]}]"#);
        assert_eq!(
            result.data_points[0].expected_trajectory,
            Some(vec!["t1".to_string(), "2".to_string()])
        );
    }

    #[test]
    fn test_export_uses_canonical_names() {
        let input = json!({"q": 1}).as_object().cloned().unwrap_or_default();
        let ds = Dataset::new("ds_1", "export", Some("d".to_string()), DatasetSource::Manual)
            .with_data_points([DataPoint::new("dp_1", input, DatasetSource::Manual)
                .with_expected_trajectory(["t1"])]);

        let text = export_to_json(&ds).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["name"], json!("export"));
        assert!(value["exportedAt"].is_string());
        assert_eq!(value["dataPoints"][0]["expected_trajectory"], json!(["t1"]));
        assert!(value["dataPoints"][0].get("expected_output").is_none());
    }
}
