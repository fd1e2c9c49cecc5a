//! Dataset and data point definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Arbitrary key-value record used for inputs and expected outputs.
pub type Record = Map<String, Value>;

/// Where a dataset (or a single data point) came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetSource {
    /// Written by hand.
    #[default]
    Manual,
    /// Imported from CSV or JSON.
    Import,
    /// Synthesized by the test-case generator.
    Generated,
}

impl fmt::Display for DatasetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manual => write!(f, "manual"),
            Self::Import => write!(f, "import"),
            Self::Generated => write!(f, "generated"),
        }
    }
}

/// Provenance of a data point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPointMetadata {
    /// Origin of the data point.
    pub source: DatasetSource,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Free-form tags (e.g. `edge_case`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl DataPointMetadata {
    /// Metadata stamped with the current time.
    pub fn now(source: DatasetSource) -> Self {
        Self {
            source,
            created_at: Utc::now(),
            tags: Vec::new(),
        }
    }
}

/// A single test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPoint {
    /// Unique id.
    pub id: String,
    /// Input given to the agent.
    pub input: Record,
    /// Expected output, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<Record>,
    /// Expected execution path, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_trajectory: Option<Vec<String>>,
    /// Grounding context supplied with the input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Provenance.
    pub metadata: DataPointMetadata,
}

impl DataPoint {
    /// Create a data point with the given input.
    pub fn new(id: impl Into<String>, input: Record, source: DatasetSource) -> Self {
        Self {
            id: id.into(),
            input,
            expected_output: None,
            expected_trajectory: None,
            context: None,
            metadata: DataPointMetadata::now(source),
        }
    }

    /// Set the expected output.
    pub fn with_expected_output(mut self, output: Record) -> Self {
        self.expected_output = Some(output);
        self
    }

    /// Set the expected trajectory. Steps are trimmed and blank steps
    /// dropped; an empty path leaves the trajectory unset.
    pub fn with_expected_trajectory(
        mut self,
        steps: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.expected_trajectory =
            normalize_trajectory(Some(steps.into_iter().map(Into::into).collect()));
        self
    }

    /// Set the grounding context. Blank context leaves it unset.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = normalize_context(Some(context.into()));
        self
    }

    /// Apply the trajectory and context rules of the builders to values
    /// assigned directly to the fields.
    pub fn normalized(mut self) -> Self {
        self.expected_trajectory = normalize_trajectory(self.expected_trajectory.take());
        self.context = normalize_context(self.context.take());
        self
    }

    /// Add a metadata tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.metadata.tags.push(tag.into());
        self
    }

    /// Whether the data point carries any oracle at all.
    pub fn has_expectation(&self) -> bool {
        self.expected_output.is_some()
            || self
                .expected_trajectory
                .as_ref()
                .is_some_and(|t| !t.is_empty())
    }
}

/// Blank context is treated as absent.
pub fn normalize_context(context: Option<String>) -> Option<String> {
    context.filter(|c| !c.trim().is_empty())
}

/// Trim step ids and drop blank ones. A path with no steps left is absent.
pub fn normalize_trajectory(steps: Option<Vec<String>>) -> Option<Vec<String>> {
    let steps: Vec<String> = steps?
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    (!steps.is_empty()).then_some(steps)
}

/// A named, ordered collection of data points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    /// Unique id, immutable after creation.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Test cases in order.
    #[serde(default)]
    pub data_points: Vec<DataPoint>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last save time.
    pub updated_at: DateTime<Utc>,
    /// Provenance.
    pub source: DatasetSource,
}

impl Dataset {
    /// Create an empty dataset. Both timestamps are equal.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: Option<String>,
        source: DatasetSource,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            description,
            data_points: Vec::new(),
            created_at: now,
            updated_at: now,
            source,
        }
    }

    /// Append data points.
    pub fn with_data_points(mut self, points: impl IntoIterator<Item = DataPoint>) -> Self {
        let points = points.into_iter().map(DataPoint::normalized);
        self.data_points.extend(points);
        self
    }

    /// Number of data points.
    pub fn len(&self) -> usize {
        self.data_points.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.data_points.is_empty()
    }

    /// Find a data point by id.
    pub fn data_point(&self, id: &str) -> Option<&DataPoint> {
        self.data_points.iter().find(|p| p.id == id)
    }

    /// Advisory validation. Callers decide whether errors block a save.
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();

        if self.name.trim().is_empty() {
            report.errors.push("Dataset name is required".to_string());
        }
        if self.data_points.is_empty() {
            report
                .errors
                .push("Dataset must contain at least one data point".to_string());
        }

        for (idx, point) in self.data_points.iter().enumerate() {
            if point.input.is_empty() {
                report.errors.push(format!(
                    "Data point {} ({}) has an empty input",
                    idx + 1,
                    point.id
                ));
            }
            if !point.has_expectation() {
                report.warnings.push(format!(
                    "Data point {} ({}) has neither an expected output nor an expected trajectory",
                    idx + 1,
                    point.id
                ));
            }
        }

        report
    }
}

/// Outcome of [`Dataset::validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Blocking problems.
    pub errors: Vec<String>,
    /// Non-blocking observations.
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// True when there are no errors.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => Record::new(),
        }
    }

    #[test]
    fn test_new_dataset_timestamps_equal() {
        let ds = Dataset::new("ds_1", "smoke", None, DatasetSource::Manual);
        assert_eq!(ds.created_at, ds.updated_at);
        assert!(ds.is_empty());
    }

    #[test]
    fn test_validate_empty_dataset() {
        let ds = Dataset::new("ds_1", "  ", None, DatasetSource::Manual);
        let report = ds.validate();
        assert!(!report.is_valid());
        assert_eq!(report.errors.len(), 2);
    }

    #[test]
    fn test_validate_warns_without_expectation() {
        let ds = Dataset::new("ds_1", "smoke", None, DatasetSource::Manual).with_data_points([
            DataPoint::new("dp_1", record(json!({"query": "hi"})), DatasetSource::Manual),
        ]);
        let report = ds.validate();
        assert!(report.is_valid());
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_validate_empty_input_is_error() {
        let ds = Dataset::new("ds_1", "smoke", None, DatasetSource::Manual).with_data_points([
            DataPoint::new("dp_1", Record::new(), DatasetSource::Manual)
                .with_expected_trajectory(["trigger-1"]),
        ]);
        let report = ds.validate();
        assert_eq!(report.errors.len(), 1);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_blank_context_and_empty_path_are_absent() {
        let point = DataPoint::new("dp_1", record(json!({"q": 1})), DatasetSource::Manual)
            .with_context(" \n ")
            .with_expected_trajectory(Vec::<String>::new());
        assert_eq!(point.context, None);
        assert_eq!(point.expected_trajectory, None);

        let point = point
            .with_context("  keep padding ")
            .with_expected_trajectory([" a ", "", "b"]);
        assert_eq!(point.context.as_deref(), Some("  keep padding "));
        assert_eq!(point.expected_trajectory, Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn test_normalized_fixes_direct_assignment() {
        let mut point = DataPoint::new("dp_1", record(json!({"q": 1})), DatasetSource::Manual);
        point.context = Some(String::new());
        point.expected_trajectory = Some(vec!["  ".to_string()]);

        let ds = Dataset::new("ds_1", "smoke", None, DatasetSource::Manual)
            .with_data_points([point]);
        assert_eq!(ds.data_points[0].context, None);
        assert_eq!(ds.data_points[0].expected_trajectory, None);
    }

    #[test]
    fn test_camel_case_serialization() {
        let point = DataPoint::new("dp_1", record(json!({"q": 1})), DatasetSource::Import)
            .with_expected_trajectory(["a", "b"]);
        let value = serde_json::to_value(&point).unwrap();
        assert_eq!(value["expectedTrajectory"], json!(["a", "b"]));
        assert_eq!(value["metadata"]["source"], json!("import"));
        assert!(value.get("expectedOutput").is_none());
    }
}
