//! Synthetic test-case generation.
//!
//! Produces standard variations of a sample input plus fixed edge-case and
//! negative templates. Expected outputs are placeholder descriptions, so a
//! generated dataset is a weak oracle until someone fills in real answers.

use crate::identifier::IdGenerator;
use crate::model::{DataPoint, DatasetSource, Record};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// Percentage of `count` spent on standard cases.
pub const STANDARD_PERCENT: usize = 60;
/// Percentage of `count` spent on edge cases.
pub const EDGE_PERCENT: usize = 25;
/// Percentage of `count` spent on negative cases.
pub const NEGATIVE_PERCENT: usize = 15;

/// Node types that contribute a canonical step, in trajectory order.
const TRAJECTORY_NODE_TYPES: [&str; 4] = ["trigger", "retrieval", "llm", "output"];

/// Tag applied to standard cases.
pub const TAG_STANDARD: &str = "standard";
/// Tag applied to edge cases.
pub const TAG_EDGE_CASE: &str = "edge_case";
/// Tag applied to negative cases.
pub const TAG_NEGATIVE: &str = "negative";

/// Options for [`TestCaseGenerator::generate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GeneratorOptions {
    /// Template for standard cases. Defaults to `{"query": "Sample query"}`.
    pub sample_input: Option<Record>,
    /// Node types present in the workflow under test.
    pub node_types: Vec<String>,
    /// Requested number of cases.
    pub count: usize,
    /// Append edge-case templates.
    pub include_edge_cases: bool,
    /// Append negative templates.
    pub include_negative_cases: bool,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            sample_input: None,
            node_types: Vec::new(),
            count: 10,
            include_edge_cases: true,
            include_negative_cases: true,
        }
    }
}

impl GeneratorOptions {
    /// Options requesting `count` cases.
    pub fn new(count: usize) -> Self {
        Self {
            count,
            ..Self::default()
        }
    }

    /// Set the sample input.
    pub fn sample_input(mut self, input: Record) -> Self {
        self.sample_input = Some(input);
        self
    }

    /// Set the node types.
    pub fn node_types(mut self, types: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.node_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Toggle edge cases.
    pub fn edge_cases(mut self, enabled: bool) -> Self {
        self.include_edge_cases = enabled;
        self
    }

    /// Toggle negative cases.
    pub fn negative_cases(mut self, enabled: bool) -> Self {
        self.include_negative_cases = enabled;
        self
    }
}

/// `ceil(count * percent / 100)` without floating-point drift.
fn bucket(count: usize, percent: usize) -> usize {
    (count * percent).div_ceil(100)
}

fn object(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

fn edge_templates() -> Vec<(Value, &'static str)> {
    vec![
        (json!({"query": ""}), "Handles empty input gracefully"),
        (json!({"query": "a".repeat(10_000)}), "Handles very long input without failure"),
        (
            json!({"query": "!@#$%^&*()_+-=[]{}|;':\",./<>?`~"}),
            "Handles special characters safely",
        ),
        (json!({"query": "   \n\t   "}), "Handles whitespace-only input gracefully"),
        (
            json!({"query": "{\"nested\": {\"key\": \"value\"}}"}),
            "Treats JSON-shaped text as plain input",
        ),
    ]
}

fn negative_templates() -> Vec<(Value, &'static str)> {
    vec![
        (
            json!({"query": "'; DROP TABLE users; --"}),
            "Rejects or sanitizes SQL injection attempt",
        ),
        (
            json!({"query": "<script>alert('xss')</script>"}),
            "Rejects or sanitizes script injection attempt",
        ),
        (
            json!({"query": 12345, "unexpected_field": true}),
            "Rejects input that violates the expected schema",
        ),
    ]
}

/// Canonical step ids for the known node types, in fixed order.
pub fn synthesize_trajectory(node_types: &[String]) -> Vec<String> {
    TRAJECTORY_NODE_TYPES
        .iter()
        .filter(|t| node_types.iter().any(|n| n.eq_ignore_ascii_case(t)))
        .map(|t| format!("{}-1", t))
        .collect()
}

/// One of five deterministic variations, chosen by `index % 5`.
fn apply_variation(sample: &Record, index: usize) -> Record {
    let n = index + 1;
    let mut input = sample.clone();

    match index % 5 {
        0 => {
            input.insert("variation".to_string(), json!(format!("variation_{}", n)));
        }
        1 => {
            let query = input
                .get("query")
                .and_then(Value::as_str)
                .unwrap_or("Sample query")
                .to_string();
            input.insert("query".to_string(), json!(format!("[Variant {}] {}", n, query)));
        }
        2 => {
            let priority = ["high", "medium", "low"][index % 3];
            input.insert("priority".to_string(), json!(priority));
        }
        3 => {
            input.insert("context".to_string(), json!(format!("Test context {}", n)));
        }
        _ => {
            let format = ["json", "text", "markdown"][index % 3];
            input.insert("format".to_string(), json!(format));
        }
    }

    input
}

fn placeholder_output(description: impl Into<String>) -> Record {
    object(json!({ "description": description.into() }))
}

/// Generates data points from a sample input.
#[derive(Clone)]
pub struct TestCaseGenerator {
    ids: Arc<dyn IdGenerator>,
}

impl TestCaseGenerator {
    /// Create a generator drawing ids from `ids`.
    pub fn new(ids: Arc<dyn IdGenerator>) -> Self {
        Self { ids }
    }

    /// Generate standard, edge and negative cases.
    ///
    /// Each bucket rounds up independently, so the total may exceed
    /// `options.count` (10 requested yields 6 + 3 + 2 = 11).
    pub fn generate(&self, options: &GeneratorOptions) -> Vec<DataPoint> {
        let sample = options
            .sample_input
            .clone()
            .unwrap_or_else(|| object(json!({"query": "Sample query"})));
        let trajectory = synthesize_trajectory(&options.node_types);

        let mut points = Vec::new();

        for index in 0..bucket(options.count, STANDARD_PERCENT) {
            let mut point = DataPoint::new(
                self.ids.next_id("dp"),
                apply_variation(&sample, index),
                DatasetSource::Generated,
            )
            .with_expected_output(placeholder_output(format!(
                "Expected response for test case {}",
                index + 1
            )))
            .with_tag(TAG_STANDARD);
            if !trajectory.is_empty() {
                point.expected_trajectory = Some(trajectory.clone());
            }
            points.push(point);
        }

        if options.include_edge_cases {
            let take = bucket(options.count, EDGE_PERCENT);
            points.extend(edge_templates().into_iter().take(take).map(|(input, expected)| {
                DataPoint::new(self.ids.next_id("dp"), object(input), DatasetSource::Generated)
                    .with_expected_output(placeholder_output(expected))
                    .with_tag(TAG_EDGE_CASE)
            }));
        }

        if options.include_negative_cases {
            let take = bucket(options.count, NEGATIVE_PERCENT);
            points.extend(negative_templates().into_iter().take(take).map(|(input, expected)| {
                DataPoint::new(self.ids.next_id("dp"), object(input), DatasetSource::Generated)
                    .with_expected_output(placeholder_output(expected))
                    .with_tag(TAG_NEGATIVE)
            }));
        }

        debug!(
            requested = options.count,
            generated = points.len(),
            "Generated test cases"
        );
        points
    }
}

impl std::fmt::Debug for TestCaseGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestCaseGenerator").finish_non_exhaustive()
    }
}
