//! CSV and JSON import/export.
//!
//! Both codecs use the canonical columns `input`, `expected_output`,
//! `expected_trajectory` and `context`. Exported canonical data re-imports
//! to the same values; arbitrary third-party files are best effort.

pub mod csv;
pub mod json;

pub use self::csv::{export_to_csv, parse_csv};
pub use self::json::{export_to_json, parse_json};

use crate::identifier::IdGenerator;
use crate::model::{DataPoint, Record};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of an import.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    /// True when at least one data point was produced.
    pub success: bool,
    /// Parsed data points.
    pub data_points: Vec<DataPoint>,
    /// Per-row (or fatal) failures.
    pub errors: Vec<String>,
    /// Non-blocking observations.
    pub warnings: Vec<String>,
}

impl ImportResult {
    /// A structural failure: no data points at all.
    pub fn fatal(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data_points: Vec::new(),
            errors: vec![error.into()],
            warnings: Vec::new(),
        }
    }

    pub(crate) fn finish(mut self) -> Self {
        self.success = !self.data_points.is_empty();
        self
    }
}

/// Supported import formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportFormat {
    /// Comma-separated values with a header row.
    Csv,
    /// JSON array or wrapper object.
    Json,
}

impl ImportFormat {
    /// Guess the format from a file name.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let ext = name.rsplit_once('.')?.1.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// Parse `content` in this format.
    pub fn parse(self, content: &str, ids: &dyn IdGenerator) -> ImportResult {
        match self {
            Self::Csv => parse_csv(content, ids),
            Self::Json => parse_json(content, ids),
        }
    }
}

/// Interpret text as JSON when it is fully bracket- or brace-delimited and
/// parses; otherwise keep it as a string.
pub(crate) fn parse_cell_value(text: &str) -> Value {
    let trimmed = text.trim();
    let delimited = (trimmed.starts_with('{') && trimmed.ends_with('}'))
        || (trimmed.starts_with('[') && trimmed.ends_with(']'));

    if delimited {
        if let Ok(value) = serde_json::from_str(trimmed) {
            return value;
        }
    }
    Value::String(trimmed.to_string())
}

/// Objects pass through; anything else becomes `{"value": ...}`.
pub(crate) fn into_record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => {
            let mut map = Record::new();
            map.insert("value".to_string(), other);
            map
        }
    }
}

/// Strings verbatim, everything else as compact JSON.
pub(crate) fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
