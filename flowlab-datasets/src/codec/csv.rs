//! CSV import/export with RFC 4180 quoting.

use super::{into_record, parse_cell_value, ImportResult};
use crate::identifier::IdGenerator;
use crate::model::{DataPoint, Dataset, DatasetSource};
use tracing::{debug, warn};

/// Canonical export header.
pub const CSV_HEADER: [&str; 4] = ["input", "expected_output", "expected_trajectory", "context"];

#[derive(Debug, Default)]
struct Columns {
    input: usize,
    expected_output: Option<usize>,
    expected_trajectory: Option<usize>,
    context: Option<usize>,
}

impl Columns {
    fn from_header(header: &[String], warnings: &mut Vec<String>) -> Option<Self> {
        let mut input = None;
        let mut columns = Columns::default();
        let mut ignored = Vec::new();

        for (idx, raw) in header.iter().enumerate() {
            let name = raw.trim().to_lowercase();
            match name.as_str() {
                "input" => input = input.or(Some(idx)),
                "expected_output" | "expectedoutput" => {
                    columns.expected_output = columns.expected_output.or(Some(idx))
                }
                "expected_trajectory" | "trajectory" => {
                    columns.expected_trajectory = columns.expected_trajectory.or(Some(idx))
                }
                "context" => columns.context = columns.context.or(Some(idx)),
                _ => ignored.push(raw.trim().to_string()),
            }
        }

        if !ignored.is_empty() {
            warnings.push(format!("Ignoring unrecognized columns: {}", ignored.join(", ")));
        }

        columns.input = input?;
        Some(columns)
    }
}

/// Split CSV text into records of fields.
///
/// Fields may be wrapped in double quotes; `""` inside a quoted field is a
/// literal quote, and quoted fields may span lines. Blank lines are dropped.
pub fn split_records(content: &str) -> Vec<Vec<String>> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                push_record(&mut records, std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }

    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        push_record(&mut records, record);
    }

    records
}

fn push_record(records: &mut Vec<Vec<String>>, record: Vec<String>) {
    if record.iter().any(|f| !f.trim().is_empty()) {
        records.push(record);
    }
}

fn cell<'a>(fields: &'a [String], idx: Option<usize>) -> Option<&'a str> {
    idx.and_then(|i| fields.get(i))
        .map(String::as_str)
        .filter(|s| !s.trim().is_empty())
}

fn parse_row(
    row: usize,
    fields: &[String],
    columns: &Columns,
    ids: &dyn IdGenerator,
) -> Result<DataPoint, String> {
    let input_text = cell(fields, Some(columns.input))
        .ok_or_else(|| format!("Row {}: missing input", row))?;
    let input = into_record(parse_cell_value(input_text));
    if input.is_empty() {
        return Err(format!("Row {}: input is empty", row));
    }

    let mut point = DataPoint::new(ids.next_id("dp"), input, DatasetSource::Import);

    if let Some(text) = cell(fields, columns.expected_output) {
        point.expected_output = Some(into_record(parse_cell_value(text)));
    }

    if let Some(text) = cell(fields, columns.expected_trajectory) {
        point = point.with_expected_trajectory(text.split(','));
    }

    if let Some(text) = cell(fields, columns.context) {
        point = point.with_context(text);
    }

    Ok(point)
}

/// Parse CSV content into data points.
///
/// Fails as a whole only when there is no data row or no `input` column;
/// otherwise every row is parsed independently.
pub fn parse_csv(content: &str, ids: &dyn IdGenerator) -> ImportResult {
    let records = split_records(content);
    if records.len() < 2 {
        return ImportResult::fatal("CSV must contain a header row and at least one data row");
    }

    let mut result = ImportResult::default();
    let Some(columns) = Columns::from_header(&records[0], &mut result.warnings) else {
        return ImportResult::fatal("CSV must have an 'input' column");
    };

    let width = records[0].len();
    for (idx, fields) in records[1..].iter().enumerate() {
        let row = idx + 1;
        if fields.len() != width {
            result.warnings.push(format!(
                "Row {}: expected {} columns, found {}",
                row,
                width,
                fields.len()
            ));
        }

        match parse_row(row, fields, &columns, ids) {
            Ok(point) => result.data_points.push(point),
            Err(e) => {
                warn!(row, error = %e, "Skipping CSV row");
                result.errors.push(e);
            }
        }
    }

    debug!(
        rows = records.len() - 1,
        imported = result.data_points.len(),
        errors = result.errors.len(),
        "Parsed CSV import"
    );
    result.finish()
}

/// Quote a field, doubling embedded quotes.
pub fn quote_field(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Export a dataset with the canonical columns.
pub fn export_to_csv(dataset: &Dataset) -> String {
    let mut out = CSV_HEADER.join(",");
    out.push('\n');

    for point in &dataset.data_points {
        let point = point.clone().normalized();
        let input = serde_json::Value::Object(point.input.clone()).to_string();
        let expected = point
            .expected_output
            .as_ref()
            .map(|o| serde_json::Value::Object(o.clone()).to_string())
            .unwrap_or_default();
        let trajectory = point
            .expected_trajectory
            .as_ref()
            .map(|t| t.join(","))
            .unwrap_or_default();
        let context = point.context.as_deref().unwrap_or_default();

        let row = [
            quote_field(&input),
            quote_field(&expected),
            quote_field(&trajectory),
            quote_field(context),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::SequentialIdGenerator;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::{json, Value};

    fn parse(content: &str) -> ImportResult {
        parse_csv(content, &SequentialIdGenerator::new())
    }

    #[test]
    fn test_split_quoted_fields() {
        let records = split_records("a,\"b,c\",\"say \"\"hi\"\"\"\n1,2,3\n");
        assert_eq!(
            records,
            vec![
                vec!["a".to_string(), "b,c".to_string(), "say \"hi\"".to_string()],
                vec!["1".to_string(), "2".to_string(), "3".to_string()],
            ]
        );
    }

    #[test]
    fn test_split_multiline_and_crlf() {
        let records = split_records("input,context\r\n\"x\",\"line1\nline2\"\r\n\r\n");
        assert_eq!(records.len(), 2);
        assert_eq!(records[1][1], "line1\nline2");
    }

    #[rstest]
    #[case("")]
    #[case("input,context\n")]
    fn test_too_few_lines(#[case] content: &str) {
        let result = parse(content);
        assert!(!result.success);
        assert!(result.data_points.is_empty());
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn test_missing_input_column() {
        let result = parse("query,context\nhello,world\n");
        assert!(!result.success);
        assert!(result.errors[0].contains("'input'"));
    }

    #[test]
    fn test_header_aliases_case_insensitive() {
        let result = parse(
            "Input,ExpectedOutput,Trajectory,CONTEXT\n\"{\"\"q\"\":1}\",done,\"t1, llm1\",ctx\n",
        );
        assert!(result.success);
        let point = &result.data_points[0];
        assert_eq!(Value::Object(point.input.clone()), json!({"q": 1}));
        assert_eq!(
            point.expected_output.clone().map(Value::Object),
            Some(json!({"value": "done"}))
        );
        assert_eq!(
            point.expected_trajectory,
            Some(vec!["t1".to_string(), "llm1".to_string()])
        );
        assert_eq!(point.context.as_deref(), Some("ctx"));
    }

    #[test]
    fn test_row_errors_do_not_abort() {
        let result = parse("input,context\n,orphan\nhello,\n\"{}\",x\n");
        assert!(result.success);
        assert_eq!(result.data_points.len(), 1);
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors[0].starts_with("Row 1"));
    }

    #[test]
    fn test_unknown_columns_warn() {
        let result = parse("input,notes\nhello,whatever\n");
        assert!(result.success);
        assert!(result.warnings[0].contains("notes"));
    }

    #[test]
    fn test_blank_cells_are_absent() {
        let result = parse(concat!(
            "input,expected_trajectory,context\n",
            "hello,\" , ,\",\"\"\n",
            "hi,\" a ,b\",\"\"\"\"\n",
        ));
        assert_eq!(result.data_points.len(), 2);
        assert_eq!(result.data_points[0].expected_trajectory, None);
        assert_eq!(result.data_points[0].context, None);
        assert_eq!(
            result.data_points[1].expected_trajectory,
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(result.data_points[1].context.as_deref(), Some("\""));
    }

    #[test]
    fn test_export_quotes_every_field() {
        let input = json!({"q": "a \"b\""}).as_object().cloned().unwrap_or_default();
        let ds = Dataset::new("ds_1", "x", None, DatasetSource::Manual).with_data_points([
            DataPoint::new("dp_1", input, DatasetSource::Manual).with_context("c, d"),
        ]);
        let csv = export_to_csv(&ds);
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines[0], "input,expected_output,expected_trajectory,context");
        assert_eq!(lines[1], r#""{""q"":""a \""b\""""}","","","c, d""#);
    }
}
