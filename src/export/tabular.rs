//! Flat CSV rendering
//!
//! The first row's keys fix the header for the whole table. Later rows are
//! rendered against that header; keys they lack become empty cells and
//! keys the header lacks are dropped. Quoting follows RFC 4180: fields with
//! a delimiter, quote or line break are quoted and inner quotes doubled.

use csv::{QuoteStyle, WriterBuilder};
use serde_json::{Map, Value};

use crate::errors::{AnalyserError, Result};

/// One flat record, keys in insertion order
pub type Row = Map<String, Value>;

/// Render rows as CSV text; `Ok(None)` when there are no rows
///
/// Lines are separated by `\n` with no trailing terminator.
pub fn render_csv(rows: &[Row]) -> Result<Option<String>> {
    let Some(first) = rows.first() else {
        return Ok(None);
    };
    let headers: Vec<&str> = first.keys().map(String::as_str).collect();

    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .from_writer(Vec::new());

    writer.write_record(&headers)?;
    for row in rows {
        writer.write_record(
            headers
                .iter()
                .map(|h| row.get(*h).map(render_cell).unwrap_or_default()),
        )?;
    }

    writer.flush()?;
    let bytes = writer
        .into_inner()
        .map_err(|e| AnalyserError::IoError(e.into_error()))?;
    let text = String::from_utf8(bytes)
        .map_err(|e| AnalyserError::Generic(format!("CSV output is not UTF-8: {}", e)))?;

    Ok(Some(text.strip_suffix('\n').unwrap_or(&text).to_string()))
}

/// Scalars written raw, null left empty, nested values as compact JSON
fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        nested @ (Value::Array(_) | Value::Object(_)) => nested.to_string(),
    }
}
