//! Serialization of projected records into the two wire formats: one
//! tab-separated line per record, or one JSON object per line.

use serde::Serialize;
use serde_json::{Value, json};
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

use crate::fault::ErrorRecord;

/// Timestamp wire format, e.g. `2019-05-29 18:51:00`.
const DATE_FORMAT: &[BorrowedFormatItem<'_>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

pub(crate) fn format_timestamp(timestamp: OffsetDateTime) -> String {
    timestamp.format(DATE_FORMAT).unwrap_or_default()
}

/// Output representation of a finished record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordFormat {
    #[default]
    Delimited,
    Json,
}

fn json_string<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

/// Scalar text form of a field value: strings verbatim, numbers as written,
/// null empty, structured values inline-JSON-encoded.
fn scalar(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        structured => json_string(structured),
    }
}

/// Newlines are flattened to spaces to preserve one-record-per-line
/// framing. Embedded literal tabs are left alone: escaping them would
/// change the wire format byte-for-byte, so the ambiguity is documented
/// rather than fixed.
fn flatten(text: String) -> String {
    if text.contains(['\n', '\r']) {
        text.replace(['\n', '\r'], " ")
    } else {
        text
    }
}

pub(crate) fn error_value(record: &ErrorRecord) -> Value {
    json!({
        "error_type": record.category.as_str(),
        "log_level": record.severity.rank(),
        "error_code": record.code,
        "description": record.message,
        "file": record.file,
        "line": record.line,
    })
}

/// Render a projected field set as one tab-separated line, fields in filter
/// order. Accumulated errors, if any, are appended as a single trailing
/// JSON-encoded element.
pub fn to_delimited(fields: &[(&'static str, Value)], errors: &[ErrorRecord]) -> String {
    let mut parts: Vec<String> = fields
        .iter()
        .map(|(_, value)| flatten(scalar(value)))
        .collect();
    if !errors.is_empty() {
        let rendered: Vec<Value> = errors.iter().map(error_value).collect();
        parts.push(flatten(json_string(&rendered)));
    }
    parts.join("\t")
}

/// Render a projected field set as one JSON object, key order preserved.
/// Accumulated errors, if any, land under an `errors` key.
pub fn to_json(fields: &[(&'static str, Value)], errors: &[ErrorRecord]) -> String {
    let mut out = String::from("{");
    for (name, value) in fields {
        if out.len() > 1 {
            out.push(',');
        }
        out.push_str(&json_string(name));
        out.push(':');
        out.push_str(&json_string(value));
    }
    if !errors.is_empty() {
        if out.len() > 1 {
            out.push(',');
        }
        let rendered: Vec<Value> = errors.iter().map(error_value).collect();
        out.push_str("\"errors\":");
        out.push_str(&json_string(&rendered));
    }
    out.push('}');
    out
}

/// Render one error as its own delimited line, prefixed with the capture
/// timestamp. Used in errors-only mode.
pub fn error_line(record: &ErrorRecord) -> String {
    flatten(format!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}",
        format_timestamp(record.timestamp),
        record.category.as_str(),
        record.severity.rank(),
        record.code,
        record.message,
        record.file,
        record.line,
    ))
}
