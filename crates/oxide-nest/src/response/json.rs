//! Tolerant JSON decoding of concatenated column values.

use serde_json::Value;

/// Parses JSON produced by `CONCAT`/`GROUP_CONCAT`, escaping raw control
/// characters first. Malformed input yields `None`.
#[must_use]
pub fn parse_json(text: &str) -> Option<Value> {
    let escaped = text
        .replace('\t', "\\t")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\u{c}', "\\f");
    serde_json::from_str(&escaped).ok()
}

/// Decodes a column value that should hold JSON text. Values a driver has
/// already decoded are passed through.
pub(crate) fn decode(value: &Value) -> Option<Value> {
    match value {
        Value::String(text) => parse_json(text),
        Value::Array(_) | Value::Object(_) => Some(value.clone()),
        _ => None,
    }
}
