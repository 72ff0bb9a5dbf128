//! Rebuilds nested objects from flat result rows.
//!
//! Column labels encode where each value belongs:
//!
//! - `name`: a plain key.
//! - `author.name`: a nested object.
//! - `author.id,author.name`: a JSON array spread over several keys.
//! - `comments[id,text]`: a JSON array of arrays, one per related row,
//!   zipped with the bracketed keys into a list of objects.

mod generated;
mod json;

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

pub use generated::{GeneratedField, GeneratedKind};
pub use json::parse_json;

use crate::executor::Row;
use crate::options::RowHandler;
use crate::value::is_truthy;
use json::decode;

static LIST_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^([a-z0-9.$\s_-]*)\[(.*)\]$").expect("valid regex")
});

/// Reconstructs every row, then applies generated fields and the optional
/// row handler, which may drop rows.
#[must_use]
pub fn reconstruct(
    rows: Vec<Row>,
    generated: &[GeneratedField],
    row_handler: Option<&RowHandler>,
) -> Vec<Value> {
    rows.into_iter()
        .enumerate()
        .filter_map(|(index, row)| {
            let mut item = format_row(row);
            for field in generated {
                field.apply(&mut item);
            }
            match row_handler {
                Some(handler) => handler(Value::Object(item), index),
                None => Some(Value::Object(item)),
            }
        })
        .collect()
}

fn format_row(row: Row) -> Map<String, Value> {
    let mut item = Map::new();

    for (label, value) in row {
        if !label.contains('[') {
            if label.contains(',') {
                if let Some(Value::Array(values)) = decode(&value) {
                    for (key, value) in label.split(',').zip(values) {
                        explode(&mut item, key, value);
                    }
                }
            } else {
                explode(&mut item, &label, value);
            }
            continue;
        }

        let Some(captures) = LIST_LABEL.captures(&label) else {
            tracing::warn!(%label, "cannot interpret result column label");
            item.insert(label, value);
            continue;
        };
        if !is_truthy(&value) {
            continue;
        }

        let keys = split_keys(&captures[2]);
        let mut list = Vec::new();
        if let Some(Value::Array(entries)) = decode(&value) {
            for entry in entries {
                let Value::Array(values) = entry else {
                    continue;
                };
                if values
                    .iter()
                    .all(|v| v.is_null() || v.as_str() == Some(""))
                {
                    continue;
                }
                let nested: Row = keys
                    .iter()
                    .map(|key| (*key).to_string())
                    .zip(values)
                    .collect();
                list.push(Value::Object(format_row(nested)));
            }
        }
        explode(&mut item, &captures[1], Value::Array(list));
    }

    item
}

/// Inserts `value` at the dotted `path`, creating objects along the way.
fn explode(item: &mut Map<String, Value>, path: &str, value: Value) {
    let mut target = item;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            target.insert(segment.to_string(), value);
            return;
        }
        let slot = target
            .entry(segment)
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        let Value::Object(next) = slot else {
            return;
        };
        target = next;
    }
}

/// Splits `a,b[c,d],e` on top-level commas.
fn split_keys(keys: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in keys.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&keys[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&keys[start..]);
    parts
}
