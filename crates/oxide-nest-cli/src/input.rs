//! Reading JSON arguments and files.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use oxide_nest::{NestOptions, Request, Row};
use serde_json::Value;

/// Parses an inline JSON argument, or the file it names when prefixed
/// with `@`.
pub fn json_argument(argument: &str) -> Result<Value> {
    match argument.strip_prefix('@') {
        Some(path) => json_file(Path::new(path)),
        None => serde_json::from_str(argument).context("Argument is not valid JSON"),
    }
}

/// Parses a JSON file.
pub fn json_file(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", path.display()))
}

/// Loads options from a config file, or defaults without one.
pub fn load_options(path: Option<&Path>) -> Result<NestOptions> {
    let Some(path) = path else {
        return Ok(NestOptions::default());
    };
    let options = serde_json::from_value(json_file(path)?)
        .with_context(|| format!("{} is not a valid configuration", path.display()))?;
    Ok(options)
}

/// Parses a request argument.
pub fn request(argument: &str) -> Result<Request> {
    serde_json::from_value(json_argument(argument)?).context("Invalid request")
}

/// Parses canned result rows: an array of objects.
pub fn rows(argument: &str) -> Result<Vec<Row>> {
    let Value::Array(items) = json_argument(argument)? else {
        anyhow::bail!("Rows must be a JSON array of objects");
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::Object(row) => Ok(row),
            other => anyhow::bail!("Row {other} is not an object"),
        })
        .collect()
}
