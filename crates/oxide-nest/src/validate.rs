//! Identifier validation and small path helpers shared by the normalizer.

use std::sync::LazyLock;

use oxide_nest_core::FieldExpr;
use regex::Regex;

use crate::error::{NestError, Result};

static FIELD_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[a-z_]+$").expect("valid regex"));
static ALIAS_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[a-z0-9_]+$").expect("valid regex"));
static LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^[^'"?`]+$"#).expect("valid regex"));

/// Validates a field key such as `name` or `author.name` and strips any
/// `$suffix` from the last segment.
///
/// # Errors
///
/// Returns `InvalidReference` when the field name or its table path is
/// malformed.
pub fn validate_field(key: &str) -> Result<String> {
    let (path, field) = match key.rfind('.') {
        Some(i) => (Some(&key[..i]), &key[i + 1..]),
        None => (None, key),
    };
    let field = field.split('$').next().unwrap_or_default();

    if !FIELD_NAME.is_match(field) {
        return Err(NestError::InvalidReference(format!(
            "The key '{key}' must match /^[a-z_]+$/i"
        )));
    }

    match path {
        Some(path) => {
            validate_alias(path)?;
            Ok(format!("{path}.{field}"))
        }
        None => Ok(field.to_string()),
    }
}

/// Validates a table reference such as `author` or `author$2`.
///
/// # Errors
///
/// Returns `InvalidReference` when the reference is malformed.
pub fn validate_alias(key: &str) -> Result<()> {
    let mut parts = key.split('$');
    let name = parts.next().unwrap_or_default();
    let label = parts.next().unwrap_or_default();

    if !FIELD_NAME.is_match(name) || (!label.is_empty() && !ALIAS_LABEL.is_match(label)) {
        return Err(NestError::InvalidReference(format!(
            "The table reference '{key}' must match [a-z_]+($[a-z0-9_]+)"
        )));
    }
    Ok(())
}

/// Validates a field label.
///
/// # Errors
///
/// Returns `InvalidReference` when the label is empty or contains a quote,
/// backtick or `?`.
pub fn validate_label(label: &str) -> Result<()> {
    if LABEL.is_match(label) {
        Ok(())
    } else {
        Err(NestError::InvalidReference(format!(
            "The label '{label}' must match /^[^'\"?`]+$/i"
        )))
    }
}

/// Parses a field expression, reporting failures as `InvalidReference`.
///
/// # Errors
///
/// Returns `InvalidReference` when the expression is invalid.
pub fn parse_field(expression: &str) -> Result<FieldExpr> {
    FieldExpr::parse(expression).map_err(|e| {
        tracing::trace!(expression, error = %e, "rejected field expression");
        NestError::InvalidReference(format!("The field definition '{expression}' is invalid."))
    })
}

/// Resolves a request key to a model name: strips a leading `-` and any
/// `$suffix`.
#[must_use]
pub fn table_alias_handler(name: &str) -> &str {
    let name = name.strip_prefix('-').unwrap_or(name);
    name.split('$').next().unwrap_or_default()
}

/// Returns the part of `address` that lies below `current_path`.
///
/// `current_path` is the dotted address of the node being normalized, e.g.
/// `post.author.`. Leading segments of `address` that repeat the tail of
/// `current_path` are removed, so `author.name` seen from `post.author.`
/// yields `name`.
#[must_use]
pub fn field_relative_path<'a>(current_path: &str, address: &'a str) -> &'a str {
    let mut path = address;
    while !path.is_empty() && !current_path.ends_with(path) {
        let search_end = path.len().saturating_sub(1);
        match path[..search_end].rfind('.') {
            Some(i) if i > 0 => path = &path[..=i],
            _ => {
                path = "";
                break;
            }
        }
    }
    &address[path.len()..]
}
