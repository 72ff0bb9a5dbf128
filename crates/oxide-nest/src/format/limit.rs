//! `limit` and `start` validation.

use serde_json::Value;

use crate::error::{NestError, Result};
use crate::value::display_value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Limits {
    pub limit: u64,
    pub start: u64,
    /// No limit was given: the caller expects one object.
    pub single: bool,
}

fn as_integer(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Validates the limit against `max_limit` and the start offset.
pub(crate) fn limit_clause(
    limit: Option<&Value>,
    start: Option<&Value>,
    max_limit: Option<u64>,
) -> Result<Limits> {
    let (limit, single) = match limit {
        None => (1, true),
        Some(value) => {
            let limit = as_integer(value)
                .filter(|n| *n >= 1 && max_limit.is_none_or(|max| *n <= max))
                .ok_or_else(|| {
                    NestError::InvalidLimit(format!(
                        "Out of bounds limit value: '{}'",
                        display_value(value)
                    ))
                })?;
            (limit, false)
        }
    };

    let start = match start {
        None => 0,
        Some(value) => as_integer(value).ok_or_else(|| {
            NestError::InvalidStart(format!(
                "Out of bounds start value: '{}'",
                display_value(value)
            ))
        })?,
    };

    Ok(Limits {
        limit,
        start,
        single,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_is_single() {
        assert_eq!(
            limit_clause(None, None, Some(10)).unwrap(),
            Limits {
                limit: 1,
                start: 0,
                single: true
            }
        );
    }

    #[test]
    fn test_explicit_limit() {
        let limits = limit_clause(Some(&json!("5")), Some(&json!(10)), Some(10)).unwrap();
        assert_eq!((limits.limit, limits.start, limits.single), (5, 10, false));
    }

    #[test]
    fn test_out_of_bounds() {
        for bad in [json!(0), json!(-1), json!(11), json!(2.5), json!("ten")] {
            let err = limit_clause(Some(&bad), None, Some(10)).unwrap_err();
            assert_eq!(err.code(), "INVALID_LIMIT");
        }
        let err = limit_clause(Some(&json!(1)), Some(&json!(-3)), None).unwrap_err();
        assert_eq!(err.to_string(), "Out of bounds start value: '-3'");
        assert!(limit_clause(Some(&json!(1_000_000)), None, None).is_ok());
    }
}
