//! `groupby` reducer.

use serde_json::Value;

use super::{to_list, Joined};
use crate::error::Result;
use crate::validate::{field_relative_path, parse_field};

/// Keeps entries addressing this node and hands the rest to `joined`.
pub(crate) fn reduce_groupby(
    groupby: &Value,
    current_path: &str,
    joined: &mut Joined,
) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for entry in to_list(groupby)? {
        let expr = parse_field(&entry)?;
        let relative = field_relative_path(current_path, &expr.field);
        let segments: Vec<&str> = relative.split('.').filter(|s| !s.is_empty()).collect();

        match segments.split_first() {
            Some((key, rest)) if !rest.is_empty() => {
                joined.extend_groupby(key, vec![Value::String(expr.rewrap(&rest.join(".")))]);
            }
            _ => out.push(entry),
        }
    }
    Ok(out)
}
