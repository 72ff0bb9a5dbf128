//! `orderby` reducer.

use oxide_nest_core::split_direction;
use serde_json::Value;

use super::{to_list, Joined};
use crate::error::Result;
use crate::schema::{FieldAttribute, Schema};
use crate::validate::{field_relative_path, parse_field};

/// Keeps entries addressing this node, with schema aliases applied, and
/// hands the rest to `joined`. Directions stay attached to each entry.
pub(crate) fn reduce_orderby(
    orderby: &Value,
    current_path: &str,
    schema: &Schema,
    joined: &mut Joined,
) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for entry in to_list(orderby)? {
        let (field, direction) = split_direction(&entry);
        let expr = parse_field(field)?;
        let relative = field_relative_path(current_path, &expr.field);
        let segments: Vec<&str> = relative.split('.').filter(|s| !s.is_empty()).collect();

        let (key, target) = match segments.split_first() {
            Some((key, rest)) if !rest.is_empty() => (Some(*key), rest.join(".")),
            _ => {
                let target = schema
                    .get(&expr.name)
                    .and_then(FieldAttribute::alias)
                    .map_or_else(|| expr.field.clone(), String::from);
                (None, target)
            }
        };

        let mut rewritten = expr.rewrap(&target);
        if let Some(direction) = direction {
            rewritten = format!("{rewritten} {direction}");
        }

        match key {
            Some(key) => joined.extend_orderby(key, vec![Value::String(rewritten)]),
            None => out.push(rewritten),
        }
    }
    Ok(out)
}
