//! Packs the fields of a one-to-many relation into one JSON-shaped column.

use super::field_format::SelectField;
use crate::error::{NestError, Result};

/// Wraps `fields` for embedding in the parent row.
///
/// Each field becomes a JSON string inside `CONCAT_WS('', '[', ..., ']')`.
/// When the fields are plain columns of the relation at `address`, rows
/// are packed with `GROUP_CONCAT` and labelled `parent[a,b]`; when any
/// field is already aggregated (or labelled outside `address`), the
/// single-row form is used and a lone field is passed through unchanged.
pub fn group_concat(fields: &[SelectField], address: &str) -> Result<SelectField> {
    if fields.is_empty() {
        return Err(NestError::InvalidRequest(format!(
            "Missing fields for '{}'",
            address.trim_end_matches('.')
        )));
    }

    let label_of = |field: &SelectField| field.label.clone().unwrap_or_default();
    let agg = fields
        .iter()
        .any(|f| f.agg || !label_of(f).starts_with(address));
    let labels = fields.iter().map(label_of).collect::<Vec<_>>().join(",");

    if agg && fields.len() == 1 {
        return Ok(SelectField {
            expression: fields[0].expression.clone(),
            label: Some(labels),
            ..SelectField::default()
        });
    }

    let wrapped = fields
        .iter()
        .map(|f| {
            format!(
                r#"'"', REPLACE(REPLACE({}, '\\', '\\\\'), '"', '\\"'), '"'"#,
                f.expression
            )
        })
        .collect::<Vec<_>>()
        .join(", ',', ");
    let expression = format!("CONCAT_WS('', '[', {wrapped}, ']')");

    if agg {
        return Ok(SelectField {
            expression,
            label: Some(labels),
            ..SelectField::default()
        });
    }

    let parent = &address[..address.rfind('.').unwrap_or(address.len())];
    let keys = fields
        .iter()
        .map(|f| label_of(f)[address.len()..].to_string())
        .collect::<Vec<_>>()
        .join(",");

    Ok(SelectField {
        expression: format!("CONCAT('[', GROUP_CONCAT({expression}), ']')"),
        label: Some(format!("{parent}[{keys}]")),
        ..SelectField::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(expression: &str, label: &str, agg: bool) -> SelectField {
        SelectField {
            expression: expression.into(),
            label: Some(label.into()),
            agg,
            ..SelectField::default()
        }
    }

    #[test]
    fn test_many_rows() {
        let gc = group_concat(
            &[field("b.id", "posts.id", false), field("b.title", "posts.title", false)],
            "posts.",
        )
        .unwrap();
        assert_eq!(gc.label.as_deref(), Some("posts[id,title]"));
        assert_eq!(
            gc.expression,
            r#"CONCAT('[', GROUP_CONCAT(CONCAT_WS('', '[', '"', REPLACE(REPLACE(b.id, '\\', '\\\\'), '"', '\\"'), '"', ',', '"', REPLACE(REPLACE(b.title, '\\', '\\\\'), '"', '\\"'), '"', ']')), ']')"#
        );
    }

    #[test]
    fn test_aggregates() {
        let gc = group_concat(&[field("COUNT(b.id)", "posts.count", true)], "posts.").unwrap();
        assert_eq!(gc.expression, "COUNT(b.id)");
        assert_eq!(gc.label.as_deref(), Some("posts.count"));

        let gc = group_concat(
            &[field("COUNT(b.id)", "posts.count", true), field("MAX(b.id)", "posts.last", true)],
            "posts.",
        )
        .unwrap();
        assert!(gc.expression.starts_with("CONCAT_WS('', '['"));
        assert_eq!(gc.label.as_deref(), Some("posts.count,posts.last"));
    }

    #[test]
    fn test_empty_is_rejected() {
        assert_eq!(group_concat(&[], "posts.").unwrap_err().code(), "INVALID_REQUEST");
    }
}
