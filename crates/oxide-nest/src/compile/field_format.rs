//! Qualifies a normalized field expression with its table alias.

use oxide_nest_core::Direction;

use crate::error::Result;
use crate::validate::parse_field;

/// A field, group or order expression ready for the statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectField {
    /// SQL expression, e.g. `COUNT(b.id)`.
    pub expression: String,
    /// Output label. `None` leaves the column named by the database.
    pub label: Option<String>,
    /// The expression calls an aggregate function.
    pub agg: bool,
    /// The expression as normalized, before qualification.
    pub original: String,
    /// Sort direction, for ORDER BY entries.
    pub direction: Option<Direction>,
}

/// Qualifies `original` with `table_alias` and prefixes its label with the
/// node's address, minus any part the expression already names.
pub fn field_format(
    original: &str,
    label: Option<&str>,
    table_alias: &str,
    label_prefix: &str,
) -> Result<SelectField> {
    let expr = parse_field(original)?;

    let label = if label_prefix.is_empty() {
        label.filter(|l| !l.is_empty()).map(String::from)
    } else {
        let prefix = if expr.path.is_empty() {
            label_prefix
        } else {
            label_prefix
                .rfind(expr.path.as_str())
                .map_or(label_prefix, |i| &label_prefix[..i])
        };
        Some(format!("{prefix}{}", label.unwrap_or(&expr.name)))
    };

    let expression = if expr.field.is_empty() {
        format!("{}{}", expr.prefix, expr.suffix)
    } else {
        format!("{}{table_alias}.{}{}", expr.prefix, expr.name, expr.suffix)
    };

    Ok(SelectField {
        expression,
        label,
        agg: expr.is_aggregate(),
        original: original.to_string(),
        direction: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_fields_have_no_label() {
        let field = field_format("name", None, "a", "").unwrap();
        assert_eq!(field.expression, "a.name");
        assert_eq!(field.label, None);
        assert!(!field.agg);
    }

    #[test]
    fn test_nested_labels() {
        let field = field_format("name", None, "b", "author.").unwrap();
        assert_eq!(field.label.as_deref(), Some("author.name"));

        let field = field_format("author.name", Some("authorName"), "b", "author.").unwrap();
        assert_eq!(field.expression, "b.name");
        assert_eq!(field.label.as_deref(), Some("authorName"));

        let field = field_format("COUNT(DISTINCT id)", Some("total"), "c", "post.comments.").unwrap();
        assert_eq!(field.expression, "COUNT(DISTINCT c.id)");
        assert_eq!(field.label.as_deref(), Some("post.comments.total"));
        assert!(field.agg);
    }

    #[test]
    fn test_empty_field() {
        let field = field_format("COUNT()", Some("n"), "a", "").unwrap();
        assert_eq!(field.expression, "COUNT()");
    }
}
