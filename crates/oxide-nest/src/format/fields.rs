//! Field list reducer.

use std::collections::HashSet;

use serde_json::{Map, Value};

use super::Joined;
use crate::error::{NestError, Result};
use crate::response::{GeneratedField, GeneratedKind};
use crate::schema::{FieldAttribute, FieldType, Generated, Schema};
use crate::tree::FieldEntry;
use crate::validate::{field_relative_path, parse_field, validate_field, validate_label};
use crate::value::display_value;

/// Expression wrapping datetime columns on read.
const DATETIME_FORMAT: &str = "'%Y-%m-%dT%TZ'";

/// Folds one node's `fields` into local entries, handing entries that
/// address related tables to `joined` and registering generated fields.
pub(crate) struct FieldReducer<'a> {
    pub schema: &'a Schema,
    pub field_alias_path: &'a str,
    pub joined: &'a mut Joined,
    pub generated: &'a mut Vec<GeneratedField>,
}

impl FieldReducer<'_> {
    /// Reduces an array or object of field entries.
    pub fn reduce(mut self, fields: &Value) -> Result<Vec<FieldEntry>> {
        let entries = match fields {
            Value::Array(entries) => entries.clone(),
            Value::Object(_) => vec![fields.clone()],
            other => {
                return Err(NestError::InvalidRequest(format!(
                    "The field definition '{}' is invalid.",
                    display_value(other)
                )))
            }
        };

        let mut out = Vec::new();
        for entry in &entries {
            match entry {
                Value::String(key) => {
                    let field = validate_field(key)?;
                    if let Some(mapped) = self.map_field(field, None, &entries, &mut out)? {
                        out.push(mapped);
                    }
                }
                Value::Object(group) => self.reduce_object(group, &entries, &mut out)?,
                other => {
                    return Err(NestError::InvalidReference(format!(
                        "The field definition '{}' is invalid.",
                        display_value(other)
                    )))
                }
            }
        }
        Ok(out)
    }

    fn reduce_object(
        &mut self,
        group: &Map<String, Value>,
        original: &[Value],
        out: &mut Vec<FieldEntry>,
    ) -> Result<()> {
        for (key, value) in group {
            match value {
                Value::Null => {}
                Value::Array(items) => {
                    if !items.is_empty() {
                        self.joined.extend_fields(key, items.clone());
                    }
                }
                Value::Object(nested) => {
                    if !nested.is_empty() {
                        self.joined.extend_fields(key, vec![value.clone()]);
                    }
                }
                Value::String(expression) => {
                    validate_label(key)?;
                    if let Some(mapped) =
                        self.map_field(expression.clone(), Some(key.clone()), original, out)?
                    {
                        out.push(mapped);
                    }
                }
                other => {
                    return Err(NestError::InvalidReference(format!(
                        "The field definition '{}' is invalid.",
                        display_value(other)
                    )))
                }
            }
        }
        Ok(())
    }

    /// Maps one field through the schema. Returns `None` when the field was
    /// handed to a related table or became a post-query transform.
    fn map_field(
        &mut self,
        mut field: String,
        mut label: Option<String>,
        original: &[Value],
        out: &mut Vec<FieldEntry>,
    ) -> Result<Option<FieldEntry>> {
        let mut seen = HashSet::new();

        loop {
            let expr = parse_field(&field)?;

            let relative = field_relative_path(self.field_alias_path, &expr.field);
            if relative.contains('.') {
                let key = relative.split('.').next().unwrap_or_default().to_string();
                let value = match label {
                    Some(label) => {
                        let mut labelled = Map::new();
                        labelled.insert(label, Value::String(field));
                        Value::Object(labelled)
                    }
                    None => Value::String(field),
                };
                self.joined.extend_fields(&key, vec![value]);
                return Ok(None);
            }

            let attribute = self.schema.get(&expr.name);
            if attribute.is_some_and(|a| !a.readable()) {
                return Err(NestError::InvalidReference(format!(
                    "Field '{}' is not readable",
                    expr.name
                )));
            }

            match attribute {
                Some(FieldAttribute::Generated(handler)) => {
                    let mut required = Vec::new();
                    let generated = handler(&mut required);

                    let extra_fields: Vec<String> = required
                        .into_iter()
                        .filter(|name| {
                            !original.iter().any(|v| v.as_str() == Some(name.as_str()))
                                && !out.contains(&FieldEntry::Plain(name.clone()))
                        })
                        .collect();
                    out.extend(extra_fields.iter().cloned().map(FieldEntry::Plain));

                    return Ok(match generated {
                        Generated::Transform(transform) => {
                            self.generated.insert(
                                0,
                                GeneratedField {
                                    label: label.unwrap_or(expr.name),
                                    field,
                                    field_alias_path: self.field_alias_path.to_string(),
                                    kind: GeneratedKind::Handler {
                                        transform,
                                        extra_fields,
                                    },
                                },
                            );
                            None
                        }
                        Generated::Sql(expression) => Some(FieldEntry::Labelled {
                            label: label.unwrap_or(field),
                            expression,
                        }),
                    });
                }
                Some(FieldAttribute::Alias(target)) => {
                    if !seen.insert(field.clone()) {
                        return Err(NestError::InvalidSetup(format!(
                            "The alias of field '{}' refers back to itself",
                            expr.name
                        )));
                    }
                    let target = if expr.path.is_empty() {
                        target.clone()
                    } else {
                        format!("{}.{target}", expr.path)
                    };
                    label = Some(label.unwrap_or_else(|| field.clone()));
                    field = expr.rewrap(&target);
                    continue;
                }
                _ => {}
            }

            let is_labelled = label.is_some();
            let label = label.unwrap_or_else(|| field.clone());
            let field_type = attribute.and_then(FieldAttribute::field_type);

            let expression = match field_type {
                Some(FieldType::Datetime) if expr.prefix.is_empty() => {
                    format!("DATE_FORMAT({field},{DATETIME_FORMAT})")
                }
                Some(FieldType::Json) if expr.prefix.is_empty() => {
                    self.generated.push(GeneratedField {
                        label: if is_labelled {
                            label.clone()
                        } else {
                            expr.name.clone()
                        },
                        field: field.clone(),
                        field_alias_path: self.field_alias_path.to_string(),
                        kind: GeneratedKind::Json,
                    });
                    field
                }
                _ => field,
            };

            return Ok(Some(if is_labelled || label != expression {
                FieldEntry::Labelled { label, expression }
            } else {
                FieldEntry::Plain(expression)
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use serde_json::json;

    struct Reduced {
        fields: Vec<FieldEntry>,
        joined: Joined,
        generated: Vec<GeneratedField>,
    }

    fn reduce(schema: &Schema, path: &str, fields: Value) -> Result<Reduced> {
        let mut joined = Joined::default();
        let mut generated = Vec::new();
        let fields = FieldReducer {
            schema,
            field_alias_path: path,
            joined: &mut joined,
            generated: &mut generated,
        }
        .reduce(&fields)?;
        Ok(Reduced {
            fields,
            joined,
            generated,
        })
    }

    fn plain(s: &str) -> FieldEntry {
        FieldEntry::Plain(s.into())
    }

    fn labelled(label: &str, expression: &str) -> FieldEntry {
        FieldEntry::Labelled {
            label: label.into(),
            expression: expression.into(),
        }
    }

    #[test]
    fn test_plain_and_labelled() {
        let out = reduce(
            &Schema::new(),
            "",
            json!(["id", "name$1", {"total": "COUNT(id)"}]),
        )
        .unwrap();
        assert_eq!(
            out.fields,
            vec![plain("id"), plain("name"), labelled("total", "COUNT(id)")]
        );
    }

    #[test]
    fn test_nested_entries_are_extracted() {
        let out = reduce(
            &Schema::new(),
            "",
            json!(["id", "author.name", {"posts": ["title"], "empty": [], "tags": {}}]),
        )
        .unwrap();
        assert_eq!(out.fields, vec![plain("id")]);
        let keys: Vec<&str> = out.joined.keys().collect();
        assert_eq!(keys, vec!["author", "posts"]);
    }

    #[test]
    fn test_relative_fields_stay_local() {
        let out = reduce(&Schema::new(), "author.", json!([{"authorName": "author.name"}]))
            .unwrap();
        assert_eq!(out.fields, vec![labelled("authorName", "author.name")]);
    }

    #[test]
    fn test_alias_and_types() {
        let mut schema = Schema::new();
        schema.insert("email".into(), FieldAttribute::Alias("mail".into()));
        schema.insert("created".into(), FieldAttribute::Typed(FieldType::Datetime));
        schema.insert("meta".into(), FieldAttribute::Typed(FieldType::Json));
        let out = reduce(&schema, "", json!(["email", "created", "meta"])).unwrap();
        assert_eq!(
            out.fields,
            vec![
                labelled("email", "mail"),
                labelled("created", "DATE_FORMAT(created,'%Y-%m-%dT%TZ')"),
                plain("meta"),
            ]
        );
        assert_eq!(out.generated.len(), 1);
        assert_eq!(out.generated[0].label, "meta");
    }

    #[test]
    fn test_alias_cycle() {
        let mut schema = Schema::new();
        schema.insert("a".into(), FieldAttribute::Alias("b".into()));
        schema.insert("b".into(), FieldAttribute::Alias("a".into()));
        let err = reduce(&schema, "", json!(["a"])).err().unwrap();
        assert_eq!(err.code(), "INVALID_SETUP");
    }

    #[test]
    fn test_unreadable_field() {
        let mut schema = Schema::new();
        schema.insert(
            "password".into(),
            FieldAttribute::Inaccessible {
                readable: false,
                writeable: false,
            },
        );
        let err = reduce(&schema, "", json!(["password"])).err().unwrap();
        assert_eq!(err.to_string(), "Field 'password' is not readable");
    }

    #[test]
    fn test_generated_fields() {
        let mut schema = Schema::new();
        schema.insert(
            "full_name".into(),
            FieldAttribute::Generated(Arc::new(|required: &mut Vec<String>| {
                required.push("first_name".into());
                required.push("last_name".into());
                Generated::Transform(Arc::new(|_props| json!("x")))
            })),
        );
        schema.insert(
            "initial".into(),
            FieldAttribute::Generated(Arc::new(|_: &mut Vec<String>| {
                Generated::Sql("LEFT(first_name, 1)".into())
            })),
        );
        let out = reduce(&schema, "", json!(["first_name", "full_name", "initial"])).unwrap();
        assert_eq!(
            out.fields,
            vec![
                plain("first_name"),
                plain("last_name"),
                labelled("initial", "LEFT(first_name, 1)"),
            ]
        );
        match &out.generated[0].kind {
            GeneratedKind::Handler { extra_fields, .. } => {
                assert_eq!(extra_fields, &vec!["last_name".to_string()]);
            }
            GeneratedKind::Json => panic!("expected a handler"),
        }
    }

    #[test]
    fn test_invalid_definitions() {
        let schema = Schema::new();
        assert_eq!(
            reduce(&schema, "", json!("id")).err().unwrap().code(),
            "INVALID_REQUEST"
        );
        assert_eq!(
            reduce(&schema, "", json!([{"n": "name; DROP"}])).err().unwrap().code(),
            "INVALID_REFERENCE"
        );
        assert_eq!(
            reduce(&schema, "", json!([{"it's": "name"}])).err().unwrap().code(),
            "INVALID_REFERENCE"
        );
        assert_eq!(
            reduce(&schema, "", json!([5])).err().unwrap().code(),
            "INVALID_REFERENCE"
        );
    }
}
