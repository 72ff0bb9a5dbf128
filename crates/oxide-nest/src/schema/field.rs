//! Field attributes: the resolved meaning of one schema entry.

use std::fmt;
use std::sync::Arc;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::error::{NestError, Result};

/// Post-query computation of a generated field. Receives a snapshot of the
/// owning object's own fields.
pub type Transform = Arc<dyn Fn(&Map<String, Value>) -> Value + Send + Sync>;

/// Handler behind a generated field. It may push the names of columns it
/// depends on into the vector it is given.
pub type GeneratedHandler = Arc<dyn Fn(&mut Vec<String>) -> Generated + Send + Sync>;

/// What a generated field handler produces.
#[derive(Clone)]
pub enum Generated {
    /// A SQL field expression selected in place of the field.
    Sql(String),
    /// A computation applied to each reconstructed object.
    Transform(Transform),
}

impl fmt::Debug for Generated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sql(sql) => f.debug_tuple("Sql").field(sql).finish(),
            Self::Transform(_) => f.write_str("Transform(..)"),
        }
    }
}

/// Column types that change how a field is read or written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Read as an ISO-8601 string, filter values normalized.
    Datetime,
    /// Stored as JSON text, parsed on read.
    Json,
}

/// The single classification of a schema field.
#[derive(Clone, Default)]
pub enum FieldAttribute {
    /// An ordinary column.
    #[default]
    Plain,
    /// Another name for a field, possibly in another table (`author.name`).
    Alias(String),
    /// Column referencing `table.column` targets, used to infer joins.
    References(Vec<String>),
    /// A field computed by a handler.
    Generated(GeneratedHandler),
    /// A typed column.
    Typed(FieldType),
    /// A column hidden from reads and/or writes.
    Inaccessible {
        /// Whether the field may be selected.
        readable: bool,
        /// Whether the field may be written.
        writeable: bool,
    },
}

impl FieldAttribute {
    /// Builds an attribute from a raw JSON schema entry.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSetup` for entries that are not a recognised shape, or
    /// descriptors that name more than one classification.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null | Value::Bool(true) => Ok(Self::Plain),
            Value::Bool(false) => Ok(Self::Inaccessible {
                readable: false,
                writeable: false,
            }),
            Value::String(alias) => Ok(Self::Alias(alias.clone())),
            Value::Array(refs) => references(refs).map(Self::References),
            Value::Object(descriptor) => Self::from_descriptor(descriptor),
            Value::Number(_) => Err(NestError::InvalidSetup(format!(
                "Invalid field descriptor '{value}'"
            ))),
        }
    }

    fn from_descriptor(descriptor: &Map<String, Value>) -> Result<Self> {
        let mut found = Vec::new();

        if let Some(kind) = descriptor.get("type") {
            found.push(match kind.as_str() {
                Some("datetime") => Self::Typed(FieldType::Datetime),
                Some("json") => Self::Typed(FieldType::Json),
                _ => {
                    return Err(NestError::InvalidSetup(format!(
                        "Unknown field type '{kind}'"
                    )))
                }
            });
        }
        if let Some(alias) = descriptor.get("alias") {
            let alias = alias
                .as_str()
                .ok_or_else(|| NestError::InvalidSetup(format!("Invalid alias '{alias}'")))?;
            found.push(Self::Alias(alias.to_string()));
        }
        if let Some(refs) = descriptor.get("references") {
            let refs = match refs {
                Value::String(r) => vec![r.clone()],
                Value::Array(refs) => references(refs)?,
                other => {
                    return Err(NestError::InvalidSetup(format!(
                        "Invalid references '{other}'"
                    )))
                }
            };
            found.push(Self::References(refs));
        }

        let readable = descriptor.get("readable").and_then(Value::as_bool);
        let writeable = descriptor.get("writeable").and_then(Value::as_bool);
        if readable.is_some() || writeable.is_some() {
            found.push(Self::Inaccessible {
                readable: readable.unwrap_or(true),
                writeable: writeable.unwrap_or(true),
            });
        }

        match found.len() {
            0 => Ok(Self::Plain),
            1 => Ok(found.remove(0)),
            _ => Err(NestError::InvalidSetup(format!(
                "Field descriptor {} names more than one classification",
                Value::Object(descriptor.clone())
            ))),
        }
    }

    /// Returns the alias target, if this is an alias.
    #[must_use]
    pub fn alias(&self) -> Option<&str> {
        match self {
            Self::Alias(alias) => Some(alias),
            _ => None,
        }
    }

    /// Returns the `table.column` references, if any.
    #[must_use]
    pub fn references(&self) -> &[String] {
        match self {
            Self::References(refs) => refs,
            _ => &[],
        }
    }

    /// Returns the column type, if any.
    #[must_use]
    pub const fn field_type(&self) -> Option<FieldType> {
        match self {
            Self::Typed(kind) => Some(*kind),
            _ => None,
        }
    }

    /// Returns true unless the field is marked unreadable.
    #[must_use]
    pub const fn readable(&self) -> bool {
        !matches!(self, Self::Inaccessible { readable: false, .. })
    }

    /// Returns true unless the field is marked unwriteable.
    #[must_use]
    pub const fn writeable(&self) -> bool {
        !matches!(self, Self::Inaccessible { writeable: false, .. })
    }
}

fn references(refs: &[Value]) -> Result<Vec<String>> {
    refs.iter()
        .map(|r| {
            r.as_str()
                .map(String::from)
                .ok_or_else(|| NestError::InvalidSetup(format!("Invalid reference '{r}'")))
        })
        .collect()
}

impl fmt::Debug for FieldAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain => f.write_str("Plain"),
            Self::Alias(alias) => f.debug_tuple("Alias").field(alias).finish(),
            Self::References(refs) => f.debug_tuple("References").field(refs).finish(),
            Self::Generated(_) => f.write_str("Generated(..)"),
            Self::Typed(kind) => f.debug_tuple("Typed").field(kind).finish(),
            Self::Inaccessible {
                readable,
                writeable,
            } => f
                .debug_struct("Inaccessible")
                .field("readable", readable)
                .field("writeable", writeable)
                .finish(),
        }
    }
}

impl<'de> Deserialize<'de> for FieldAttribute {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_raw_entries() {
        assert!(matches!(
            FieldAttribute::from_value(&json!("name")).unwrap(),
            FieldAttribute::Alias(a) if a == "name"
        ));
        assert_eq!(
            FieldAttribute::from_value(&json!(["user.id"]))
                .unwrap()
                .references(),
            ["user.id".to_string()]
        );
        let hidden = FieldAttribute::from_value(&json!(false)).unwrap();
        assert!(!hidden.readable());
        assert!(!hidden.writeable());
        assert!(matches!(
            FieldAttribute::from_value(&json!(null)).unwrap(),
            FieldAttribute::Plain
        ));
    }

    #[test]
    fn test_descriptors() {
        let json_field = FieldAttribute::from_value(&json!({"type": "json"})).unwrap();
        assert_eq!(json_field.field_type(), Some(FieldType::Json));

        let read_only = FieldAttribute::from_value(&json!({"writeable": false})).unwrap();
        assert!(read_only.readable());
        assert!(!read_only.writeable());

        let refs = FieldAttribute::from_value(&json!({"references": "user.id"})).unwrap();
        assert_eq!(refs.references(), ["user.id".to_string()]);
    }

    #[test]
    fn test_ambiguous_descriptor_is_rejected() {
        let err = FieldAttribute::from_value(&json!({"type": "json", "alias": "meta"})).unwrap_err();
        assert_eq!(err.code(), "INVALID_SETUP");
        assert!(FieldAttribute::from_value(&json!({"type": "blob"})).is_err());
        assert!(FieldAttribute::from_value(&json!(3)).is_err());
    }
}
