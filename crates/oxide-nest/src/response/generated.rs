//! Generated fields: values computed after the rows are reconstructed.

use std::fmt;

use serde_json::{Map, Value};

use super::json::decode;
use crate::schema::Transform;

/// What a generated field does to its target object.
#[derive(Clone)]
pub enum GeneratedKind {
    /// Calls a transform with a snapshot of the object's own fields.
    Handler {
        /// The computation.
        transform: Transform,
        /// Columns selected only to feed the transform; removed afterwards.
        extra_fields: Vec<String>,
    },
    /// Parses the JSON text stored under the label.
    Json,
}

impl fmt::Debug for GeneratedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handler { extra_fields, .. } => f
                .debug_struct("Handler")
                .field("extra_fields", extra_fields)
                .finish_non_exhaustive(),
            Self::Json => f.write_str("Json"),
        }
    }
}

/// A field computed from a reconstructed object.
#[derive(Debug, Clone)]
pub struct GeneratedField {
    /// Output key written on the target object.
    pub label: String,
    /// Field as requested, relative to `field_alias_path`.
    pub field: String,
    /// Address of the node that requested the field, e.g. `post.author.`.
    pub field_alias_path: String,
    pub kind: GeneratedKind,
}

impl GeneratedField {
    /// Path from the row root to the objects this field is written on.
    fn target_address(&self) -> Vec<&str> {
        let request_path = model_path(&self.field);
        let address = self
            .field_alias_path
            .strip_suffix(request_path)
            .unwrap_or(&self.field_alias_path);
        split_path(address)
    }

    /// Applies the field to every matching object of a reconstructed row.
    pub(crate) fn apply(&self, row: &mut Map<String, Value>) {
        let address = self.target_address();
        self.walk(row, &address);
    }

    fn walk(&self, target: &mut Map<String, Value>, address: &[&str]) {
        let Some((head, rest)) = address.split_first() else {
            self.write(target);
            return;
        };
        match target.get_mut(*head) {
            Some(Value::Array(items)) => {
                for item in items.iter_mut().filter_map(Value::as_object_mut) {
                    self.walk(item, rest);
                }
            }
            Some(Value::Object(nested)) => self.walk(nested, rest),
            _ => {}
        }
    }

    fn write(&self, target: &mut Map<String, Value>) {
        match &self.kind {
            GeneratedKind::Handler {
                transform,
                extra_fields,
            } => {
                let path = split_path(model_path(&self.field));
                let props = first_object_mut(target, &path)
                    .map(|props| {
                        let snapshot = props.clone();
                        for key in extra_fields {
                            props.shift_remove(key);
                        }
                        snapshot
                    })
                    .unwrap_or_default();
                prune_empty(target, &path);
                target.insert(self.label.clone(), transform(&props));
            }
            GeneratedKind::Json => {
                let parsed = target
                    .get(&self.label)
                    .and_then(decode)
                    .unwrap_or_else(|| Value::Object(Map::new()));
                target.insert(self.label.clone(), parsed);
            }
        }
    }
}

/// `picture.url` -> `picture.`; `url` -> ``.
fn model_path(field: &str) -> &str {
    field.rfind('.').map_or("", |i| &field[..=i])
}

fn split_path(path: &str) -> Vec<&str> {
    path.split('.').filter(|s| !s.is_empty()).collect()
}

fn first_object_mut<'a>(
    target: &'a mut Map<String, Value>,
    path: &[&str],
) -> Option<&'a mut Map<String, Value>> {
    let Some((head, rest)) = path.split_first() else {
        return Some(target);
    };
    match target.get_mut(*head)? {
        Value::Array(items) => items
            .iter_mut()
            .filter_map(Value::as_object_mut)
            .find_map(|item| first_object_mut(item, rest)),
        Value::Object(nested) => first_object_mut(nested, rest),
        _ => None,
    }
}

/// Removes objects left empty at `path`, and arrays left without items.
/// Returns true if `target` itself is empty and `path` ends here.
fn prune_empty(target: &mut Map<String, Value>, path: &[&str]) -> bool {
    let Some((head, rest)) = path.split_first() else {
        return target.is_empty();
    };
    let remove = match target.get_mut(*head) {
        Some(Value::Array(items)) => {
            items.retain_mut(|item| !item.as_object_mut().is_some_and(|m| prune_empty(m, rest)));
            items.is_empty()
        }
        Some(Value::Object(nested)) => prune_empty(nested, rest),
        _ => false,
    };
    if remove {
        target.shift_remove(*head);
    }
    false
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn test_target_address() {
        let field = GeneratedField {
            label: "url".into(),
            field: "picture.url".into(),
            field_alias_path: "post.picture.".into(),
            kind: GeneratedKind::Json,
        };
        assert_eq!(field.target_address(), vec!["post"]);

        let field = GeneratedField {
            field: "url".into(),
            ..field
        };
        assert_eq!(field.target_address(), vec!["post", "picture"]);
    }

    #[test]
    fn test_handler_removes_extra_fields() {
        let transform: Transform = Arc::new(|props: &Map<String, Value>| {
            json!(format!(
                "{} {}",
                props["first_name"].as_str().unwrap_or_default(),
                props["last_name"].as_str().unwrap_or_default()
            ))
        });
        let field = GeneratedField {
            label: "full_name".into(),
            field: "full_name".into(),
            field_alias_path: "author.".into(),
            kind: GeneratedKind::Handler {
                transform,
                extra_fields: vec!["last_name".into()],
            },
        };
        let mut row = object(json!({
            "id": 1,
            "author": [{"first_name": "Ada", "last_name": "Lovelace"}]
        }));
        field.apply(&mut row);
        assert_eq!(
            Value::Object(row),
            json!({
                "id": 1,
                "author": [{"first_name": "Ada", "full_name": "Ada Lovelace"}]
            })
        );
    }

    #[test]
    fn test_json_field() {
        let field = GeneratedField {
            label: "meta".into(),
            field: "meta".into(),
            field_alias_path: String::new(),
            kind: GeneratedKind::Json,
        };
        let mut row = object(json!({"meta": "{\"tags\":[1]}"}));
        field.apply(&mut row);
        assert_eq!(row["meta"], json!({"tags": [1]}));

        let mut row = object(json!({"meta": null}));
        field.apply(&mut row);
        assert_eq!(row["meta"], json!({}));
    }

    #[test]
    fn test_prune_empty() {
        let mut row = object(json!({"a": {}, "b": [{}, {"x": 1}], "c": [{}]}));
        prune_empty(&mut row, &["a"]);
        prune_empty(&mut row, &["b"]);
        prune_empty(&mut row, &["c"]);
        assert_eq!(Value::Object(row), json!({"b": [{"x": 1}]}));
    }
}
