//! UPDATE, INSERT and DELETE statement builders.
//!
//! Writes address a single table: the normalized tree must not contain
//! joined nodes, and filters render without a table alias.

use indexmap::IndexMap;
use oxide_nest_core::SqlValue;
use serde_json::{Map, Value};

use crate::error::{NestError, Result};
use crate::executor::{Query, QueryKind};
use crate::options::NestOptions;
use crate::schema::{FieldAttribute, FieldType, Method, Schema};
use crate::tree::RequestTree;
use crate::value::to_sql_value;

/// Schema entry applied to written fields the schema does not name.
const DEFAULT_FIELD: &str = "default";

/// Compiles `UPDATE [IGNORE ]<table> SET ... [WHERE ...] LIMIT n`.
///
/// # Errors
///
/// Returns `InvalidRequest` for nested joins or an empty body, and the
/// value errors of [`format_input_value`].
pub fn build_update(tree: &RequestTree, options: &NestOptions) -> Result<Query> {
    reject_joins(tree, Method::Patch)?;
    let node = tree.root();
    let request = &tree.request;
    let body = validate_body(request.body.as_ref())?;
    let Value::Object(body) = body else {
        return Err(invalid_body(body));
    };

    let empty = Schema::new();
    let schema = options.models.get(&node.name).map_or(&empty, |m| &m.schema);
    let mut assignments: IndexMap<String, SqlValue> = IndexMap::new();
    for (label, value) in body {
        let (field, value) = format_input_value(schema, label, value, options)?;
        assignments.insert(field, value);
    }

    let set = assignments
        .keys()
        .map(|field| format!("`{field}` = ?"))
        .collect::<Vec<_>>()
        .join(", ");
    let mut values: Vec<SqlValue> = assignments.into_values().collect();

    let ignore = if is_ignore(request.duplicate_keys.as_deref()) {
        "IGNORE "
    } else {
        ""
    };
    let mut sql = format!("UPDATE {ignore}{} SET {set}", node.sql_table);
    push_where(&mut sql, &mut values, tree);
    sql.push_str(&format!(" LIMIT {}", node.limit));

    tracing::debug!(verb = %Method::Patch, table = %node.sql_table, placeholders = values.len(), "compiled update");
    Ok(Query::new(sql, values, QueryKind::Update))
}

/// Compiles `INSERT [IGNORE ]INTO <table> (...) VALUES (...), ...` over one
/// object or an array of objects. Columns are ordered by first appearance
/// and values an item omits are written as `DEFAULT`.
///
/// # Errors
///
/// Returns `InvalidRequest` for an empty body or non-object items, and the
/// value errors of [`format_input_value`].
pub fn build_insert(tree: &RequestTree, options: &NestOptions) -> Result<Query> {
    let node = tree.root();
    let request = &tree.request;
    let body = validate_body(request.body.as_ref())?;
    let items: Vec<&Map<String, Value>> = match body {
        Value::Object(item) => vec![item],
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Object(item) if !item.is_empty() => Ok(item),
                other => Err(invalid_body(other)),
            })
            .collect::<Result<_>>()?,
        other => return Err(invalid_body(other)),
    };

    let empty = Schema::new();
    let schema = options.models.get(&node.name).map_or(&empty, |m| &m.schema);
    let mut fields: Vec<String> = Vec::new();
    let mut rows: Vec<Vec<Option<SqlValue>>> = Vec::with_capacity(items.len());

    for item in items {
        let mut row: Vec<Option<SqlValue>> = vec![None; fields.len()];
        for (prop, value) in item {
            let (field, value) = format_input_value(schema, prop, value, options)?;
            let index = match fields.iter().position(|f| *f == field) {
                Some(index) => index,
                None => {
                    fields.push(field);
                    fields.len() - 1
                }
            };
            if row.len() <= index {
                row.resize(index + 1, None);
            }
            row[index] = Some(value);
        }

        if let Some(validate) = &options.validate_input {
            for (field, attribute) in schema {
                if field != DEFAULT_FIELD && !item.contains_key(field) {
                    validate(Some(attribute), field, None)?;
                }
            }
        }

        rows.push(row);
    }

    let mut values = Vec::new();
    let tuples = rows
        .into_iter()
        .map(|mut row| {
            row.resize(fields.len(), None);
            let slots = row
                .into_iter()
                .map(|value| match value {
                    Some(value) => {
                        values.push(value);
                        "?"
                    }
                    None => "DEFAULT",
                })
                .collect::<Vec<_>>();
            format!("({})", slots.join(","))
        })
        .collect::<Vec<_>>()
        .join(",");

    let columns = fields
        .iter()
        .map(|f| format!("`{f}`"))
        .collect::<Vec<_>>()
        .join(",");
    let ignore = if request.ignore { "IGNORE " } else { "" };
    let mut sql = format!(
        "INSERT {ignore}INTO {} ({columns}) VALUES {tuples}",
        node.sql_table
    );

    if let Some(keys) = &request.duplicate_keys_update {
        let keys: Vec<&str> = keys
            .iter()
            .map(|key| {
                schema
                    .get(key)
                    .and_then(FieldAttribute::alias)
                    .unwrap_or(key)
            })
            .collect();
        sql.push(' ');
        sql.push_str(&on_duplicate_keys_update(&keys));
    } else if is_ignore(request.duplicate_keys.as_deref()) {
        sql.push(' ');
        sql.push_str(&on_duplicate_keys_update(&[]));
        sql.push_str("_rowid=_rowid");
    }

    tracing::debug!(verb = %Method::Post, table = %node.sql_table, placeholders = values.len(), "compiled insert");
    Ok(Query::new(sql, values, QueryKind::Insert))
}

/// Compiles `DELETE FROM <table> [WHERE ...] LIMIT n`.
///
/// # Errors
///
/// Returns `InvalidRequest` for nested joins.
pub fn build_delete(tree: &RequestTree) -> Result<Query> {
    reject_joins(tree, Method::Del)?;
    let node = tree.root();
    let mut values = Vec::new();
    let mut sql = format!("DELETE FROM {}", node.sql_table);
    push_where(&mut sql, &mut values, tree);
    sql.push_str(&format!(" LIMIT {}", node.limit));

    tracing::debug!(verb = %Method::Del, table = %node.sql_table, placeholders = values.len(), "compiled delete");
    Ok(Query::new(sql, values, QueryKind::Delete))
}

/// Maps a written field to its column and bound value.
///
/// The field's attribute comes from the schema, falling back to the
/// schema's `default` entry. The `validate_input` callback, when set, runs
/// before any other check.
///
/// # Errors
///
/// Returns `InvalidReference` for unwriteable fields, and `InvalidValue`
/// when a JSON field is given a scalar or any other field an object.
pub fn format_input_value(
    schema: &Schema,
    field: &str,
    value: &Value,
    options: &NestOptions,
) -> Result<(String, SqlValue)> {
    let attribute = schema.get(field).or_else(|| schema.get(DEFAULT_FIELD));

    if let Some(validate) = &options.validate_input {
        validate(attribute, field, Some(value))?;
    }

    if attribute.is_some_and(|a| !a.writeable()) {
        return Err(NestError::InvalidReference(format!(
            "Field '{field}' is not writeable"
        )));
    }

    let value = if attribute.and_then(FieldAttribute::field_type) == Some(FieldType::Json) {
        match value {
            Value::Null => SqlValue::Null,
            Value::Object(_) | Value::Array(_) => SqlValue::Text(value.to_string()),
            other => {
                return Err(NestError::InvalidValue(format!(
                    "Field '{field}' must be an object: {other} provided"
                )))
            }
        }
    } else {
        match value {
            Value::Object(_) | Value::Array(_) => {
                return Err(NestError::InvalidValue(format!(
                    "Field '{field}' does not accept objects as values: '{value}'"
                )))
            }
            other => to_sql_value(other),
        }
    };

    let column = attribute
        .and_then(FieldAttribute::alias)
        .unwrap_or(field)
        .to_string();
    Ok((column, value))
}

fn reject_joins(tree: &RequestTree, method: Method) -> Result<()> {
    if tree.has_joins() {
        return Err(NestError::InvalidRequest(format!(
            "{method} cannot contain nested joins"
        )));
    }
    Ok(())
}

fn validate_body(body: Option<&Value>) -> Result<&Value> {
    match body {
        Some(body @ Value::Object(map)) if !map.is_empty() => Ok(body),
        Some(body @ Value::Array(items)) if !items.is_empty() => Ok(body),
        Some(other) => Err(invalid_body(other)),
        None => Err(NestError::InvalidRequest("The body undefined is invalid".into())),
    }
}

fn invalid_body(body: &Value) -> NestError {
    NestError::InvalidRequest(format!("The body {body} is invalid"))
}

fn is_ignore(duplicate_keys: Option<&str>) -> bool {
    duplicate_keys.is_some_and(|keys| keys.eq_ignore_ascii_case("ignore"))
}

fn on_duplicate_keys_update(keys: &[&str]) -> String {
    let assignments = keys
        .iter()
        .map(|name| format!("`{name}`=VALUES(`{name}`)"))
        .collect::<Vec<_>>()
        .join(",");
    format!("ON DUPLICATE KEY UPDATE {assignments}")
}

fn push_where(sql: &mut String, values: &mut Vec<SqlValue>, tree: &RequestTree) {
    let filter = &tree.root().filter;
    if filter.is_empty() {
        return;
    }
    let conditions = filter
        .iter()
        .map(|condition| {
            values.extend(condition.values.iter().cloned());
            condition.render(None)
        })
        .collect::<Vec<_>>();
    sql.push_str(" WHERE ");
    sql.push_str(&conditions.join(" AND "));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::format_request;
    use crate::request::Request;
    use serde_json::json;

    fn options() -> NestOptions {
        NestOptions::with_models(
            serde_json::from_value(json!({
                "users": {
                    "table": "tbl_users",
                    "schema": {
                        "emailAddress": "email",
                        "password": {"writeable": false},
                        "meta": {"type": "json"}
                    }
                },
                "posts": {"schema": {"user_id": ["users.id"]}}
            }))
            .unwrap(),
        )
    }

    async fn tree(options: &NestOptions, method: Method, request: Value) -> RequestTree {
        let request: Request = serde_json::from_value(request).unwrap();
        format_request(options, method, request).await.unwrap()
    }

    #[tokio::test]
    async fn test_update() {
        let options = options();
        let tree = tree(
            &options,
            Method::Patch,
            json!({
                "table": "users",
                "filter": {"id": 1},
                "body": {"name": "Andrew", "emailAddress": "a@example.com", "meta": {"a": 1}},
                "duplicate_keys": "IGNORE"
            }),
        )
        .await;
        let query = build_update(&tree, &options).unwrap();
        assert_eq!(
            query.sql,
            "UPDATE IGNORE tbl_users SET `name` = ?, `email` = ?, `meta` = ? WHERE id = ? LIMIT 1"
        );
        assert_eq!(
            query.values,
            vec![
                SqlValue::Text("Andrew".into()),
                SqlValue::Text("a@example.com".into()),
                SqlValue::Text(r#"{"a":1}"#.into()),
                SqlValue::Int(1),
            ]
        );
        assert_eq!(query.kind, QueryKind::Update);
    }

    #[tokio::test]
    async fn test_update_rejects_joins_and_empty_body() {
        let options = options();
        let joined = tree(
            &options,
            Method::Patch,
            json!({"table": "posts", "filter": {"users": {"name": "x"}}, "body": {"title": "t"}}),
        )
        .await;
        let err = build_update(&joined, &options).unwrap_err();
        assert_eq!(err.to_string(), "patch cannot contain nested joins");

        let empty = tree(&options, Method::Patch, json!({"table": "users", "body": {}})).await;
        assert_eq!(build_update(&empty, &options).unwrap_err().code(), "INVALID_REQUEST");
    }

    #[tokio::test]
    async fn test_insert_many() {
        let options = options();
        let tree = tree(
            &options,
            Method::Post,
            json!({
                "table": "users",
                "body": [{"name": "A", "emailAddress": "a@x"}, {"age": 3, "name": "B"}],
                "duplicate_keys_update": ["emailAddress", "name"]
            }),
        )
        .await;
        let query = build_insert(&tree, &options).unwrap();
        assert_eq!(
            query.sql,
            "INSERT INTO tbl_users (`name`,`email`,`age`) VALUES (?,?,DEFAULT),(?,DEFAULT,?) ON DUPLICATE KEY UPDATE `email`=VALUES(`email`),`name`=VALUES(`name`)"
        );
        assert_eq!(
            query.values,
            vec![
                SqlValue::Text("A".into()),
                SqlValue::Text("a@x".into()),
                SqlValue::Text("B".into()),
                SqlValue::Int(3),
            ]
        );
    }

    #[tokio::test]
    async fn test_insert_ignore() {
        let options = options();
        let tree = tree(
            &options,
            Method::Post,
            json!({"table": "users", "body": {"name": "A"}, "ignore": true, "duplicate_keys": "ignore"}),
        )
        .await;
        let query = build_insert(&tree, &options).unwrap();
        assert_eq!(
            query.sql,
            "INSERT IGNORE INTO tbl_users (`name`) VALUES (?) ON DUPLICATE KEY UPDATE _rowid=_rowid"
        );
    }

    #[tokio::test]
    async fn test_delete() {
        let options = options();
        let tree = tree(
            &options,
            Method::Del,
            json!({"table": "posts", "filter": {"id": [1, 2]}, "limit": 2}),
        )
        .await;
        let query = build_delete(&tree).unwrap();
        assert_eq!(query.sql, "DELETE FROM posts WHERE id IN (?,?) LIMIT 2");
        assert_eq!(query.values, vec![SqlValue::Int(1), SqlValue::Int(2)]);
    }

    #[test]
    fn test_format_input_value() {
        let options = options();
        let schema = &options.models["users"].schema;

        let err = format_input_value(schema, "password", &json!("x"), &options).unwrap_err();
        assert_eq!(err.to_string(), "Field 'password' is not writeable");

        let err = format_input_value(schema, "meta", &json!("x"), &options).unwrap_err();
        assert_eq!(err.code(), "INVALID_VALUE");

        let err = format_input_value(schema, "name", &json!({"a": 1}), &options).unwrap_err();
        assert_eq!(err.code(), "INVALID_VALUE");

        let (field, value) = format_input_value(schema, "meta", &Value::Null, &options).unwrap();
        assert_eq!(field, "meta");
        assert_eq!(value, SqlValue::Null);
    }

    #[test]
    fn test_validate_input_sees_fields() {
        let options = options().validate_input(|_, field, value| {
            if field == "name" && value.is_some_and(Value::is_null) {
                return Err(NestError::InvalidValue("name is required".into()));
            }
            Ok(())
        });
        let schema = Schema::new();
        let err = format_input_value(&schema, "name", &Value::Null, &options).unwrap_err();
        assert_eq!(err.to_string(), "name is required");
    }
}
