//! Filter values compiled into WHERE clauses.

mod common;
use common::*;

use oxide_nest::{Nest, Query, SqlValue};
use serde_json::{json, Value};

async fn filtered(filter: Value) -> Query {
    nest()
        .build_get(request(json!({
            "table": "users",
            "fields": ["id"],
            "filter": filter,
            "limit": 5
        })))
        .await
        .unwrap()
}

fn text(s: &str) -> SqlValue {
    SqlValue::Text(s.into())
}

#[tokio::test]
async fn value_shapes() {
    let query = filtered(json!({
        "name": "And%",
        "-status": "deleted",
        "deleted": null,
        "age": "18..65",
        "id": [1, 2, null]
    }))
    .await;
    assert_eq!(
        query.sql,
        "SELECT a.id FROM users a WHERE a.name LIKE ? AND a.status != ? AND a.deleted IS NULL AND a.age BETWEEN ? AND ? AND (a.id IN (?,?) OR a.id IS NULL) LIMIT 5"
    );
    assert_eq!(
        query.values,
        vec![
            text("And%"),
            text("deleted"),
            text("18"),
            text("65"),
            SqlValue::Int(1),
            SqlValue::Int(2),
        ]
    );
}

#[tokio::test]
async fn negated_range_keeps_nulls() {
    let query = filtered(json!({"-age": "18..65"})).await;
    assert!(query
        .sql
        .contains("WHERE (NOT a.age BETWEEN ? AND ? OR a.age IS NULL)"));
}

#[tokio::test]
async fn open_ranges() {
    let query = filtered(json!({"age": "18..", "score": "..10"})).await;
    assert!(query.sql.contains("WHERE a.age > ? AND a.score < ?"));
    assert_eq!(query.values, vec![text("18"), text("10")]);
}

#[tokio::test]
async fn datetime_filters_expand_to_ranges() {
    let query = filtered(json!({"created": "2024-02"})).await;
    assert!(query.sql.contains("WHERE a.created BETWEEN ? AND ?"));
    assert_eq!(
        query.values,
        vec![text("2024-02-01T00:00:00"), text("2024-02-29T23:59:59")]
    );
}

#[tokio::test]
async fn aliased_filter_fields() {
    let query = filtered(json!({"emailAddress": "a@example.com"})).await;
    assert!(query.sql.contains("WHERE a.email = ?"));
}

#[tokio::test]
async fn operators_in_values_can_be_disabled() {
    let mut options = options();
    options.conditional_operators_in_value = String::new();
    let nest = Nest::new(options);

    let query = nest
        .build_get(request(json!({
            "table": "users",
            "fields": ["id"],
            "filter": {"name": "And%", "%title": "Mr", "age": "18..65"},
            "limit": 5
        })))
        .await
        .unwrap();
    assert!(query
        .sql
        .contains("WHERE a.name = ? AND a.title LIKE ? AND a.age = ?"));
}

#[tokio::test]
async fn invalid_filter_keys() {
    let err = nest()
        .build_get(request(json!({
            "table": "users",
            "fields": ["id"],
            "filter": {"na me": 1}
        })))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_REFERENCE");
    assert_eq!(err.status(), 400);
}

#[tokio::test]
async fn limits_are_validated() {
    for limit in [json!(0), json!(-1), json!(1.5), json!("ten")] {
        let err = nest()
            .build_get(request(json!({"table": "users", "fields": ["id"], "limit": limit})))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_LIMIT");
    }

    let err = nest()
        .build_get(request(json!({"table": "users", "fields": ["id"], "limit": 5, "start": -1})))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_START");
}
