#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use oxide_nest::{
    Affected, Execute, Execution, Models, Nest, NestOptions, Query, Request, Result, Row,
};
use serde_json::{json, Value};

/// Users, their posts and comments, and teams joined through memberships.
pub fn models() -> Models {
    serde_json::from_value(json!({
        "users": {
            "schema": {
                "emailAddress": "email",
                "password": false,
                "created": {"type": "datetime"},
                "settings": {"type": "json"}
            }
        },
        "posts": {"schema": {"user_id": ["users.id"]}},
        "comments": {"schema": {"post_id": ["posts.id"]}},
        "teams": {},
        "memberships": {"schema": {"user_id": ["users.id"], "team_id": ["teams.id"]}},
        "country": {}
    }))
    .unwrap_or_else(|e| panic!("Invalid fixture models: {e}"))
}

pub fn options() -> NestOptions {
    NestOptions::with_models(models())
}

pub fn nest() -> Nest {
    Nest::new(options())
}

pub fn request(value: Value) -> Request {
    serde_json::from_value(value).unwrap_or_else(|e| panic!("Invalid request: {e}"))
}

pub fn row(value: Value) -> Row {
    match value {
        Value::Object(row) => row,
        other => panic!("Expected an object row, got {other}"),
    }
}

/// Executor that records every statement and replays canned responses in
/// order. Without a queued response, reads return no rows and writes
/// affect one row.
#[derive(Clone, Default)]
pub struct Recorder {
    queries: Arc<Mutex<Vec<Query>>>,
    responses: Arc<Mutex<VecDeque<Execution>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(self, rows: Vec<Value>) -> Self {
        self.respond(Execution::Rows(rows.into_iter().map(row).collect()))
    }

    pub fn affected(self, affected_rows: u64) -> Self {
        self.respond(Execution::Affected(Affected {
            affected_rows,
            insert_id: 0,
        }))
    }

    pub fn respond(self, execution: Execution) -> Self {
        self.responses.lock().unwrap().push_back(execution);
        self
    }

    pub fn queries(&self) -> Vec<Query> {
        self.queries.lock().unwrap().clone()
    }

    pub fn last_sql(&self) -> String {
        self.queries()
            .last()
            .map(|q| q.sql.clone())
            .unwrap_or_else(|| panic!("No statement was executed"))
    }
}

impl Execute for Recorder {
    fn execute<'a>(&'a self, query: &'a Query) -> BoxFuture<'a, Result<Execution>> {
        self.queries.lock().unwrap().push(query.clone());
        let response = self.responses.lock().unwrap().pop_front();
        let execution = response.unwrap_or_else(|| match query.kind {
            oxide_nest::QueryKind::Select => Execution::Rows(Vec::new()),
            _ => Execution::Affected(Affected {
                affected_rows: 1,
                insert_id: 0,
            }),
        });
        Box::pin(futures::future::ready(Ok(execution)))
    }
}

/// Compiles a read with the fixture models.
pub async fn select_sql(value: Value) -> String {
    nest()
        .build_get(request(value))
        .await
        .unwrap_or_else(|e| panic!("Failed to compile: {e}"))
        .sql
}
