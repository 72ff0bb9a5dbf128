//! The seam between compiled statements and a database.

use futures::future::BoxFuture;
use oxide_nest_core::SqlValue;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Result;

/// A result row: column label to value, in select order.
pub type Row = Map<String, Value>;

/// Kind of statement a [`Query`] holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Select,
    Update,
    Insert,
    Delete,
}

/// A compiled statement and its bound values, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub sql: String,
    pub values: Vec<SqlValue>,
    pub kind: QueryKind,
}

impl Query {
    /// Creates a query.
    #[must_use]
    pub fn new(sql: impl Into<String>, values: Vec<SqlValue>, kind: QueryKind) -> Self {
        Self {
            sql: sql.into(),
            values,
            kind,
        }
    }

    /// Renders the statement with its values inlined, for display only.
    #[must_use]
    pub fn to_inline_sql(&self) -> String {
        let mut values = self.values.iter().peekable();
        let mut out = String::with_capacity(self.sql.len());
        for c in self.sql.chars() {
            match values.peek() {
                Some(value) if c == '?' => {
                    out.push_str(&value.to_sql_inline());
                    values.next();
                }
                _ => out.push(c),
            }
        }
        out
    }
}

/// Outcome of a write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Affected {
    pub affected_rows: u64,
    pub insert_id: u64,
}

/// Outcome of executing a [`Query`].
#[derive(Debug, Clone, PartialEq)]
pub enum Execution {
    Rows(Vec<Row>),
    Affected(Affected),
}

/// Runs compiled statements.
///
/// Implemented for any `Fn(&Query) -> Result<Execution>`, which is enough
/// for tests and dry runs.
pub trait Execute: Send + Sync {
    /// Executes a statement.
    fn execute<'a>(&'a self, query: &'a Query) -> BoxFuture<'a, Result<Execution>>;
}

impl<F> Execute for F
where
    F: Fn(&Query) -> Result<Execution> + Send + Sync,
{
    fn execute<'a>(&'a self, query: &'a Query) -> BoxFuture<'a, Result<Execution>> {
        Box::pin(futures::future::ready(self(query)))
    }
}
