//! The request surface accepted by the verbs.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;

/// Computes the response of a request that matched nothing.
pub type NotFoundHandler = Arc<dyn Fn() -> Result<Value> + Send + Sync>;

/// What to do when a single-item read or a write matches nothing.
#[derive(Clone, Default)]
pub enum NotFound {
    /// Fail with [`crate::NestError::NotFound`].
    #[default]
    Raise,
    /// Respond with the given value instead.
    Respond(Value),
    /// Respond with whatever the handler returns, or fail with its error.
    Handler(NotFoundHandler),
}

impl NotFound {
    /// Wraps a handler.
    #[must_use]
    pub fn handler<F>(handler: F) -> Self
    where
        F: Fn() -> Result<Value> + Send + Sync + 'static,
    {
        Self::Handler(Arc::new(handler))
    }

    /// Resolves the response of an empty result.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for [`NotFound::Raise`] and the handler's error for
    /// [`NotFound::Handler`].
    pub fn resolve(&self) -> Result<Value> {
        match self {
            Self::Raise => Err(crate::NestError::NotFound),
            Self::Respond(value) => Ok(value.clone()),
            Self::Handler(handler) => handler(),
        }
    }
}

impl fmt::Debug for NotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raise => f.write_str("Raise"),
            Self::Respond(value) => f.debug_tuple("Respond").field(value).finish(),
            Self::Handler(_) => f.write_str("Handler"),
        }
    }
}

impl PartialEq for NotFound {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Raise, Self::Raise) => true,
            (Self::Respond(a), Self::Respond(b)) => a == b,
            (Self::Handler(a), Self::Handler(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// A nested request.
///
/// `fields`, `filter`, `join`, `groupby` and `orderby` are kept as raw JSON
/// because they may address related tables at any depth; the normalizer
/// splits them per table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Request {
    /// Table (model) name, optionally decorated: `-comments`, `user$2`.
    pub table: String,
    /// Alias under which the table is addressed. Defaults to `table`.
    pub alias: Option<String>,
    /// Fields to select: an array of expressions, labels and nested groups.
    pub fields: Option<Value>,
    /// Filter conditions.
    pub filter: Option<Value>,
    /// Conditions attached to join clauses rather than the WHERE clause.
    pub join: Option<Value>,
    /// Grouping expressions: an array or a comma-separated string.
    pub groupby: Option<Value>,
    /// Ordering expressions: an array or a comma-separated string.
    pub orderby: Option<Value>,
    /// Maximum rows. Absent means a single item is expected.
    pub limit: Option<Value>,
    /// Rows to skip.
    pub start: Option<Value>,
    /// Body of a write: an object, or an array of objects for inserts.
    pub body: Option<Value>,
    /// `"ignore"` to ignore duplicate key errors.
    pub duplicate_keys: Option<String>,
    /// Fields to update when an insert hits a duplicate key.
    pub duplicate_keys_update: Option<Vec<String>>,
    /// Insert with `IGNORE`.
    pub ignore: bool,
    /// Return the number of matching rows instead of the rows.
    #[serde(rename = "countRows")]
    pub count_rows: bool,
    /// Behaviour when nothing matches.
    #[serde(skip)]
    pub notfound: NotFound,
    /// Set by a hook to short-circuit a write with this response.
    #[serde(skip)]
    pub skip: Option<Value>,
}

impl Request {
    /// Creates a request for `table`.
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    /// Sets the fields.
    #[must_use]
    pub fn fields(mut self, fields: Value) -> Self {
        self.fields = Some(fields);
        self
    }

    /// Sets the filter.
    #[must_use]
    pub fn filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Sets the join conditions.
    #[must_use]
    pub fn join(mut self, join: Value) -> Self {
        self.join = Some(join);
        self
    }

    /// Sets the grouping.
    #[must_use]
    pub fn groupby(mut self, groupby: Value) -> Self {
        self.groupby = Some(groupby);
        self
    }

    /// Sets the ordering.
    #[must_use]
    pub fn orderby(mut self, orderby: Value) -> Self {
        self.orderby = Some(orderby);
        self
    }

    /// Sets the limit.
    #[must_use]
    pub fn limit(mut self, limit: impl Into<Value>) -> Self {
        self.limit = Some(limit.into());
        self
    }

    /// Sets the start offset.
    #[must_use]
    pub fn start(mut self, start: impl Into<Value>) -> Self {
        self.start = Some(start.into());
        self
    }

    /// Sets the write body.
    #[must_use]
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Sets the not-found behaviour.
    #[must_use]
    pub fn notfound(mut self, notfound: NotFound) -> Self {
        self.notfound = notfound;
        self
    }
}
