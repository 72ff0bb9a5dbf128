//! The public verbs.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::compile::build_select;
use crate::error::{NestError, Result};
use crate::executor::{Affected, Execute, Execution, Query, Row};
use crate::format::format_request;
use crate::options::NestOptions;
use crate::request::{NotFound, Request};
use crate::response::reconstruct;
use crate::schema::Method;
use crate::tree::RequestTree;
use crate::write::{build_delete, build_insert, build_update};

/// Entry point: options plus the executor statements run on.
///
/// Every verb call normalizes and compiles its own tree, so a `Nest` can be
/// shared freely across tasks.
#[derive(Clone)]
pub struct Nest {
    options: Arc<NestOptions>,
    executor: Option<Arc<dyn Execute>>,
}

impl Nest {
    /// Creates an instance without an executor. Only the `build_*`
    /// methods work until one is attached.
    #[must_use]
    pub fn new(options: NestOptions) -> Self {
        Self {
            options: Arc::new(options),
            executor: None,
        }
    }

    /// Attaches the executor.
    #[must_use]
    pub fn with_executor(mut self, executor: impl Execute + 'static) -> Self {
        self.executor = Some(Arc::new(executor));
        self
    }

    /// Returns a handle with different options sharing this executor.
    #[must_use]
    pub fn with_options(&self, options: NestOptions) -> Self {
        Self {
            options: Arc::new(options),
            executor: self.executor.clone(),
        }
    }

    /// Returns the options.
    #[must_use]
    pub fn options(&self) -> &NestOptions {
        &self.options
    }

    /// Reads nested records.
    ///
    /// Returns an array, or the first object when the request had no
    /// `limit`. An empty single read applies the request's `notfound`.
    ///
    /// # Errors
    ///
    /// Returns normalization and compilation errors, `NotFound`, and any
    /// executor error.
    pub async fn get(&self, request: Request) -> Result<Value> {
        let (tree, query) = self.prepare_get(request).await?;
        let rows = into_rows(self.execute(&query).await?)?;
        tracing::debug!(rows = rows.len(), "fetched rows");

        let mut items = reconstruct(rows, &tree.generated, self.options.row_handler.as_ref());
        let response = if tree.root().single {
            if items.is_empty() {
                tree.request.notfound.resolve()?
            } else {
                items.swap_remove(0)
            }
        } else {
            Value::Array(items)
        };
        self.after(Method::Get, &tree, response)
    }

    /// Counts the distinct records matching the request's filter.
    ///
    /// # Errors
    ///
    /// As [`Nest::get`], without `NotFound`.
    pub async fn get_count(&self, request: Request) -> Result<u64> {
        let query = self.build_count(request).await?;
        let rows = into_rows(self.execute(&query).await?)?;
        Ok(rows.first().and_then(|row| row.get("count")).map_or(0, count_value))
    }

    /// Updates the records matching the request's filter with its body.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for nested joins or an empty body, write
    /// value errors, and `NotFound` when no row changed.
    pub async fn patch(&self, request: Request) -> Result<Value> {
        let tree = format_request(&self.options, Method::Patch, request).await?;
        if let Some(skip) = tree.request.skip.clone() {
            return self.after(Method::Patch, &tree, skip);
        }
        let query = build_update(&tree, &self.options)?;
        let affected = into_affected(self.execute(&query).await?)?;
        let response = must_affect_rows(affected, &tree.request.notfound)?;
        self.after(Method::Patch, &tree, response)
    }

    /// Inserts the request's body, one object or an array of objects.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for an empty body, write value errors and
    /// driver errors such as `ER_DUP_ENTRY`.
    pub async fn post(&self, request: Request) -> Result<Value> {
        let tree = format_request(&self.options, Method::Post, request).await?;
        if let Some(skip) = tree.request.skip.clone() {
            return self.after(Method::Post, &tree, skip);
        }
        let query = build_insert(&tree, &self.options)?;
        let affected = into_affected(self.execute(&query).await?)?;
        let response = serde_json::to_value(affected)?;
        self.after(Method::Post, &tree, response)
    }

    /// Deletes the records matching the request's filter.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for nested joins and `NotFound` when no
    /// row was deleted.
    pub async fn del(&self, request: Request) -> Result<Value> {
        let tree = format_request(&self.options, Method::Del, request).await?;
        if let Some(skip) = tree.request.skip.clone() {
            return self.after(Method::Del, &tree, skip);
        }
        let query = build_delete(&tree)?;
        let affected = into_affected(self.execute(&query).await?)?;
        let response = must_affect_rows(affected, &tree.request.notfound)?;
        self.after(Method::Del, &tree, response)
    }

    /// Compiles a read without executing it.
    ///
    /// # Errors
    ///
    /// Returns normalization and compilation errors.
    pub async fn build_get(&self, request: Request) -> Result<Query> {
        self.prepare_get(request).await.map(|(_, query)| query)
    }

    /// Compiles a count without executing it.
    ///
    /// # Errors
    ///
    /// Returns normalization and compilation errors.
    pub async fn build_count(&self, mut request: Request) -> Result<Query> {
        request.count_rows = true;
        request.fields = Some(json!([]));
        request.orderby = None;
        request.limit = None;
        request.start = None;
        self.build_get(request).await
    }

    /// Compiles an update without executing it.
    ///
    /// # Errors
    ///
    /// As [`Nest::patch`], without `NotFound`.
    pub async fn build_patch(&self, request: Request) -> Result<Query> {
        let tree = format_request(&self.options, Method::Patch, request).await?;
        build_update(&tree, &self.options)
    }

    /// Compiles an insert without executing it.
    ///
    /// # Errors
    ///
    /// As [`Nest::post`], without driver errors.
    pub async fn build_post(&self, request: Request) -> Result<Query> {
        let tree = format_request(&self.options, Method::Post, request).await?;
        build_insert(&tree, &self.options)
    }

    /// Compiles a delete without executing it.
    ///
    /// # Errors
    ///
    /// As [`Nest::del`], without `NotFound`.
    pub async fn build_del(&self, request: Request) -> Result<Query> {
        let tree = format_request(&self.options, Method::Del, request).await?;
        build_delete(&tree)
    }

    async fn prepare_get(&self, request: Request) -> Result<(RequestTree, Query)> {
        let mut tree = format_request(&self.options, Method::Get, request).await?;
        let query = build_select(&mut tree, &self.options)?;
        Ok((tree, query))
    }

    /// Runs the root model's post-execution handler for `method`, if any.
    fn after(&self, method: Method, tree: &RequestTree, response: Value) -> Result<Value> {
        let handler = self
            .options
            .models
            .get(&tree.root().name)
            .and_then(|model| model.after_for(method));
        match handler {
            Some(handler) => handler(response),
            None => Ok(response),
        }
    }

    async fn execute(&self, query: &Query) -> Result<Execution> {
        let executor = self
            .executor
            .as_ref()
            .ok_or_else(|| NestError::InvalidSetup("Define an executor to continue".into()))?;
        executor.execute(query).await
    }
}

fn into_rows(execution: Execution) -> Result<Vec<Row>> {
    match execution {
        Execution::Rows(rows) => Ok(rows),
        Execution::Affected(_) => Err(NestError::InvalidSetup(
            "The executor returned an affected-row count for a SELECT".into(),
        )),
    }
}

fn into_affected(execution: Execution) -> Result<Affected> {
    match execution {
        Execution::Affected(affected) => Ok(affected),
        Execution::Rows(_) => Err(NestError::InvalidSetup(
            "The executor returned rows for a write".into(),
        )),
    }
}

fn must_affect_rows(affected: Affected, notfound: &NotFound) -> Result<Value> {
    if affected.affected_rows == 0 {
        return notfound.resolve();
    }
    Ok(serde_json::to_value(affected)?)
}

fn count_value(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n.as_u64().unwrap_or_default(),
        Value::String(s) => s.parse().unwrap_or_default(),
        _ => 0,
    }
}
