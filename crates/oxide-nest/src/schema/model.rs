//! Models: physical table, field schema and lifecycle hooks.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use super::field::{FieldAttribute, Generated};
use crate::error::Result;
use crate::request::Request;

/// Ordered mapping of field name to attribute.
pub type Schema = IndexMap<String, FieldAttribute>;

/// Ordered mapping of model name to model. A model named `default` supplies
/// fallback hooks and, for writes, the fallback field attribute.
pub type Models = IndexMap<String, Model>;

/// Name of the fallback model.
pub const DEFAULT_MODEL: &str = "default";

/// Verbs a hook can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Reads, including counts.
    Get,
    /// Updates.
    Patch,
    /// Inserts.
    Post,
    /// Deletes.
    Del,
}

impl Method {
    /// Returns the verb name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Patch => "patch",
            Self::Post => "post",
            Self::Del => "del",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lifecycle hook run on every request node of its model before the node
/// is normalized. It may rewrite the request, e.g. add filters or a
/// `_required` join, or set `skip` to short-circuit a write.
pub trait Hook: Send + Sync {
    /// Runs the hook.
    fn call<'a>(&'a self, request: &'a mut Request) -> BoxFuture<'a, Result<()>>;
}

impl<F> Hook for F
where
    F: Fn(&mut Request) -> Result<()> + Send + Sync,
{
    fn call<'a>(&'a self, request: &'a mut Request) -> BoxFuture<'a, Result<()>> {
        Box::pin(futures::future::ready(self(request)))
    }
}

/// Post-execution handler: receives a verb's response and returns the
/// response handed to the caller.
pub type After = Arc<dyn Fn(Value) -> Result<Value> + Send + Sync>;

/// A model descriptor.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct Model {
    /// Physical table name. Defaults to the model name.
    pub table: Option<String>,
    /// Field schema.
    pub schema: Schema,
    #[serde(skip)]
    hooks: HashMap<Method, Arc<dyn Hook>>,
    #[serde(skip)]
    after: HashMap<Method, After>,
}

impl Model {
    /// Creates an empty model.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the physical table name.
    #[must_use]
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Adds a field to the schema.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, attribute: FieldAttribute) -> Self {
        self.schema.insert(name.into(), attribute);
        self
    }

    /// Adds a generated field.
    #[must_use]
    pub fn generated<F>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut Vec<String>) -> Generated + Send + Sync + 'static,
    {
        self.field(name, FieldAttribute::Generated(Arc::new(handler)))
    }

    /// Attaches a hook for a verb.
    #[must_use]
    pub fn hook(mut self, method: Method, hook: impl Hook + 'static) -> Self {
        self.hooks.insert(method, Arc::new(hook));
        self
    }

    /// Returns the hook registered for a verb, if any.
    #[must_use]
    pub fn hook_for(&self, method: Method) -> Option<&Arc<dyn Hook>> {
        self.hooks.get(&method)
    }

    /// Attaches a handler run on the response of a verb whose root table is
    /// this model.
    #[must_use]
    pub fn after<F>(mut self, method: Method, handler: F) -> Self
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.after.insert(method, Arc::new(handler));
        self
    }

    /// Returns the post-execution handler registered for a verb, if any.
    #[must_use]
    pub fn after_for(&self, method: Method) -> Option<&After> {
        self.after.get(&method)
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut hooks: Vec<&str> = self.hooks.keys().map(|m| m.as_str()).collect();
        hooks.sort_unstable();
        let mut after: Vec<&str> = self.after.keys().map(|m| m.as_str()).collect();
        after.sort_unstable();
        f.debug_struct("Model")
            .field("table", &self.table)
            .field("schema", &self.schema)
            .field("hooks", &hooks)
            .field("after", &after)
            .finish()
    }
}

/// Returns the hook for `method` on model `name`, falling back to the
/// `default` model when `name` defines none.
#[must_use]
pub fn resolve_hook<'a>(models: &'a Models, name: &str, method: Method) -> Option<&'a Arc<dyn Hook>> {
    models
        .get(name)
        .and_then(|model| model.hook_for(method))
        .or_else(|| models.get(DEFAULT_MODEL).and_then(|model| model.hook_for(method)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_model() {
        let models: Models = serde_json::from_value(json!({
            "users": {
                "table": "tbl_users",
                "schema": {"country_id": ["country.id"], "password": false}
            },
            "country": {}
        }))
        .unwrap();
        assert_eq!(models["users"].table.as_deref(), Some("tbl_users"));
        assert!(!models["users"].schema["password"].readable());
        assert!(models["country"].schema.is_empty());
        assert_eq!(models.get_index(1).map(|(k, _)| k.as_str()), Some("country"));
    }

    #[test]
    fn test_default_hook_fallback() {
        let mut models = Models::new();
        models.insert(
            DEFAULT_MODEL.into(),
            Model::new().hook(Method::Get, |req: &mut Request| -> Result<()> {
                req.limit = Some(json!(5));
                Ok(())
            }),
        );
        models.insert("users".into(), Model::new());
        assert!(resolve_hook(&models, "users", Method::Get).is_some());
        assert!(resolve_hook(&models, "users", Method::Patch).is_none());
    }

    #[test]
    fn test_after_handler_per_verb() {
        let model = Model::new().after(Method::Del, |_| Ok(json!({"deleted": true})));
        assert!(model.after_for(Method::Get).is_none());
        let after = model.after_for(Method::Del).unwrap();
        assert_eq!(after(json!({"affected_rows": 1})).unwrap(), json!({"deleted": true}));
        assert!(format!("{model:?}").contains(r#"after: ["del"]"#));
    }
}
