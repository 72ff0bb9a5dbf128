//! Instance configuration.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;
use crate::schema::{FieldAttribute, Models};

/// Custom validation run for every written field. Receives the field's
/// attribute (if the schema knows it), its name and the value (`None` when an
/// insert omits a schema field).
pub type ValidateInput =
    Arc<dyn Fn(Option<&FieldAttribute>, &str, Option<&Value>) -> Result<()> + Send + Sync>;

/// Maps each reconstructed row of a read, given its index in the result set.
/// Returning `None` drops the row.
pub type RowHandler = Arc<dyn Fn(Value, usize) -> Option<Value> + Send + Sync>;

/// Compiler options.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct NestOptions {
    /// Upper bound for `limit`. Unset means unbounded.
    pub max_limit: Option<u64>,
    /// Join through a third table when two models are not directly linked.
    pub infer_intermediate_models: bool,
    /// Operators that may be expressed inside filter values: `%` (LIKE),
    /// `!` (NOT LIKE) and `~` (ranges).
    pub conditional_operators_in_value: String,
    /// Embed one-to-many relations as correlated GROUP_CONCAT sub-selects.
    pub group_concat: bool,
    /// Model descriptors.
    pub models: Models,
    /// Custom input validation for writes.
    #[serde(skip)]
    pub validate_input: Option<ValidateInput>,
    /// Per-row transform applied to read results.
    #[serde(skip)]
    pub row_handler: Option<RowHandler>,
}

impl Default for NestOptions {
    fn default() -> Self {
        Self {
            max_limit: None,
            infer_intermediate_models: true,
            conditional_operators_in_value: String::from("%!~"),
            group_concat: true,
            models: Models::new(),
            validate_input: None,
            row_handler: None,
        }
    }
}

impl NestOptions {
    /// Creates default options over the given models.
    #[must_use]
    pub fn with_models(models: Models) -> Self {
        Self {
            models,
            ..Self::default()
        }
    }

    /// Sets the input validator.
    #[must_use]
    pub fn validate_input<F>(mut self, validate: F) -> Self
    where
        F: Fn(Option<&FieldAttribute>, &str, Option<&Value>) -> Result<()> + Send + Sync + 'static,
    {
        self.validate_input = Some(Arc::new(validate));
        self
    }

    /// Sets the row handler.
    #[must_use]
    pub fn row_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(Value, usize) -> Option<Value> + Send + Sync + 'static,
    {
        self.row_handler = Some(Arc::new(handler));
        self
    }

    pub(crate) fn allows_operator(&self, operator: char) -> bool {
        self.conditional_operators_in_value.contains(operator)
    }
}

impl fmt::Debug for NestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NestOptions")
            .field("max_limit", &self.max_limit)
            .field("infer_intermediate_models", &self.infer_intermediate_models)
            .field(
                "conditional_operators_in_value",
                &self.conditional_operators_in_value,
            )
            .field("group_concat", &self.group_concat)
            .field("models", &self.models)
            .field("validate_input", &self.validate_input.is_some())
            .field("row_handler", &self.row_handler.is_some())
            .finish()
    }
}
