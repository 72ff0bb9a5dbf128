//! Schema model: field attributes, models and lifecycle hooks.

mod field;
mod model;

pub use field::{FieldAttribute, FieldType, Generated, GeneratedHandler, Transform};
pub use model::{resolve_hook, After, Hook, Method, Model, Models, Schema, DEFAULT_MODEL};
