//! # oxide-nest
//!
//! Compiles nested, declarative requests into a single MySQL statement and
//! rebuilds the flat result rows into the requested nested shape.
//!
//! This crate provides:
//! - `Nest`, the entry point with the `get`, `get_count`, `patch`, `post`
//!   and `del` verbs
//! - `Request`, the nested request surface
//! - `NestOptions` and `Models` for table names, field schemas and hooks
//! - The `Execute` trait statements run through, plus `MySqlExecutor`
//!   behind the `mysql` feature
//!
//! ## Quick Start
//!
//! ```ignore
//! use oxide_nest::{Nest, NestOptions, Request};
//! use serde_json::json;
//!
//! async fn example(executor: oxide_nest::MySqlExecutor) -> oxide_nest::Result<()> {
//!     let options: NestOptions = serde_json::from_value(json!({
//!         "models": {
//!             "users": {"table": "tbl_users"},
//!             "posts": {"schema": {"user_id": ["users.id"]}}
//!         }
//!     }))?;
//!     let nest = Nest::new(options).with_executor(executor);
//!
//!     // One user with the titles of their posts
//!     let user = nest
//!         .get(
//!             Request::new("users")
//!                 .fields(json!(["id", "name", {"posts": ["id", "title"]}]))
//!                 .filter(json!({"id": 1})),
//!         )
//!         .await?;
//!
//!     // Posts whose author is called Andrew
//!     let posts = nest
//!         .get(
//!             Request::new("posts")
//!                 .fields(json!(["title", {"author": "users.name"}]))
//!                 .filter(json!({"users": {"name": "Andrew%"}}))
//!                 .limit(10),
//!         )
//!         .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## How a read is compiled
//!
//! The request is normalized into one node per table. Nested fields and
//! filters decide how each relation is compiled:
//!
//! - one-to-many relations that only add fields become correlated
//!   sub-selects packed with `GROUP_CONCAT`
//! - relations prefixed with `-` become `NOT EXISTS (...)` conditions
//! - everything else is a `LEFT JOIN`, or a `JOIN` when the relation is
//!   required
//!
//! Packed columns are labelled `posts[id,title]`, which the reconstructor
//! reads back into arrays of objects.

pub mod compile;
mod error;
mod executor;
pub mod format;
#[cfg(feature = "mysql")]
mod mysql;
mod nest;
mod options;
mod request;
pub mod response;
pub mod schema;
pub mod tree;
pub mod validate;
pub mod value;
pub mod write;

pub use error::{status_for_code, NestError, Result};
pub use executor::{Affected, Execute, Execution, Query, QueryKind, Row};
#[cfg(feature = "mysql")]
pub use mysql::MySqlExecutor;
pub use nest::Nest;
pub use options::{NestOptions, RowHandler, ValidateInput};
pub use request::{NotFound, NotFoundHandler, Request};
pub use schema::{After, FieldAttribute, FieldType, Generated, Method, Model, Models, Schema};

// Re-export the bound value type from oxide-nest-core
pub use oxide_nest_core::SqlValue;
