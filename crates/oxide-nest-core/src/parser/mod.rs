//! Field expression parser.
//!
//! A small recursive peeling parser over the token stream produced by
//! [`crate::lexer::Lexer`].

mod error;
mod field;
mod orderby;

pub use error::ParseError;
pub use field::{is_aggregate_prefix, FieldExpr};
pub use orderby::{split_direction, Direction};
