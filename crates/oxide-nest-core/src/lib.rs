//! # oxide-nest-core
//!
//! Dependency-free building blocks shared by the `oxide-nest` compiler:
//!
//! - A lexer and peeling parser for field expressions such as
//!   `COUNT(DISTINCT comments.id)`
//! - `ORDER BY` direction splitting
//! - The [`SqlValue`] type bound to `?` placeholders
//!
//! ## Field expressions
//!
//! ```rust
//! use oxide_nest_core::FieldExpr;
//!
//! let expr = FieldExpr::parse("DATE_FORMAT(post.created, '%Y')").unwrap();
//! assert_eq!(expr.field, "post.created");
//! assert_eq!(expr.prefix, "DATE_FORMAT(");
//! assert_eq!(expr.suffix, ", '%Y')");
//! assert_eq!(expr.rewrap("created"), "DATE_FORMAT(created, '%Y')");
//! ```

pub mod lexer;
pub mod parser;
pub mod value;

pub use lexer::{Lexer, Span, Token, TokenKind};
pub use parser::{is_aggregate_prefix, split_direction, Direction, FieldExpr, ParseError};
pub use value::SqlValue;
