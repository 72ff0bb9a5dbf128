//! Field expression lexer.
//!
//! Splits a field expression such as `COUNT(DISTINCT author.id)` into a flat
//! stream of tokens. Whitespace is kept as a token because the expression
//! grammar is whitespace sensitive.

mod span;
mod token;
mod tokenizer;

pub use span::Span;
pub use token::{Token, TokenKind};
pub use tokenizer::Lexer;
