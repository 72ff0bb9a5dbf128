//! Parser error types.

use crate::lexer::{Span, TokenKind};

/// A field expression parse error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// The error message.
    pub message: String,
    /// The location of the error.
    pub span: Span,
}

impl ParseError {
    /// Creates a new parse error.
    #[must_use]
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }

    /// Creates an "unexpected token" error.
    #[must_use]
    pub fn unexpected(found: &TokenKind, span: Span) -> Self {
        Self::new(format!("Unexpected token {found:?}"), span)
    }

    /// Creates an error for a literal argument that is neither quoted nor
    /// an upper-case keyword.
    #[must_use]
    pub fn unquoted_literal(literal: &str, span: Span) -> Self {
        Self::new(format!("Unquoted literal '{literal}'"), span)
    }
}

impl core::fmt::Display for ParseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{} at position {}..{}",
            self.message, self.span.start, self.span.end
        )
    }
}

impl std::error::Error for ParseError {}
