//! Token types for the field expression lexer.

use super::Span;

/// The kind of a lexed token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// A run of field path characters: letters, digits, `_`, `$`, `.` and `*`.
    Word(String),
    /// A quoted literal. `quote` is the delimiter, `value` the content.
    Quoted {
        /// `'` or `"`.
        quote: char,
        /// Text between the quotes.
        value: String,
    },
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `,`
    Comma,
    /// `!` not followed by `=`.
    Bang,
    /// A comparison or arithmetic operator: `=`, `<`, `>`, `<=`, `>=`, `<>`, `!=`, `/`.
    Operator(String),
    /// `%` or `-`, which may only appear inside literals.
    Symbol(char),
    /// One or more whitespace characters.
    Whitespace,
    /// A character the grammar never accepts, or an unterminated quote.
    Error(String),
    /// End of input.
    Eof,
}

/// A token with its location in the source expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// The token kind.
    pub kind: TokenKind,
    /// Where the token sits in the source.
    pub span: Span,
}

impl Token {
    /// Creates a new token.
    #[must_use]
    pub const fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Returns true if this is the end-of-input token.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }

    /// Returns the word text if this token is a [`TokenKind::Word`].
    #[must_use]
    pub fn word(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Word(w) => Some(w),
            _ => None,
        }
    }

    /// Returns true if the token is whitespace.
    #[must_use]
    pub const fn is_whitespace(&self) -> bool {
        matches!(self.kind, TokenKind::Whitespace)
    }
}

/// Returns true for characters allowed inside a [`TokenKind::Word`].
#[must_use]
pub const fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.' | '*')
}
