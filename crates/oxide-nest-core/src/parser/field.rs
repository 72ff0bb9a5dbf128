//! Field expression parser.
//!
//! A field expression is a column path optionally wrapped in SQL function
//! calls, e.g. `COUNT(DISTINCT author.id)` or
//! `DATE_FORMAT(created, '%Y-%m')`. Parsing peels wrappers from the outside
//! in until only the column path is left; everything peeled off the left is
//! the prefix and everything peeled off the right is the suffix, so
//! `prefix + field + suffix` always reproduces the input.

use crate::lexer::{Lexer, Span, Token, TokenKind};

use super::ParseError;

/// Aggregate functions recognised in an expression prefix.
const AGGREGATES: [&str; 6] = ["SUM", "COUNT", "AVG", "MAX", "MIN", "GROUP_CONCAT"];

/// A parsed field expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldExpr {
    /// The bare column path, e.g. `author.id`. May be empty (`COUNT()`).
    pub field: String,
    /// The last segment of `field`.
    pub name: String,
    /// Everything in `field` before the last `.`.
    pub path: String,
    /// Function wrappers and modifiers to the left of `field`.
    pub prefix: String,
    /// Arguments, operators and closing parentheses to the right of `field`.
    pub suffix: String,
}

impl FieldExpr {
    /// Parses a field expression.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] when the expression does not reduce to a
    /// plain column path, or carries an unquoted lower-case literal argument.
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let tokens: Vec<Token> = Lexer::new(input)
            .tokenize()
            .into_iter()
            .filter(|t| !t.is_eof())
            .collect();

        if let Some(error) = tokens.iter().find_map(|t| match &t.kind {
            TokenKind::Error(message) => Some(ParseError::new(message.clone(), t.span)),
            _ => None,
        }) {
            return Err(error);
        }

        let mut cursor = Cursor {
            input,
            tokens: &tokens,
            lo: 0,
            hi: tokens.len(),
            prefix_end: 0,
            suffix_start: input.len(),
        };

        while cursor.peel_function() {
            cursor.strip_order_by();
            cursor.strip_literal_arguments()?;
            cursor.strip_operator();
        }

        let negated = cursor.strip_bang();
        if negated || cursor.prefix_end > 0 {
            cursor.strip_keywords();
        }

        let field = match &tokens[cursor.lo..cursor.hi] {
            [] => "",
            [token] => token.word().ok_or_else(|| ParseError::unexpected(&token.kind, token.span))?,
            [_, token, ..] => return Err(ParseError::unexpected(&token.kind, token.span)),
        };

        let (path, name) = match field.rfind('.') {
            Some(i) => (&field[..i], &field[i + 1..]),
            None => ("", field),
        };

        Ok(Self {
            field: field.to_string(),
            name: name.to_string(),
            path: path.to_string(),
            prefix: input[..cursor.prefix_end].to_string(),
            suffix: input[cursor.suffix_start..].to_string(),
        })
    }

    /// Wraps another column path in this expression's prefix and suffix.
    #[must_use]
    pub fn rewrap(&self, field: &str) -> String {
        format!("{}{}{}", self.prefix, field, self.suffix)
    }

    /// Returns true if the prefix calls an aggregate function.
    #[must_use]
    pub fn is_aggregate(&self) -> bool {
        is_aggregate_prefix(&self.prefix)
    }
}

/// Returns true if `prefix` contains a call to `SUM`, `COUNT`, `AVG`, `MAX`,
/// `MIN` or `GROUP_CONCAT` at a word boundary.
#[must_use]
pub fn is_aggregate_prefix(prefix: &str) -> bool {
    let upper = prefix.to_ascii_uppercase();
    AGGREGATES.iter().any(|name| {
        let needle = format!("{name}(");
        upper.match_indices(&needle).any(|(i, _)| {
            upper[..i]
                .chars()
                .next_back()
                .is_none_or(|c| !(c.is_ascii_alphanumeric() || c == '_'))
        })
    })
}

/// Token window over the part of the expression not yet peeled.
struct Cursor<'a> {
    input: &'a str,
    tokens: &'a [Token],
    lo: usize,
    hi: usize,
    prefix_end: usize,
    suffix_start: usize,
}

impl<'a> Cursor<'a> {
    fn window(&self) -> &'a [Token] {
        &self.tokens[self.lo..self.hi]
    }

    fn take_left(&mut self, count: usize) {
        self.lo += count;
        self.prefix_end = self.tokens[self.lo - 1].span.end;
    }

    fn take_right(&mut self, count: usize) {
        self.hi -= count;
        self.suffix_start = self.tokens[self.hi].span.start;
    }

    fn text(&self, span: Span) -> &'a str {
        span.slice(self.input)
    }

    /// Peels `[!]NAME(` from the left and `)` from the right.
    fn peel_function(&mut self) -> bool {
        let window = self.window();
        let offset = usize::from(matches!(window.first().map(|t| &t.kind), Some(TokenKind::Bang)));
        let is_name = window.get(offset).and_then(Token::word).is_some_and(|w| {
            w.chars().all(|c| c.is_ascii_alphabetic() || c == '_')
        });
        let opens = matches!(window.get(offset + 1).map(|t| &t.kind), Some(TokenKind::LeftParen));
        let closes = window.len() > offset + 2
            && matches!(window.last().map(|t| &t.kind), Some(TokenKind::RightParen));

        if !(is_name && opens && closes) {
            return false;
        }
        self.take_left(offset + 2);
        self.take_right(1);
        true
    }

    /// Strips a trailing ` ORDER BY 1` (and any whitespace after it).
    fn strip_order_by(&mut self) {
        let window = self.window();
        let trailing = usize::from(window.last().is_some_and(Token::is_whitespace));
        let end = window.len() - trailing;
        if end < 6 {
            return;
        }
        let tail = &window[end - 6..end];
        let matches = tail[0].is_whitespace()
            && tail[1].word() == Some("ORDER")
            && self.text(tail[2].span) == " "
            && tail[3].word() == Some("BY")
            && self.text(tail[4].span) == " "
            && tail[5].word() == Some("1");
        if matches {
            self.take_right(6 + trailing);
        }
    }

    /// Strips trailing `, literal` arguments, innermost last.
    fn strip_literal_arguments(&mut self) -> Result<(), ParseError> {
        loop {
            let window = self.window();
            let Some(comma) = window
                .iter()
                .rposition(|t| matches!(t.kind, TokenKind::Comma))
            else {
                return Ok(());
            };
            let argument = &window[comma + 1..];
            let literal: Vec<&Token> = argument.iter().filter(|t| !t.is_whitespace()).collect();

            let accepted = match literal.as_slice() {
                [Token {
                    kind: TokenKind::Quoted { value, .. },
                    ..
                }] => argument.last().is_some_and(|t| !t.is_whitespace()) && is_literal_text(value),
                _ => {
                    if !argument.iter().all(is_unquoted_literal_token) {
                        return Ok(());
                    }
                    let start = window[comma].span.end;
                    let end = argument.last().map_or(start, |t| t.span.end);
                    let text = &self.input[start..end];
                    if text.chars().any(|c| c.is_ascii_lowercase()) {
                        return Err(ParseError::unquoted_literal(
                            text.trim(),
                            Span::new(start, end),
                        ));
                    }
                    true
                }
            };
            if !accepted {
                return Ok(());
            }
            self.take_right(window.len() - comma);
        }
    }

    /// Strips one trailing ` <op> <number|quoted>` comparison.
    fn strip_operator(&mut self) {
        let window = self.window();
        if window.len() < 4 {
            return;
        }
        let tail = &window[window.len() - 4..];
        let single_space = |t: &Token| t.is_whitespace() && t.span.len() == 1;
        let is_operator = matches!(tail[1].kind, TokenKind::Operator(_)) || tail[1].word() == Some("*");
        let is_value = match &tail[3].kind {
            TokenKind::Word(w) => w.chars().all(|c| c.is_ascii_digit() || c == '.'),
            TokenKind::Quoted { value, .. } => is_literal_text(value),
            _ => false,
        };
        if single_space(&tail[0]) && is_operator && single_space(&tail[2]) && is_value {
            self.take_right(4);
        }
    }

    /// Moves a leading `!` into the prefix.
    fn strip_bang(&mut self) -> bool {
        if matches!(self.window().first().map(|t| &t.kind), Some(TokenKind::Bang)) {
            self.take_left(1);
            return true;
        }
        false
    }

    /// Moves leading upper-case keywords, such as `DISTINCT ` or
    /// `YEAR_MONTH FROM `, into the prefix.
    fn strip_keywords(&mut self) {
        let keyword_run = self
            .window()
            .iter()
            .take_while(|t| {
                t.is_whitespace()
                    || t.word().is_some_and(|w| {
                        w.chars().all(|c| c.is_ascii_uppercase() || c == '_')
                    })
            })
            .count();
        let last_space = self.window()[..keyword_run]
            .iter()
            .rposition(Token::is_whitespace);
        if let Some(i) = last_space {
            self.take_left(i + 1);
        }
    }
}

fn is_literal_text(text: &str) -> bool {
    text.chars()
        .all(|c| c.is_ascii_alphanumeric() || c.is_whitespace() || matches!(c, '%' | '.' | '_' | '-'))
}

fn is_unquoted_literal_token(token: &Token) -> bool {
    match &token.kind {
        TokenKind::Word(w) => w.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_')),
        TokenKind::Whitespace | TokenKind::Symbol(_) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(input: &str) -> (String, String, String) {
        let expr = FieldExpr::parse(input).unwrap();
        (expr.prefix, expr.field, expr.suffix)
    }

    #[test]
    fn test_plain_field() {
        let expr = FieldExpr::parse("author.name").unwrap();
        assert_eq!(expr.field, "author.name");
        assert_eq!(expr.name, "name");
        assert_eq!(expr.path, "author");
        assert_eq!(expr.prefix, "");
        assert_eq!(expr.suffix, "");
    }

    #[test]
    fn test_nested_functions() {
        assert_eq!(
            parts("COUNT(DISTINCT comments.id)"),
            ("COUNT(DISTINCT ".into(), "comments.id".into(), ")".into())
        );
        assert_eq!(
            parts("MAX(IFNULL(score))"),
            ("MAX(IFNULL(".into(), "score".into(), "))".into())
        );
    }

    #[test]
    fn test_literal_arguments() {
        assert_eq!(
            parts("DATE_FORMAT(created, '%Y-%m')"),
            ("DATE_FORMAT(".into(), "created".into(), ", '%Y-%m')".into())
        );
        assert_eq!(
            parts("IF(active, 1, 0)"),
            ("IF(".into(), "active".into(), ", 1, 0)".into())
        );
    }

    #[test]
    fn test_unquoted_lowercase_literal_is_rejected() {
        assert!(FieldExpr::parse("CONCAT(first, last)").is_err());
    }

    #[test]
    fn test_operator_suffix() {
        assert_eq!(
            parts("SUM(amount * 100)"),
            ("SUM(".into(), "amount".into(), " * 100)".into())
        );
        assert_eq!(
            parts("IF(status = 'open')"),
            ("IF(".into(), "status".into(), " = 'open')".into())
        );
    }

    #[test]
    fn test_order_by_suffix() {
        assert_eq!(
            parts("GROUP_CONCAT(DISTINCT tag ORDER BY 1)"),
            ("GROUP_CONCAT(DISTINCT ".into(), "tag".into(), " ORDER BY 1)".into())
        );
    }

    #[test]
    fn test_extract_keywords() {
        assert_eq!(
            parts("EXTRACT(YEAR_MONTH FROM created)"),
            ("EXTRACT(YEAR_MONTH FROM ".into(), "created".into(), ")".into())
        );
    }

    #[test]
    fn test_negation() {
        assert_eq!(
            parts("!ISNULL(deleted)"),
            ("!ISNULL(".into(), "deleted".into(), ")".into())
        );
        assert_eq!(parts("!flag"), ("!".into(), "flag".into(), "".into()));
    }

    #[test]
    fn test_empty_core() {
        assert_eq!(parts("NOW()"), ("NOW(".into(), "".into(), ")".into()));
    }

    #[test]
    fn test_keywords_need_a_wrapper() {
        assert!(FieldExpr::parse("DISTINCT id").is_err());
    }

    #[test]
    fn test_invalid_expressions() {
        for input in ["a;b", "id, name", "SUM(a) + 1", "'quoted'", "a b", "(id)"] {
            assert!(FieldExpr::parse(input).is_err(), "{input} should fail");
        }
    }

    #[test]
    fn test_aggregate_detection() {
        assert!(FieldExpr::parse("COUNT(id)").unwrap().is_aggregate());
        assert!(FieldExpr::parse("group_concat(id)").unwrap().is_aggregate());
        assert!(!FieldExpr::parse("ACCOUNT(id)").unwrap().is_aggregate());
        assert!(!FieldExpr::parse("id").unwrap().is_aggregate());
    }

    #[test]
    fn test_rewrap() {
        let expr = FieldExpr::parse("DATE(created)").unwrap();
        assert_eq!(expr.rewrap("updated"), "DATE(updated)");
    }
}
