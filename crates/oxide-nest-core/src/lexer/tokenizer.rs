//! Field expression tokenizer implementation.

use super::token::is_word_char;
use super::{Span, Token, TokenKind};

/// A lexer that tokenizes a single field expression.
pub struct Lexer<'a> {
    /// The input expression.
    input: &'a str,
    /// The current byte position.
    pos: usize,
    /// The byte position of the start of the current token.
    start: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input.
    #[must_use]
    pub const fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            start: 0,
        }
    }

    /// Returns the current character without advancing.
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    /// Advances to the next character and returns it.
    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Advances while `pred` holds.
    fn advance_while(&mut self, pred: impl Fn(char) -> bool) {
        while self.peek().is_some_and(&pred) {
            self.advance();
        }
    }

    /// Creates a token spanning from the token start to the current position.
    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(kind, Span::new(self.start, self.pos))
    }

    /// Scans a quoted literal. The opening quote has been consumed.
    fn scan_quoted(&mut self, quote: char) -> Token {
        let content_start = self.pos;
        loop {
            match self.advance() {
                Some(c) if c == quote => break,
                Some(_) => {}
                None => {
                    return self.make_token(TokenKind::Error(String::from(
                        "Unterminated quoted literal",
                    )));
                }
            }
        }
        let value = self.input[content_start..self.pos - quote.len_utf8()].to_string();
        self.make_token(TokenKind::Quoted { quote, value })
    }

    /// Scans the next token.
    #[must_use]
    pub fn next_token(&mut self) -> Token {
        self.start = self.pos;

        let Some(c) = self.advance() else {
            return self.make_token(TokenKind::Eof);
        };

        match c {
            '(' => self.make_token(TokenKind::LeftParen),
            ')' => self.make_token(TokenKind::RightParen),
            ',' => self.make_token(TokenKind::Comma),
            '%' | '-' => self.make_token(TokenKind::Symbol(c)),
            '/' | '=' => self.make_token(TokenKind::Operator(c.to_string())),
            '!' => {
                if self.peek() == Some('=') {
                    self.advance();
                    self.make_token(TokenKind::Operator(String::from("!=")))
                } else {
                    self.make_token(TokenKind::Bang)
                }
            }
            '<' => {
                if matches!(self.peek(), Some('=' | '>')) {
                    self.advance();
                }
                let op = self.input[self.start..self.pos].to_string();
                self.make_token(TokenKind::Operator(op))
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.advance();
                }
                let op = self.input[self.start..self.pos].to_string();
                self.make_token(TokenKind::Operator(op))
            }
            '\'' | '"' => self.scan_quoted(c),
            c if c.is_whitespace() => {
                self.advance_while(char::is_whitespace);
                self.make_token(TokenKind::Whitespace)
            }
            c if is_word_char(c) => {
                self.advance_while(is_word_char);
                let word = self.input[self.start..self.pos].to_string();
                self.make_token(TokenKind::Word(word))
            }
            _ => self.make_token(TokenKind::Error(format!("Unexpected character: {c}"))),
        }
    }

    /// Tokenizes the entire input. The final token is always [`TokenKind::Eof`].
    #[must_use]
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let is_eof = token.is_eof();
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }
}
