#![allow(dead_code)]

use oxide_nest_core::{FieldExpr, ParseError};

pub fn parse(input: &str) -> FieldExpr {
    FieldExpr::parse(input).unwrap_or_else(|e| panic!("Failed to parse: {input}\nError: {e:?}"))
}

pub fn parse_err(input: &str) -> ParseError {
    FieldExpr::parse(input).expect_err(&format!("Expected parse error for: {input}"))
}

/// Asserts that `prefix + field + suffix` reproduces the input.
pub fn assert_round_trip(input: &str) {
    let expr = parse(input);
    assert_eq!(
        format!("{}{}{}", expr.prefix, expr.field, expr.suffix),
        input,
        "round trip of {input}"
    );
}
