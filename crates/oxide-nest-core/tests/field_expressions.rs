mod common;

use common::{assert_round_trip, parse, parse_err};

#[test]
fn test_round_trip_of_valid_expressions() {
    for input in [
        "id",
        "author.name",
        "post.*",
        "COUNT(*)",
        "COUNT(DISTINCT comments.id)",
        "DATE_FORMAT(created, '%Y-%m-%d')",
        "GROUP_CONCAT(DISTINCT tag.name ORDER BY 1)",
        "GROUP_CONCAT(name, '-')",
        "IF(status = 'open', 1, 0)",
        "SUM(price * 100)",
        "ROUND(AVG(score), 2)",
        "EXTRACT(YEAR_MONTH FROM created)",
        "!ISNULL(deleted)",
        "NOW()",
        "COALESCE(nickname, '')",
        "LEFT(description, 10)",
    ] {
        assert_round_trip(input);
    }
}

#[test]
fn test_nested_wrappers_reach_the_column() {
    let expr = parse("ROUND(AVG(comments.score), 2)");
    assert_eq!(expr.field, "comments.score");
    assert_eq!(expr.path, "comments");
    assert_eq!(expr.name, "score");
    assert_eq!(expr.prefix, "ROUND(AVG(");
    assert_eq!(expr.suffix, "), 2)");
    assert!(expr.is_aggregate());
}

#[test]
fn test_comparison_inside_if() {
    let expr = parse("IF(status = 'open', 1, 0)");
    assert_eq!(expr.field, "status");
    assert_eq!(expr.suffix, " = 'open', 1, 0)");
}

#[test]
fn test_rejects_lowercase_unquoted_argument() {
    let err = parse_err("IFNULL(name, nickname)");
    assert!(err.message.contains("nickname"));
}

#[test]
fn test_rejects_injection_attempts() {
    for input in [
        "id; DROP TABLE users",
        "id -- comment",
        "SLEEP(1) OR 1",
        "name'",
        "DATE_FORMAT(created, '%Y:%m')",
        "CONCAT(a)b",
    ] {
        parse_err(input);
    }
}

#[test]
fn test_error_position() {
    let err = parse_err("a;b");
    assert_eq!(err.span.start, 1);
    assert!(err.to_string().contains("at position 1..2"));
}
