//! `ORDER BY` direction handling.

use core::fmt;

/// Sort direction of an `ORDER BY` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `ASC`
    Asc,
    /// `DESC`
    Desc,
}

impl Direction {
    /// Returns the SQL keyword.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Splits a trailing ` ASC` or ` DESC` (any case) off an order entry.
///
/// The keyword must be separated from the expression by whitespace, so a
/// column named `created_desc` keeps its name.
#[must_use]
pub fn split_direction(entry: &str) -> (&str, Option<Direction>) {
    let trimmed = entry.trim_end();
    for direction in [Direction::Desc, Direction::Asc] {
        let keyword = direction.as_str();
        if trimmed.len() <= keyword.len() {
            continue;
        }
        let (head, tail) = trimmed.split_at(trimmed.len() - keyword.len());
        if tail.eq_ignore_ascii_case(keyword) && head.ends_with(char::is_whitespace) {
            return (head.trim_end(), Some(direction));
        }
    }
    (entry, None)
}
