//! Byte ranges into the expression being lexed.

/// A half-open byte range `start..end` into the source expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// Start byte offset (inclusive).
    pub start: usize,
    /// End byte offset (exclusive).
    pub end: usize,
}

impl Span {
    /// Creates a new span.
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Returns the length of the span in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns true if the span is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Returns the text covered by this span.
    #[must_use]
    pub fn slice<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_slice() {
        let span = Span::new(6, 8);
        assert_eq!(span.slice("COUNT(id)"), "id");
        assert_eq!(span.len(), 2);
    }

    #[test]
    fn test_empty_span() {
        let span = Span::new(4, 4);
        assert!(span.is_empty());
        assert_eq!(span.slice("NOW()"), "");
    }
}
