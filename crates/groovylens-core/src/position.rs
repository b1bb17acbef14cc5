//! Coordinate system conversions
//!
//! Two coordinate spaces exist side by side: the LSP protocol speaks
//! zero-based lines and columns, the Groovy AST speaks one-based lines and
//! columns (with `-1` marking synthetic nodes). This module is the single
//! authority for converting between the two and for range containment;
//! nothing else in the crate compares raw coordinates.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A position in LSP space: zero-based line and column.
///
/// Fields are signed so malformed client input (negative coordinates) can be
/// carried to the validation boundary instead of panicking at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Zero-based line
    pub line: i32,
    /// Zero-based column (UTF-16 code units per LSP)
    pub character: i32,
}

impl Position {
    /// Create a new LSP position
    pub fn new(line: i32, character: i32) -> Self {
        Self { line, character }
    }

    /// Whether both coordinates are non-negative
    pub fn is_valid(&self) -> bool {
        self.line >= 0 && self.character >= 0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.character)
    }
}

/// A position in source-AST space: one-based line and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourcePosition {
    /// One-based line
    pub line: i32,
    /// One-based column
    pub column: i32,
}

impl SourcePosition {
    /// Create a new source position
    pub fn new(line: i32, column: i32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Convert an LSP position to source-AST space
pub fn lsp_to_source(position: Position) -> SourcePosition {
    SourcePosition::new(position.line + 1, position.character + 1)
}

/// Convert a source-AST position to LSP space
pub fn source_to_lsp(position: SourcePosition) -> Position {
    Position::new(position.line - 1, position.column - 1)
}

/// Source location of an AST node, one-based, inclusive on both ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    /// Starting line (1-indexed)
    pub start_line: i32,
    /// Starting column (1-indexed)
    pub start_column: i32,
    /// Ending line (1-indexed)
    pub end_line: i32,
    /// Ending column (1-indexed, exclusive)
    pub end_column: i32,
}

impl Span {
    /// Create a new span
    pub fn new(start_line: i32, start_column: i32, end_line: i32, end_column: i32) -> Self {
        Self {
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }

    /// Span used by parsers for nodes without a real source location
    pub fn synthetic() -> Self {
        Self::new(-1, -1, -1, -1)
    }

    /// Start of the span as a source position
    pub fn start(&self) -> SourcePosition {
        SourcePosition::new(self.start_line, self.start_column)
    }

    /// End of the span as a source position
    pub fn end(&self) -> SourcePosition {
        SourcePosition::new(self.end_line, self.end_column)
    }

    /// Whether the span covers a single line
    pub fn is_single_line(&self) -> bool {
        self.start_line == self.end_line
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{}:{}",
            self.start_line, self.start_column, self.end_line, self.end_column
        )
    }
}

/// Whether a span carries a real source location: all four coordinates
/// strictly positive.
pub fn span_is_valid(span: &Span) -> bool {
    span.start_line > 0 && span.start_column > 0 && span.end_line > 0 && span.end_column > 0
}

/// Whether a span contains a source position.
///
/// The end column is exclusive: a cursor sitting immediately after the last
/// character of an identifier still hits it, matching editor behavior.
pub fn span_contains(span: &Span, position: SourcePosition) -> bool {
    if position.line < span.start_line || position.line > span.end_line {
        return false;
    }
    if position.line == span.start_line && position.column < span.start_column {
        return false;
    }
    if position.line == span.end_line && position.column > span.end_column {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_law() {
        for line in 0..20 {
            for character in 0..20 {
                let p = Position::new(line, character);
                assert_eq!(source_to_lsp(lsp_to_source(p)), p);
            }
        }
    }

    #[test]
    fn test_conversion_offsets() {
        assert_eq!(
            lsp_to_source(Position::new(0, 0)),
            SourcePosition::new(1, 1)
        );
        assert_eq!(
            source_to_lsp(SourcePosition::new(1, 1)),
            Position::new(0, 0)
        );
    }

    #[test]
    fn test_span_validity() {
        assert!(span_is_valid(&Span::new(1, 1, 1, 5)));
        assert!(!span_is_valid(&Span::synthetic()));
        assert!(!span_is_valid(&Span::new(1, 0, 1, 5)));
        assert!(!span_is_valid(&Span::new(0, 1, 1, 5)));
    }

    #[test]
    fn test_contains_single_line() {
        let span = Span::new(2, 5, 2, 10);
        assert!(span_contains(&span, SourcePosition::new(2, 5)));
        assert!(span_contains(&span, SourcePosition::new(2, 7)));
        assert!(span_contains(&span, SourcePosition::new(2, 10)));
        assert!(!span_contains(&span, SourcePosition::new(2, 4)));
        assert!(!span_contains(&span, SourcePosition::new(2, 11)));
        assert!(!span_contains(&span, SourcePosition::new(1, 7)));
        assert!(!span_contains(&span, SourcePosition::new(3, 7)));
    }

    #[test]
    fn test_contains_multi_line() {
        let span = Span::new(1, 10, 4, 2);
        assert!(span_contains(&span, SourcePosition::new(2, 1)));
        assert!(span_contains(&span, SourcePosition::new(3, 80)));
        assert!(span_contains(&span, SourcePosition::new(1, 10)));
        assert!(span_contains(&span, SourcePosition::new(4, 2)));
        assert!(!span_contains(&span, SourcePosition::new(1, 9)));
        assert!(!span_contains(&span, SourcePosition::new(4, 3)));
    }

    #[test]
    fn test_position_validity() {
        assert!(Position::new(0, 0).is_valid());
        assert!(!Position::new(-1, 0).is_valid());
        assert!(!Position::new(0, -3).is_valid());
    }
}
