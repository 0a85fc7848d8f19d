//! Source positions and spans.
//!
//! Every token and AST node carries a [`Span`] so that later phases (the
//! parser, the loader, the type inferencer) can report diagnostics that
//! point at an exact byte range in the original source text.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single point in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Location {
    /// Byte offset from the start of the file.
    pub offset: usize,
    /// Line number, 1-based.
    pub line: usize,
    /// Column number, 1-based.
    pub column: usize,
}

impl Location {
    pub fn new(offset: usize, line: usize, column: usize) -> Self {
        Self {
            offset,
            line,
            column,
        }
    }

    /// The location a fresh scanner starts at: offset 0, line 1, column 1.
    pub fn start() -> Self {
        Self::new(0, 1, 1)
    }
}

/// An ordered, end-exclusive byte range with the line/column of both ends.
///
/// `start.offset < end.offset` holds for every non-empty span produced by
/// the lexer; a span covering zero bytes (e.g. the synthetic EOF token) has
/// `start == end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Span {
    pub start: Location,
    pub end: Location,
}

impl Span {
    pub fn new(start: Location, end: Location) -> Self {
        Self { start, end }
    }

    /// Merges two spans into one that covers both, taking the earlier start
    /// and the later end.
    pub fn merge(&self, other: &Span) -> Span {
        let (start, end) = if self.start.offset <= other.start.offset {
            (self.start, other.end)
        } else {
            (other.start, self.end)
        };
        Span { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.offset.saturating_sub(self.start.offset)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
