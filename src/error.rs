//! Diagnostics for every phase of the front-end.
//!
//! Each phase (lexer, parser, loader, type inferencer) has its own error
//! enum so call sites can match on precise variants; all of them convert
//! into the single [`Diagnostic`] currency that [`ErrorCollector`]
//! accumulates and that defines the rendering below.

use thiserror::Error;

use crate::span::{Location, Span};

/// Errors produced while scanning source text into tokens (C4).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexError {
    #[error("unexpected character '{ch}'")]
    UnexpectedChar { ch: char, span: Span },

    #[error("unterminated string literal")]
    UnterminatedString { span: Span },

    #[error("unterminated block comment")]
    UnterminatedComment { span: Span },

    #[error("invalid escape sequence '\\{ch}'")]
    InvalidEscape { ch: char, span: Span },

    /// A duration suffix didn't match `{ns, us, ms, s, min, hr}`, or the
    /// character right after it was a letter/digit/underscore.
    #[error("invalid duration unit '{unit}'")]
    InvalidDurationUnit { unit: String, span: Span },
}

impl LexError {
    pub fn span(&self) -> Span {
        match self {
            LexError::UnexpectedChar { span, .. }
            | LexError::UnterminatedString { span }
            | LexError::UnterminatedComment { span }
            | LexError::InvalidEscape { span, .. }
            | LexError::InvalidDurationUnit { span, .. } => *span,
        }
    }
}

/// Errors produced while building the AST from a token stream (C5).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("expected {expected}, found {found}")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("unclosed '{delimiter}'")]
    UnclosedDelimiter { delimiter: String, span: Span },

    /// Chaining a non-associative operator at the same precedence level
    ///.
    #[error("non-associative operator '{op}' cannot be chained")]
    NonAssociativeChain { op: String, span: Span },

    #[error("{message}")]
    Invalid { message: String, span: Span },

    #[error(transparent)]
    Lex(#[from] LexError),
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::UnexpectedToken { span, .. }
            | ParseError::UnclosedDelimiter { span, .. }
            | ParseError::NonAssociativeChain { span, .. }
            | ParseError::Invalid { span, .. } => *span,
            ParseError::Lex(e) => e.span(),
        }
    }
}

/// Errors produced while resolving imports and cross-file/local names (C7).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error("duplicate declaration '{name}'")]
    DuplicateLocal { name: String, span: Span },

    #[error("circular import: {path}")]
    ImportCycle { path: String, span: Span },

    #[error("file not found: {path}")]
    FileNotFound { path: String, span: Span },

    #[error("import item '{item}' not found in {path}")]
    ImportItemNotFound {
        item: String,
        path: String,
        span: Span,
    },

    #[error("import alias '{name}' collides with an existing binding")]
    AliasCollision { name: String, span: Span },

    #[error("maximum import depth exceeded")]
    MaxDepthExceeded { span: Span },
}

impl ResolveError {
    pub fn span(&self) -> Span {
        match self {
            ResolveError::DuplicateLocal { span, .. }
            | ResolveError::ImportCycle { span, .. }
            | ResolveError::FileNotFound { span, .. }
            | ResolveError::ImportItemNotFound { span, .. }
            | ResolveError::AliasCollision { span, .. }
            | ResolveError::MaxDepthExceeded { span } => *span,
        }
    }
}

/// Errors produced by the type inferencer (C8).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TypeError {
    #[error("unresolved type name '{name}'")]
    UnresolvedType { name: String, span: Span },

    #[error("'{name}' is not defined")]
    Undefined { name: String, span: Span },

    #[error("expected {expected} argument(s), found {found}")]
    ArityMismatch {
        expected: usize,
        found: usize,
        span: Span,
    },

    #[error("expected type {expected}, found {found}")]
    Mismatch {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("condition must be numeric, found {found}")]
    NonNumericCondition { found: String, span: Span },

    #[error("left-hand side of 'set' must be a reference, found {found}")]
    NonRefSetTarget { found: String, span: Span },

    #[error("cannot sample a non-Outcomes value of type {found}")]
    NonOutcomesSample { found: String, span: Span },

    #[error("cannot index an Outcomes value directly; use sample first")]
    IndexingOutcomes { span: Span },

    #[error("tuple index must be an integer literal")]
    NonLiteralTupleIndex { span: Span },

    #[error("indexing requires an Int key, found {found}")]
    NonIntIndex { found: String, span: Span },

    #[error("'{name}' has no member '{member}'")]
    NoSuchMember { name: String, member: String, span: Span },

    #[error("return outside of a method")]
    ReturnOutsideMethod { span: Span },

    #[error("parameter '{name}' needs a type annotation or a default value")]
    ParamNeedsTypeOrDefault { name: String, span: Span },

    #[error("component '{name}' not found")]
    UnknownComponent { name: String, span: Span },

    #[error("override target '{name}' is not a parameter or dependency of '{component}'")]
    UnknownOverrideTarget { name: String, component: String, span: Span },

    #[error("distribute branches must share a common type")]
    DistributeTypeMismatch { span: Span },

    #[error("{message}")]
    Other { message: String, span: Span },
}

impl TypeError {
    pub fn span(&self) -> Span {
        match self {
            TypeError::UnresolvedType { span, .. }
            | TypeError::Undefined { span, .. }
            | TypeError::ArityMismatch { span, .. }
            | TypeError::Mismatch { span, .. }
            | TypeError::NonNumericCondition { span, .. }
            | TypeError::NonRefSetTarget { span, .. }
            | TypeError::NonOutcomesSample { span, .. }
            | TypeError::IndexingOutcomes { span }
            | TypeError::NonLiteralTupleIndex { span }
            | TypeError::NonIntIndex { span, .. }
            | TypeError::NoSuchMember { span, .. }
            | TypeError::ReturnOutsideMethod { span }
            | TypeError::ParamNeedsTypeOrDefault { span, .. }
            | TypeError::UnknownComponent { span, .. }
            | TypeError::UnknownOverrideTarget { span, .. }
            | TypeError::DistributeTypeMismatch { span }
            | TypeError::Other { span, .. } => *span,
        }
    }
}

/// Reserved for invariant violations that should never fire on well-formed
/// input; never produced by matching against valid AST shapes, so
/// it is not part of the `Diagnostic` stream callers iterate.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("internal error: {0}")]
pub struct InternalError(pub String);

/// The single currency every phase's errors convert into: a position plus a
/// human-readable message.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub position: Location,
    pub message: String,
    /// The offending token's text, if any; included in the rendered form as
    /// the "near" clause.
    pub near: Option<String>,
}

impl Diagnostic {
    pub fn new(position: Location, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
            near: None,
        }
    }

    pub fn with_near(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        if !token.is_empty() {
            self.near = Some(token);
        }
        self
    }

    /// Renders as `"Line: L, Col: C - Error near 'TOKEN' --- MSG"`,
    /// dropping the `near` clause when there is no token text.
    pub fn render(&self) -> String {
        match &self.near {
            Some(tok) if !tok.is_empty() => format!(
                "Line: {}, Col: {} - Error near '{}' --- {}",
                self.position.line, self.position.column, tok, self.message
            ),
            _ => format!(
                "Line: {}, Col: {} - {}",
                self.position.line, self.position.column, self.message
            ),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render())
    }
}

impl From<&LexError> for Diagnostic {
    fn from(e: &LexError) -> Self {
        Diagnostic::new(e.span().start, e.to_string())
    }
}

impl From<&ParseError> for Diagnostic {
    fn from(e: &ParseError) -> Self {
        Diagnostic::new(e.span().start, e.to_string())
    }
}

impl From<&ResolveError> for Diagnostic {
    fn from(e: &ResolveError) -> Self {
        Diagnostic::new(e.span().start, e.to_string())
    }
}

impl From<&TypeError> for Diagnostic {
    fn from(e: &TypeError) -> Self {
        Diagnostic::new(e.span().start, e.to_string())
    }
}

/// A uniform diagnostic accumulator (C9).
///
/// `max_errors`, when set, is a debug fast-exit: once reached, `push` stops
/// recording and `is_fail_fast` reports true so a caller can bail out of a
/// multi-pass walk early. It never changes the meaning of already-collected
/// diagnostics.
#[derive(Debug, Default)]
pub struct ErrorCollector {
    diagnostics: Vec<Diagnostic>,
    max_errors: Option<usize>,
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_errors(max_errors: usize) -> Self {
        Self {
            diagnostics: Vec::new(),
            max_errors: Some(max_errors),
        }
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        if self.is_fail_fast() {
            return;
        }
        self.diagnostics.push(diagnostic);
    }

    pub fn push_all<'a, T>(&mut self, errors: impl IntoIterator<Item = &'a T>)
    where
        T: 'a,
        Diagnostic: for<'b> From<&'b T>,
    {
        for e in errors {
            self.push(Diagnostic::from(e));
        }
    }

    /// True once `max_errors` has been reached; callers use this to abandon
    /// further work early in debug configurations.
    pub fn is_fail_fast(&self) -> bool {
        matches!(self.max_errors, Some(max) if self.diagnostics.len() >= max)
    }

    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn extend(&mut self, other: ErrorCollector) {
        for d in other.diagnostics {
            self.push(d);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(line: usize, column: usize) -> Location {
        Location::new(0, line, column)
    }

    #[test]
    fn render_drops_near_clause_when_token_empty() {
        let d = Diagnostic::new(loc(3, 7), "unresolved type name 'Foo'").with_near("");
        assert_eq!(d.render(), "Line: 3, Col: 7 - unresolved type name 'Foo'");
    }

    #[test]
    fn render_includes_near_clause_when_token_present() {
        let d = Diagnostic::new(loc(1, 1), "expected identifier").with_near("{");
        assert_eq!(
            d.render(),
            "Line: 1, Col: 1 - Error near '{' --- expected identifier"
        );
    }

    #[test]
    fn max_errors_stops_accumulating() {
        let mut collector = ErrorCollector::with_max_errors(2);
        collector.push(Diagnostic::new(loc(1, 1), "a"));
        collector.push(Diagnostic::new(loc(1, 2), "b"));
        collector.push(Diagnostic::new(loc(1, 3), "c"));
        assert_eq!(collector.diagnostics().len(), 2);
        assert!(collector.is_fail_fast());
    }
}
