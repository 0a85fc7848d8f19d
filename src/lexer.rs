//! Lexical analysis (C4).
//!
//! Scans UTF-8 source text into a stream of [`Token`]s. Operators are not
//! pre-assigned a precedence here — the lexer only recognizes the *shape* of
//! an operator (the maximal run of operator characters) and hands precedence
//! resolution to the parser's unchain pass.
//!
//! On any lex error the error is recorded on the lexer and an `Eof` token is
//! returned; callers must check [`Lexer::errors`] rather than trust a clean
//! token stream.

use crate::error::LexError;
use crate::span::{Location, Span};

/// Characters that make up a generic operator token, in the order checked.
/// A bare `-` is special-cased into its own `Minus` token so the parser can
/// tell unary-minus from a multi-char operator starting with `-`.
const OPERATOR_CHARS: &str = "<>&^%$#@!*~=/|:+-";

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub span: Span,
    /// A decoded literal payload, present for string/number/duration/bool
    /// tokens.
    pub literal: Option<TokenLiteral>,
}

impl Token {
    fn new(kind: TokenKind, text: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            text: text.into(),
            span,
            literal: None,
        }
    }

    fn with_literal(mut self, literal: TokenLiteral) -> Self {
        self.literal = Some(literal);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenLiteral {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Already normalized to seconds.
    Duration(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Keywords
    Native,
    Use,
    Component,
    System,
    Param,
    Uses,
    Method,
    Analyze,
    Expect,
    Let,
    If,
    Else,
    Sample,
    Dist,
    Default,
    Return,
    Wait,
    Go,
    GoBatch,
    Aggregator,
    Using,
    Switch,
    Case,
    Enum,
    Import,
    From,
    As,
    Options,
    For,

    // Literals
    True,
    False,
    Int,
    Float,
    Str,
    Duration,
    Identifier,

    // Punctuation
    Semicolon,
    Comma,
    Dot,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    LeftParen,
    RightParen,
    Colon,

    // Reserved operator forms
    Equal,
    LetAssign,
    Arrow,
    Minus,
    BinaryOp,

    Eof,
    Error,
}

impl TokenKind {
    pub fn keyword_from_str(word: &str) -> Option<TokenKind> {
        Some(match word {
            "native" => TokenKind::Native,
            "use" => TokenKind::Use,
            "component" => TokenKind::Component,
            "system" => TokenKind::System,
            "param" => TokenKind::Param,
            "uses" => TokenKind::Uses,
            "method" => TokenKind::Method,
            "analyze" => TokenKind::Analyze,
            "expect" => TokenKind::Expect,
            "let" => TokenKind::Let,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "sample" => TokenKind::Sample,
            "dist" => TokenKind::Dist,
            "default" => TokenKind::Default,
            "return" => TokenKind::Return,
            "wait" => TokenKind::Wait,
            "go" => TokenKind::Go,
            "gobatch" => TokenKind::GoBatch,
            "aggregator" => TokenKind::Aggregator,
            "using" => TokenKind::Using,
            "switch" => TokenKind::Switch,
            "case" => TokenKind::Case,
            "enum" => TokenKind::Enum,
            "import" => TokenKind::Import,
            "from" => TokenKind::From,
            "as" => TokenKind::As,
            "options" => TokenKind::Options,
            "for" => TokenKind::For,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            _ => return None,
        })
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Durations are accepted for these unit suffixes only; the canonical
/// internal unit is seconds.
fn duration_unit_seconds(unit: &str) -> Option<f64> {
    Some(match unit {
        "ns" => 1e-9,
        "us" => 1e-6,
        "ms" => 1e-3,
        "s" => 1.0,
        "min" => 60.0,
        "hr" => 3600.0,
        _ => return None,
    })
}

pub struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    position: usize,
    line: usize,
    column: usize,
    errors: Vec<LexError>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            position: 0,
            line: 1,
            column: 1,
            errors: Vec::new(),
        }
    }

    pub fn errors(&self) -> &[LexError] {
        &self.errors
    }

    fn loc(&self) -> Location {
        Location::new(self.position, self.line, self.column)
    }

    fn peek(&self) -> Option<char> {
        self.source[self.position..].chars().next()
    }

    fn peek_at(&self, skip_bytes: usize) -> Option<char> {
        self.source[self.position + skip_bytes..].chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.position += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.bytes.len()
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    let start = self.loc();
                    self.advance();
                    self.advance();
                    let mut depth = 1usize;
                    loop {
                        match self.peek() {
                            None => {
                                self.errors.push(LexError::UnterminatedComment {
                                    span: Span::new(start, self.loc()),
                                });
                                return;
                            }
                            Some('/') if self.peek_at(1) == Some('*') => {
                                self.advance();
                                self.advance();
                                depth += 1;
                            }
                            Some('*') if self.peek_at(1) == Some('/') => {
                                self.advance();
                                self.advance();
                                depth -= 1;
                                if depth == 0 {
                                    break;
                                }
                            }
                            _ => {
                                self.advance();
                            }
                        }
                    }
                }
                _ => break,
            }
        }
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();

        let start = self.loc();
        let Some(ch) = self.peek() else {
            return Token::new(TokenKind::Eof, "", Span::new(start, start));
        };

        if ch == '"' {
            return self.scan_string(start);
        }
        if ch.is_ascii_digit() {
            return self.scan_number(start);
        }
        if ch.is_alphabetic() || ch == '_' {
            return self.scan_identifier(start);
        }
        if is_single_punct(ch) {
            self.advance();
            let span = Span::new(start, self.loc());
            return Token::new(single_punct_kind(ch), ch.to_string(), span);
        }
        if OPERATOR_CHARS.contains(ch) {
            return self.scan_operator(start);
        }

        self.advance();
        let span = Span::new(start, self.loc());
        self.errors.push(LexError::UnexpectedChar { ch, span });
        Token::new(TokenKind::Error, ch.to_string(), span)
    }

    fn scan_string(&mut self, start: Location) -> Token {
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.peek() {
                None => {
                    self.errors
                        .push(LexError::UnterminatedString { span: Span::new(start, self.loc()) });
                    let span = Span::new(start, self.loc());
                    return Token::new(TokenKind::Error, value, span);
                }
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    let esc_start = self.loc();
                    self.advance();
                    match self.peek() {
                        Some('n') => {
                            value.push('\n');
                            self.advance();
                        }
                        Some('t') => {
                            value.push('\t');
                            self.advance();
                        }
                        Some('\\') => {
                            value.push('\\');
                            self.advance();
                        }
                        Some('"') => {
                            value.push('"');
                            self.advance();
                        }
                        Some(other) => {
                            self.errors.push(LexError::InvalidEscape {
                                ch: other,
                                span: Span::new(esc_start, self.loc()),
                            });
                            value.push(other);
                            self.advance();
                        }
                        None => {
                            self.errors.push(LexError::UnterminatedString {
                                span: Span::new(start, self.loc()),
                            });
                            break;
                        }
                    }
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }
        let span = Span::new(start, self.loc());
        Token::new(TokenKind::Str, value.clone(), span).with_literal(TokenLiteral::Str(value))
    }

    fn scan_number(&mut self, start: Location) -> Token {
        let begin = self.position;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }
        let mut is_float = false;
        if self.peek() == Some('.') && matches!(self.peek_at(1), Some(c) if c.is_ascii_digit()) {
            is_float = true;
            self.advance();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }

        // Try a duration unit immediately adjacent to the number. Units are
        // checked longest-first so "ms"/"min" aren't shadowed by "s".
        const UNITS: [&str; 6] = ["min", "ms", "ns", "us", "hr", "s"];

        let after_digits = self.position;
        let unit_start = self.position;
        let mut unit_end = self.position;
        while matches!(self.peek(), Some(c) if c.is_alphabetic()) {
            unit_end += self.peek().unwrap().len_utf8();
            self.advance();
        }
        let run = &self.source[unit_start..unit_end];
        if !run.is_empty() {
            let matched = UNITS.iter().find(|u| run.starts_with(**u)).copied();
            match matched {
                Some(unit) if unit.len() == run.len() => {
                    // The char right after the unit must not continue an
                    // identifier.
                    let boundary_ok = match self.peek() {
                        Some(c) => !(c.is_alphanumeric() || c == '_'),
                        None => true,
                    };
                    if boundary_ok {
                        let scale = duration_unit_seconds(unit).expect("matched a known unit");
                        let text = &self.source[begin..unit_end];
                        let number: f64 = self.source[begin..after_digits].parse().unwrap_or(0.0);
                        let span = Span::new(start, self.loc());
                        return Token::new(TokenKind::Duration, text.to_string(), span)
                            .with_literal(TokenLiteral::Duration(number * scale));
                    } else {
                        // Consume the rest of the offending identifier so the
                        // error span covers the whole malformed token.
                        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
                            self.advance();
                        }
                        let text = self.source[begin..self.position].to_string();
                        let span = Span::new(start, self.loc());
                        self.errors.push(LexError::InvalidDurationUnit {
                            unit: text.clone(),
                            span,
                        });
                        return Token::new(TokenKind::Error, text, span);
                    }
                }
                Some(_) => {
                    // The run starts with a recognized unit but keeps going
                    // (e.g. "msident"): a boundary violation regardless of
                    // what the rest of the run looks like.
                    let text = self.source[begin..self.position].to_string();
                    let span = Span::new(start, self.loc());
                    self.errors.push(LexError::InvalidDurationUnit {
                        unit: text.clone(),
                        span,
                    });
                    return Token::new(TokenKind::Error, text, span);
                }
                None => {
                    // Not a recognized unit: rewind, this was just a number
                    // followed by an identifier (two separate tokens).
                    self.rewind_to(unit_start, start);
                }
            }
        }

        let text = self.source[begin..after_digits].to_string();
        let span = Span::new(start, self.loc());
        if is_float {
            let value: f64 = text.parse().unwrap_or(0.0);
            Token::new(TokenKind::Float, text, span).with_literal(TokenLiteral::Float(value))
        } else {
            let value: i64 = text.parse().unwrap_or(0);
            Token::new(TokenKind::Int, text, span).with_literal(TokenLiteral::Int(value))
        }
    }

    /// Rewinds the scanner to `target_pos`, recomputing line/column from
    /// `from` (only ever used within a single line span produced by
    /// `scan_number`, so a byte-count walk back is cheap and correct even
    /// across multi-byte lookahead).
    fn rewind_to(&mut self, target_pos: usize, from: Location) {
        self.position = target_pos;
        self.line = from.line;
        self.column = from.column + (target_pos - from.offset);
    }

    fn scan_identifier(&mut self, start: Location) -> Token {
        let begin = self.position;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.advance();
        }
        let text = &self.source[begin..self.position];
        let span = Span::new(start, self.loc());
        if let Some(kind) = TokenKind::keyword_from_str(text) {
            let token = Token::new(kind, text, span);
            return match kind {
                TokenKind::True => token.with_literal(TokenLiteral::Bool(true)),
                TokenKind::False => token.with_literal(TokenLiteral::Bool(false)),
                _ => token,
            };
        }
        Token::new(TokenKind::Identifier, text, span)
    }

    fn scan_operator(&mut self, start: Location) -> Token {
        // `=`, `:=`, `=>`, and bare `:` are reserved forms with their own
        // token kinds; everything else of operator characters becomes one
        // maximal `BinaryOp` run.
        if self.peek() == Some('-')
            && !matches!(self.peek_at(1), Some(c) if OPERATOR_CHARS.contains(c))
        {
            self.advance();
            return Token::new(TokenKind::Minus, "-", Span::new(start, self.loc()));
        }
        if self.peek() == Some('=') && self.peek_at(1) == Some('>') {
            self.advance();
            self.advance();
            return Token::new(TokenKind::Arrow, "=>", Span::new(start, self.loc()));
        }
        if self.peek() == Some(':') && self.peek_at(1) == Some('=') {
            self.advance();
            self.advance();
            return Token::new(TokenKind::LetAssign, ":=", Span::new(start, self.loc()));
        }
        if self.peek() == Some('=')
            && !matches!(self.peek_at(1), Some(c) if OPERATOR_CHARS.contains(c))
        {
            self.advance();
            return Token::new(TokenKind::Equal, "=", Span::new(start, self.loc()));
        }

        let begin = self.position;
        while matches!(self.peek(), Some(c) if OPERATOR_CHARS.contains(c)) {
            self.advance();
        }
        let text = self.source[begin..self.position].to_string();
        let span = Span::new(start, self.loc());
        Token::new(TokenKind::BinaryOp, text, span)
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.is_at_end() {
            return None;
        }
        let token = self.next_token();
        if token.kind == TokenKind::Eof {
            return None;
        }
        Some(token)
    }
}

fn is_single_punct(ch: char) -> bool {
    matches!(ch, ';' | ',' | '.' | '{' | '}' | '[' | ']' | '(' | ')' | ':')
}

fn single_punct_kind(ch: char) -> TokenKind {
    match ch {
        ';' => TokenKind::Semicolon,
        ',' => TokenKind::Comma,
        '.' => TokenKind::Dot,
        '{' => TokenKind::LeftBrace,
        '}' => TokenKind::RightBrace,
        '[' => TokenKind::LeftBracket,
        ']' => TokenKind::RightBracket,
        '(' => TokenKind::LeftParen,
        ')' => TokenKind::RightParen,
        ':' => TokenKind::Colon,
        _ => unreachable!(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            let t = lexer.next_token();
            if t.kind == TokenKind::Eof {
                break;
            }
            out.push(t.kind);
        }
        out
    }

    #[test]
    fn token_spans_match_source_bytes() {
        let src = "component Cache { }";
        let mut lexer = Lexer::new(src);
        loop {
            let t = lexer.next_token();
            if t.kind == TokenKind::Eof {
                break;
            }
            assert!(t.span.start.offset < t.span.end.offset);
            assert_eq!(&src[t.span.start.offset..t.span.end.offset], t.text);
        }
    }

    #[test]
    fn keywords_and_identifier() {
        assert_eq!(
            kinds("component Cache"),
            vec![TokenKind::Component, TokenKind::Identifier]
        );
    }

    #[test]
    fn use_vs_uses_are_distinct_keywords() {
        assert_eq!(kinds("use uses"), vec![TokenKind::Use, TokenKind::Uses]);
    }

    #[test]
    fn duration_before_identifier_boundary_is_an_error() {
        let mut lexer = Lexer::new("1msident");
        let t = lexer.next_token();
        assert_eq!(t.kind, TokenKind::Error);
        assert_eq!(lexer.errors().len(), 1);
    }

    #[test]
    fn duration_then_identifier_with_space() {
        let mut lexer = Lexer::new("10ms ident");
        let d = lexer.next_token();
        assert_eq!(d.kind, TokenKind::Duration);
        assert_eq!(d.literal, Some(TokenLiteral::Duration(0.010)));
        let id = lexer.next_token();
        assert_eq!(id.kind, TokenKind::Identifier);
    }

    #[test]
    fn duration_then_semicolon() {
        let mut lexer = Lexer::new("1ms;");
        let d = lexer.next_token();
        assert_eq!(d.kind, TokenKind::Duration);
        assert_eq!(d.literal, Some(TokenLiteral::Duration(0.001)));
        let semi = lexer.next_token();
        assert_eq!(semi.kind, TokenKind::Semicolon);
    }

    #[test]
    fn string_escape_decoding() {
        let mut lexer = Lexer::new(r#""a\nb\tc\\d\"e""#);
        let t = lexer.next_token();
        assert_eq!(
            t.literal,
            Some(TokenLiteral::Str("a\nb\tc\\d\"e".to_string()))
        );
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let mut lexer = Lexer::new("\"abc");
        lexer.next_token();
        assert_eq!(lexer.errors().len(), 1);
    }

    #[test]
    fn unknown_escape_keeps_scanning_raw_char() {
        let mut lexer = Lexer::new(r#""a\qb""#);
        let t = lexer.next_token();
        assert_eq!(lexer.errors().len(), 1);
        assert_eq!(t.literal, Some(TokenLiteral::Str("aqb".to_string())));
    }

    #[test]
    fn operator_run_is_maximal() {
        let mut lexer = Lexer::new("a <=> b");
        lexer.next_token(); // a
        let op = lexer.next_token();
        assert_eq!(op.kind, TokenKind::BinaryOp);
        assert_eq!(op.text, "<=>");
    }

    #[test]
    fn bare_minus_is_its_own_token() {
        assert_eq!(kinds("-x"), vec![TokenKind::Minus, TokenKind::Identifier]);
    }

    #[test]
    fn reserved_assignment_forms() {
        assert_eq!(kinds("= := =>"), vec![TokenKind::Equal, TokenKind::LetAssign, TokenKind::Arrow]);
    }

    #[test]
    fn nested_block_comments() {
        assert_eq!(
            kinds("/* outer /* inner */ still outer */ x"),
            vec![TokenKind::Identifier]
        );
    }

    #[test]
    fn unterminated_block_comment_is_an_error() {
        let mut lexer = Lexer::new("/* never closes");
        lexer.next_token();
        assert_eq!(lexer.errors().len(), 1);
    }
}
