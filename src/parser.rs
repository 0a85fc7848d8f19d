//! Recursive-descent parser (C5).
//!
//! The parser is predictive with one token of lookahead. Binary expressions
//! are not built directly by a precedence ladder of mutually recursive
//! functions: a flat [`Chained`] sequence of unary operands and operator
//! tokens is collected first, then [`unchain`] lowers it into a canonical
//! tree of `Binary` nodes using a [`Precedencer`]. This keeps the grammar
//! free of one parsing function per precedence level and gives callers a
//! single place to swap in a different operator table.

use std::cell::RefCell;
use std::rc::Rc;

use crate::ast::*;
use crate::error::ParseError;
use crate::lexer::{Lexer, Token, TokenKind, TokenLiteral};

/// Operator associativity, as reported by a [`Precedencer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assoc {
    Left,
    Right,
    None,
}

/// Supplies precedence and associativity for operator text. Implementing
/// this trait for a custom table lets a caller change operator semantics
/// without touching the parser itself.
pub trait Precedencer {
    fn precedence_for(&self, op: &str) -> i32;
    fn associativity_for(&self, op: &str) -> Assoc;
}

/// `* / %` = 3, `+ -` = 2, everything else = 0, all left-associative.
pub struct DefaultPrecedencer;

impl Precedencer for DefaultPrecedencer {
    fn precedence_for(&self, op: &str) -> i32 {
        match op {
            "*" | "/" | "%" => 3,
            "+" | "-" => 2,
            _ => 0,
        }
    }

    fn associativity_for(&self, _op: &str) -> Assoc {
        Assoc::Left
    }
}

/// A flat operand/operator run collected by [`Parser::parse_chain`], not yet
/// shaped by precedence. `operands.len() == ops.len() + 1`.
pub struct Chained {
    pub operands: Vec<Expr>,
    pub ops: Vec<(String, Span)>,
}

/// Precedence-climbing: lowers a [`Chained`] run into a tree of `Binary`
/// nodes per `precedencer`.
pub fn unchain(chained: Chained, precedencer: &dyn Precedencer) -> Result<Expr, ParseError> {
    let mut operands: std::collections::VecDeque<Expr> = chained.operands.into();
    let mut ops: std::collections::VecDeque<(String, Span)> = chained.ops.into();
    let lhs = operands
        .pop_front()
        .expect("a chain always collects at least one operand");
    climb(lhs, 0, &mut operands, &mut ops, precedencer)
}

fn climb(
    mut lhs: Expr,
    min_prec: i32,
    operands: &mut std::collections::VecDeque<Expr>,
    ops: &mut std::collections::VecDeque<(String, Span)>,
    precedencer: &dyn Precedencer,
) -> Result<Expr, ParseError> {
    while let Some((op, op_span)) = ops.front().cloned() {
        let prec = precedencer.precedence_for(&op);
        if prec < min_prec {
            break;
        }
        ops.pop_front();
        let mut rhs = operands
            .pop_front()
            .expect("operand count must exceed operator count by exactly one");
        let assoc = precedencer.associativity_for(&op);

        loop {
            let Some((next_op, _)) = ops.front() else {
                break;
            };
            let next_prec = precedencer.precedence_for(next_op);
            let should_recurse = match assoc {
                Assoc::Left | Assoc::None => next_prec > prec,
                Assoc::Right => next_prec >= prec,
            };
            if !should_recurse {
                break;
            }
            let next_min = match assoc {
                Assoc::Left | Assoc::None => prec + 1,
                Assoc::Right => prec,
            };
            rhs = climb(rhs, next_min, operands, ops, precedencer)?;
        }

        if assoc == Assoc::None {
            if let Some((next_op, _)) = ops.front() {
                if precedencer.precedence_for(next_op) == prec {
                    return Err(ParseError::NonAssociativeChain { op, span: op_span });
                }
            }
        }

        let span = lhs.span.merge(&rhs.span);
        lhs = Expr::new(
            ExprKind::Binary {
                op,
                left: Box::new(lhs),
                right: Box::new(rhs),
            },
            span,
        );
    }
    Ok(lhs)
}

/// Parses a whole source file into a [`FileDecl`] plus any parse (and
/// carried-over lex) diagnostics. Never panics on malformed input: errors
/// are recorded and recovery resumes at the next statement or top-level
/// declaration.
pub fn parse_file(path: impl Into<String>, source: &str) -> (FileDecl, Vec<ParseError>) {
    let mut parser = Parser::new(source);
    let start = parser.current.span.start;

    let mut imports = Vec::new();
    let mut declarations = Vec::new();
    while !parser.check(TokenKind::Eof) {
        if parser.check(TokenKind::Import) {
            match parser.parse_import() {
                Ok(import) => imports.push(import),
                Err(e) => {
                    parser.errors.push(e);
                    parser.synchronize_top_level();
                }
            }
            continue;
        }
        match parser.parse_top_decl() {
            Ok(decl) => declarations.push(decl),
            Err(e) => {
                parser.errors.push(e);
                parser.synchronize_top_level();
            }
        }
    }
    let end = parser.current.span.end;

    let mut errors = parser.errors;
    for lex_error in parser.lexer.errors() {
        errors.push(ParseError::Lex(lex_error.clone()));
    }
    (
        FileDecl::new(path, imports, declarations, Span::new(start, end)),
        errors,
    )
}

/// Tracks one token of lookahead (`current`) over the token stream; parse
/// methods consume tokens with `bump`/`expect` and build AST nodes directly.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    errors: Vec<ParseError>,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token();
        Self {
            lexer,
            current,
            errors: Vec::new(),
        }
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    fn bump(&mut self) -> Token {
        std::mem::replace(&mut self.current, self.lexer.next_token())
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn eat(&mut self, kind: TokenKind) -> Option<Token> {
        if self.check(kind) {
            Some(self.bump())
        } else {
            None
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if self.check(kind) {
            Ok(self.bump())
        } else {
            Err(ParseError::UnexpectedToken {
                expected: kind.to_string(),
                found: self.current.kind.to_string(),
                span: self.current.span,
            })
        }
    }

    fn expect_identifier(&mut self) -> Result<(String, Span), ParseError> {
        let tok = self.expect(TokenKind::Identifier)?;
        Ok((tok.text, tok.span))
    }

    fn starts_expr(&self) -> bool {
        !matches!(
            self.current.kind,
            TokenKind::Semicolon | TokenKind::RightBrace | TokenKind::Eof
        )
    }

    /// Skips to the end of the offending statement so the next one can still
    /// be parsed; stops at a `;` (consuming it) or a block's closing `}`.
    fn synchronize_statement(&mut self) {
        while !matches!(self.current.kind, TokenKind::Eof | TokenKind::RightBrace) {
            if self.check(TokenKind::Semicolon) {
                self.bump();
                return;
            }
            self.bump();
        }
    }

    /// Skips to the next token that can start a top-level declaration.
    fn synchronize_top_level(&mut self) {
        while !self.check(TokenKind::Eof) {
            if matches!(
                self.current.kind,
                TokenKind::Import
                    | TokenKind::Enum
                    | TokenKind::Native
                    | TokenKind::Component
                    | TokenKind::System
                    | TokenKind::Aggregator
                    | TokenKind::Options
            ) {
                return;
            }
            self.bump();
        }
    }

    // ---- top level ---------------------------------------------------

    fn parse_import(&mut self) -> Result<ImportDecl, ParseError> {
        let kw = self.expect(TokenKind::Import)?;
        if self.check(TokenKind::Str) {
            let path_tok = self.bump();
            let span = Span::new(kw.span.start, path_tok.span.end);
            return Ok(ImportDecl {
                item: None,
                alias: None,
                path: string_literal_text(&path_tok),
                resolved_path: RefCell::new(None),
                span,
            });
        }
        let (item, _) = self.expect_identifier()?;
        let alias = if self.eat(TokenKind::As).is_some() {
            Some(self.expect_identifier()?.0)
        } else {
            None
        };
        self.expect(TokenKind::From)?;
        let path_tok = self.expect(TokenKind::Str)?;
        let span = Span::new(kw.span.start, path_tok.span.end);
        Ok(ImportDecl {
            item: Some(item),
            alias,
            path: string_literal_text(&path_tok),
            resolved_path: RefCell::new(None),
            span,
        })
    }

    fn parse_top_decl(&mut self) -> Result<TopDecl, ParseError> {
        match self.current.kind {
            TokenKind::Enum => self.parse_enum().map(|d| TopDecl::Enum(Rc::new(d))),
            TokenKind::Native | TokenKind::Component => {
                self.parse_component().map(|d| TopDecl::Component(Rc::new(d)))
            }
            TokenKind::Aggregator => self.parse_aggregator().map(|d| TopDecl::Aggregator(Rc::new(d))),
            TokenKind::System => self.parse_system().map(|d| TopDecl::System(Rc::new(d))),
            TokenKind::Options => self.parse_options().map(|d| TopDecl::Options(Rc::new(d))),
            _ => Err(ParseError::UnexpectedToken {
                expected: "a top-level declaration".to_string(),
                found: self.current.kind.to_string(),
                span: self.current.span,
            }),
        }
    }

    fn parse_enum(&mut self) -> Result<EnumDecl, ParseError> {
        let kw = self.expect(TokenKind::Enum)?;
        let (name, _) = self.expect_identifier()?;
        self.expect(TokenKind::LeftBrace)?;
        let mut values = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            values.push(self.expect_identifier()?.0);
            self.eat(TokenKind::Comma);
        }
        let close = self.expect(TokenKind::RightBrace)?;
        Ok(EnumDecl {
            name,
            values,
            span: Span::new(kw.span.start, close.span.end),
        })
    }

    fn parse_component(&mut self) -> Result<ComponentDecl, ParseError> {
        let native_tok = self.eat(TokenKind::Native);
        let comp_tok = self.expect(TokenKind::Component)?;
        let start = native_tok.as_ref().map_or(comp_tok.span.start, |t| t.span.start);
        let native = native_tok.is_some();
        let (name, _) = self.expect_identifier()?;
        self.expect(TokenKind::LeftBrace)?;

        let mut params = Vec::new();
        let mut uses = Vec::new();
        let mut methods = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            let outcome = match self.current.kind {
                TokenKind::Param => self.parse_param().map(ComponentMember::Param),
                TokenKind::Uses => self.parse_uses().map(ComponentMember::Uses),
                TokenKind::Method => self
                    .parse_method(native)
                    .map(|m| ComponentMember::Method(Rc::new(m))),
                _ => Err(ParseError::UnexpectedToken {
                    expected: "param, uses, or method".to_string(),
                    found: self.current.kind.to_string(),
                    span: self.current.span,
                }),
            };
            match outcome {
                Ok(ComponentMember::Param(p)) => params.push(p),
                Ok(ComponentMember::Uses(u)) => uses.push(u),
                Ok(ComponentMember::Method(m)) => methods.push(m),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize_statement();
                }
            }
        }
        let close = self.expect(TokenKind::RightBrace)?;
        Ok(ComponentDecl {
            name,
            native,
            params,
            uses,
            methods,
            span: Span::new(start, close.span.end),
        })
    }

    fn parse_param(&mut self) -> Result<ParamDecl, ParseError> {
        let kw = self.expect(TokenKind::Param)?;
        let (name, name_span) = self.expect_identifier()?;
        let type_decl = if self.check(TokenKind::Identifier) {
            Some(self.parse_type_decl()?)
        } else {
            None
        };
        let default = if self.eat(TokenKind::Equal).is_some() {
            Some(self.parse_expr()?)
        } else {
            None
        };
        let end = default
            .as_ref()
            .map(|e| e.span.end)
            .or_else(|| type_decl.as_ref().map(|t| t.span.end))
            .unwrap_or(name_span.end);
        Ok(ParamDecl {
            name,
            type_decl,
            default,
            span: Span::new(kw.span.start, end),
            resolved_type: RefCell::new(None),
        })
    }

    fn parse_uses(&mut self) -> Result<UsesDecl, ParseError> {
        let kw = self.expect(TokenKind::Uses)?;
        let (local_name, _) = self.expect_identifier()?;
        let (component_name, comp_span) = self.expect_identifier()?;
        Ok(UsesDecl {
            local_name,
            component_name,
            resolved: RefCell::new(None),
            span: Span::new(kw.span.start, comp_span.end),
        })
    }

    fn parse_method(&mut self, native: bool) -> Result<MethodDecl, ParseError> {
        let kw = self.expect(TokenKind::Method)?;
        let (name, _) = self.expect_identifier()?;
        self.expect(TokenKind::LeftParen)?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                params.push(self.parse_method_param()?);
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
        }
        let close_paren = self.expect(TokenKind::RightParen)?;
        let return_type = if self.check(TokenKind::Identifier) {
            Some(self.parse_type_decl()?)
        } else {
            None
        };
        // Native components only declare method shape; everyone else must
        // provide a body.
        let (body, end) = if native {
            let end = return_type.as_ref().map_or(close_paren.span.end, |t| t.span.end);
            (None, end)
        } else {
            let block = self.parse_block()?;
            let end = block.span.end;
            (Some(block), end)
        };
        Ok(MethodDecl {
            name,
            params,
            return_type,
            body,
            span: Span::new(kw.span.start, end),
        })
    }

    fn parse_method_param(&mut self) -> Result<MethodParam, ParseError> {
        let (name, name_span) = self.expect_identifier()?;
        let type_decl = self.parse_type_decl()?;
        let default = if self.eat(TokenKind::Equal).is_some() {
            Some(self.parse_expr()?)
        } else {
            None
        };
        let end = default.as_ref().map_or(type_decl.span.end, |e| e.span.end);
        Ok(MethodParam {
            name,
            type_decl,
            default,
            span: Span::new(name_span.start, end),
        })
    }

    fn parse_aggregator(&mut self) -> Result<AggregatorDecl, ParseError> {
        let kw = self.expect(TokenKind::Aggregator)?;
        let (name, _) = self.expect_identifier()?;
        self.expect(TokenKind::LeftParen)?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                params.push(self.parse_method_param()?);
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
        }
        self.expect(TokenKind::RightParen)?;
        let return_type = if self.check(TokenKind::Identifier) {
            Some(self.parse_type_decl()?)
        } else {
            None
        };
        let body = self.parse_block()?;
        let end = body.span.end;
        Ok(AggregatorDecl {
            name,
            params,
            return_type,
            body: Some(body),
            span: Span::new(kw.span.start, end),
        })
    }

    /// Named types are bare identifiers; `List[T]`, `Tuple[T1, T2, ...]`, and
    /// `Outcomes[T]` use the dedicated bracket punctuation.
    fn parse_type_decl(&mut self) -> Result<TypeDecl, ParseError> {
        let (name, span) = self.expect_identifier()?;
        if !self.check(TokenKind::LeftBracket) {
            return Ok(TypeDecl::new(TypeDeclKind::Named(name), span));
        }
        self.bump();
        match name.as_str() {
            "List" => {
                let inner = self.parse_type_decl()?;
                let close = self.expect(TokenKind::RightBracket)?;
                Ok(TypeDecl::new(
                    TypeDeclKind::List(Box::new(inner)),
                    Span::new(span.start, close.span.end),
                ))
            }
            "Outcomes" => {
                let inner = self.parse_type_decl()?;
                let close = self.expect(TokenKind::RightBracket)?;
                Ok(TypeDecl::new(
                    TypeDeclKind::Outcomes(Box::new(inner)),
                    Span::new(span.start, close.span.end),
                ))
            }
            "Tuple" => {
                let mut items = vec![self.parse_type_decl()?];
                while self.eat(TokenKind::Comma).is_some() {
                    items.push(self.parse_type_decl()?);
                }
                let close = self.expect(TokenKind::RightBracket)?;
                Ok(TypeDecl::new(
                    TypeDeclKind::Tuple(items),
                    Span::new(span.start, close.span.end),
                ))
            }
            other => Err(ParseError::Invalid {
                message: format!("'{other}' does not take type arguments"),
                span,
            }),
        }
    }

    fn parse_system(&mut self) -> Result<SystemDecl, ParseError> {
        let kw = self.expect(TokenKind::System)?;
        let (name, _) = self.expect_identifier()?;
        self.expect(TokenKind::LeftBrace)?;
        let mut items = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            match self.parse_system_item() {
                Ok(item) => items.push(item),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize_statement();
                }
            }
        }
        let close = self.expect(TokenKind::RightBrace)?;
        Ok(SystemDecl {
            name,
            items,
            span: Span::new(kw.span.start, close.span.end),
        })
    }

    fn parse_options(&mut self) -> Result<OptionsDecl, ParseError> {
        let kw = self.expect(TokenKind::Options)?;
        let name = if self.check(TokenKind::Identifier) {
            Some(self.expect_identifier()?.0)
        } else {
            None
        };
        self.expect(TokenKind::LeftBrace)?;
        let mut items = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            match self.parse_system_item() {
                Ok(item) => items.push(item),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize_statement();
                }
            }
        }
        let close = self.expect(TokenKind::RightBrace)?;
        Ok(OptionsDecl {
            name,
            items,
            span: Span::new(kw.span.start, close.span.end),
        })
    }

    fn parse_system_item(&mut self) -> Result<SystemItem, ParseError> {
        match self.current.kind {
            TokenKind::Use => self.parse_instance().map(SystemItem::Instance),
            TokenKind::Let => {
                let (names, value, span) = self.parse_let_parts()?;
                Ok(SystemItem::Let { names, value, span })
            }
            TokenKind::Options => self.parse_options().map(SystemItem::Options),
            _ => {
                let target = self.parse_expr()?;
                self.expect(TokenKind::Equal)?;
                let value = self.parse_expr()?;
                let span = Span::new(target.span.start, value.span.end);
                Ok(SystemItem::Set { target, value, span })
            }
        }
    }

    fn parse_instance(&mut self) -> Result<InstanceDecl, ParseError> {
        let kw = self.expect(TokenKind::Use)?;
        let (name, _) = self.expect_identifier()?;
        let (component_name, comp_span) = self.expect_identifier()?;
        let mut overrides = Vec::new();
        let mut end = comp_span.end;
        if self.eat(TokenKind::Equal).is_some() {
            self.expect(TokenKind::LeftBrace)?;
            while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
                overrides.push(self.parse_override()?);
                self.eat(TokenKind::Comma);
            }
            let close = self.expect(TokenKind::RightBrace)?;
            end = close.span.end;
        }
        Ok(InstanceDecl {
            name,
            component_name,
            overrides,
            span: Span::new(kw.span.start, end),
        })
    }

    fn parse_override(&mut self) -> Result<Override, ParseError> {
        let (name, name_span) = self.expect_identifier()?;
        self.expect(TokenKind::Equal)?;
        let value = self.parse_expr()?;
        let span = Span::new(name_span.start, value.span.end);
        Ok(Override { name, value, span })
    }

    /// Shared by the `let` statement and the system-level `let` item:
    /// `let a, b = expr` (tuple destructuring) or `let a = expr`.
    fn parse_let_parts(&mut self) -> Result<(Vec<String>, Expr, Span), ParseError> {
        let kw = self.expect(TokenKind::Let)?;
        let mut names = vec![self.expect_identifier()?.0];
        while self.eat(TokenKind::Comma).is_some() {
            names.push(self.expect_identifier()?.0);
        }
        self.expect(TokenKind::Equal)?;
        let value = self.parse_expr()?;
        let span = Span::new(kw.span.start, value.span.end);
        Ok((names, value, span))
    }

    // ---- statements ----------------------------------------------------

    fn parse_block(&mut self) -> Result<Stmt, ParseError> {
        let open = self.expect(TokenKind::LeftBrace)?;
        let mut stmts = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            match self.parse_stmt() {
                Ok(s) => stmts.push(s),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize_statement();
                }
            }
        }
        let close = self.expect(TokenKind::RightBrace)?;
        Ok(Stmt::new(
            StmtKind::Block(stmts),
            Span::new(open.span.start, close.span.end),
        ))
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        match self.current.kind {
            TokenKind::LeftBrace => self.parse_block(),
            TokenKind::Let => {
                let (names, value, span) = self.parse_let_parts()?;
                self.eat(TokenKind::Semicolon);
                Ok(Stmt::new(StmtKind::Let { names, value }, span))
            }
            TokenKind::Return => {
                let kw = self.bump();
                let value = if self.starts_expr() { Some(self.parse_expr()?) } else { None };
                let end = value.as_ref().map_or(kw.span.end, |e| e.span.end);
                self.eat(TokenKind::Semicolon);
                Ok(Stmt::new(StmtKind::Return(value), Span::new(kw.span.start, end)))
            }
            TokenKind::If => self.parse_if(),
            TokenKind::For => self.parse_for(),
            TokenKind::Wait => {
                let kw = self.bump();
                let value = if self.starts_expr() { Some(self.parse_expr()?) } else { None };
                let end = value.as_ref().map_or(kw.span.end, |e| e.span.end);
                self.eat(TokenKind::Semicolon);
                Ok(Stmt::new(StmtKind::Wait(value), Span::new(kw.span.start, end)))
            }
            // `expect <expr>` is this language's delay statement; `analyze
            // <expr (, expr)*>` is its log statement. Neither word appears
            // as a named statement in the keyword list, so this binding is
            // a documented choice, not a given.
            TokenKind::Expect => {
                let kw = self.bump();
                let value = self.parse_expr()?;
                let span = Span::new(kw.span.start, value.span.end);
                self.eat(TokenKind::Semicolon);
                Ok(Stmt::new(StmtKind::Delay(value), span))
            }
            TokenKind::Analyze => {
                let kw = self.bump();
                let mut args = vec![self.parse_expr()?];
                while self.eat(TokenKind::Comma).is_some() {
                    args.push(self.parse_expr()?);
                }
                let end = args.last().map_or(kw.span.end, |e| e.span.end);
                self.eat(TokenKind::Semicolon);
                Ok(Stmt::new(StmtKind::Log(args), Span::new(kw.span.start, end)))
            }
            TokenKind::Go | TokenKind::GoBatch => {
                let kw = self.bump();
                let inner = self.parse_stmt()?;
                let span = Span::new(kw.span.start, inner.span.end);
                Ok(Stmt::new(StmtKind::Go(Box::new(inner)), span))
            }
            TokenKind::Switch => self.parse_switch(),
            _ => self.parse_expr_or_set_stmt(),
        }
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        let kw = self.expect(TokenKind::If)?;
        let condition = self.parse_expr()?;
        let then_branch = self.parse_block()?;
        let mut end = then_branch.span.end;
        let else_branch = if self.eat(TokenKind::Else).is_some() {
            let branch = if self.check(TokenKind::If) {
                self.parse_if()?
            } else {
                self.parse_block()?
            };
            end = branch.span.end;
            Some(Box::new(branch))
        } else {
            None
        };
        Ok(Stmt::new(
            StmtKind::If {
                condition,
                then_branch: Box::new(then_branch),
                else_branch,
            },
            Span::new(kw.span.start, end),
        ))
    }

    fn parse_for(&mut self) -> Result<Stmt, ParseError> {
        let kw = self.expect(TokenKind::For)?;
        let condition = if self.check(TokenKind::LeftBrace) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        let body = self.parse_block()?;
        let span = Span::new(kw.span.start, body.span.end);
        Ok(Stmt::new(
            StmtKind::For { condition, body: Box::new(body) },
            span,
        ))
    }

    fn parse_switch(&mut self) -> Result<Stmt, ParseError> {
        let kw = self.expect(TokenKind::Switch)?;
        let subject = self.parse_expr()?;
        self.expect(TokenKind::LeftBrace)?;
        let mut cases = Vec::new();
        let mut default = None;
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            if self.eat(TokenKind::Default).is_some() {
                self.expect(TokenKind::Colon)?;
                default = Some(Box::new(self.parse_stmt()?));
            } else {
                self.expect(TokenKind::Case)?;
                let cond = self.parse_expr()?;
                self.expect(TokenKind::Colon)?;
                let body = self.parse_stmt()?;
                cases.push((cond, body));
            }
        }
        let close = self.expect(TokenKind::RightBrace)?;
        Ok(Stmt::new(
            StmtKind::Switch { subject, cases, default },
            Span::new(kw.span.start, close.span.end),
        ))
    }

    /// A bare expression statement, an assignment (`target = value`), or the
    /// implicit single-name let form `name := value`.
    fn parse_expr_or_set_stmt(&mut self) -> Result<Stmt, ParseError> {
        let expr = self.parse_expr()?;
        if self.eat(TokenKind::LetAssign).is_some() {
            let name = match &expr.kind {
                ExprKind::Identifier(n) => n.clone(),
                _ => {
                    return Err(ParseError::Invalid {
                        message: "':=' target must be a bare identifier".to_string(),
                        span: expr.span,
                    })
                }
            };
            let value = self.parse_expr()?;
            let span = Span::new(expr.span.start, value.span.end);
            self.eat(TokenKind::Semicolon);
            return Ok(Stmt::new(StmtKind::Let { names: vec![name], value }, span));
        }
        if self.eat(TokenKind::Equal).is_some() {
            let value = self.parse_expr()?;
            let span = Span::new(expr.span.start, value.span.end);
            self.eat(TokenKind::Semicolon);
            return Ok(Stmt::new(StmtKind::Set { target: expr, value }, span));
        }
        let span = expr.span;
        self.eat(TokenKind::Semicolon);
        Ok(Stmt::new(StmtKind::Expr(expr), span))
    }

    // ---- expressions -----------------------------------------------------

    pub fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        let chained = self.parse_chain()?;
        unchain(chained, &DefaultPrecedencer)
    }

    fn parse_chain(&mut self) -> Result<Chained, ParseError> {
        let mut operands = vec![self.parse_unary()?];
        let mut ops = Vec::new();
        loop {
            let op = match self.current.kind {
                TokenKind::BinaryOp => self.current.text.clone(),
                TokenKind::Minus => "-".to_string(),
                _ => break,
            };
            let op_span = self.current.span;
            self.bump();
            ops.push((op, op_span));
            operands.push(self.parse_unary()?);
        }
        Ok(Chained { operands, ops })
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.check(TokenKind::Minus) {
            let kw = self.bump();
            let operand = self.parse_unary()?;
            let span = Span::new(kw.span.start, operand.span.end);
            return Ok(Expr::new(
                ExprKind::Unary { op: "-".to_string(), operand: Box::new(operand) },
                span,
            ));
        }
        if self.check(TokenKind::BinaryOp) && self.current.text == "!" {
            let kw = self.bump();
            let operand = self.parse_unary()?;
            let span = Span::new(kw.span.start, operand.span.end);
            return Ok(Expr::new(
                ExprKind::Unary { op: "!".to_string(), operand: Box::new(operand) },
                span,
            ));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.current.kind {
                TokenKind::Dot => {
                    self.bump();
                    let (member, member_span) = self.expect_identifier()?;
                    let span = Span::new(expr.span.start, member_span.end);
                    expr = Expr::new(
                        ExprKind::MemberAccess { receiver: Box::new(expr), member },
                        span,
                    );
                }
                TokenKind::LeftParen => {
                    self.bump();
                    let mut args = Vec::new();
                    if !self.check(TokenKind::RightParen) {
                        loop {
                            args.push(self.parse_expr()?);
                            if self.eat(TokenKind::Comma).is_none() {
                                break;
                            }
                        }
                    }
                    let close = self.expect(TokenKind::RightParen)?;
                    let span = Span::new(expr.span.start, close.span.end);
                    expr = Expr::new(ExprKind::Call { callee: Box::new(expr), args }, span);
                }
                TokenKind::LeftBracket => {
                    self.bump();
                    let index = self.parse_expr()?;
                    let close = self.expect(TokenKind::RightBracket)?;
                    let span = Span::new(expr.span.start, close.span.end);
                    expr = Expr::new(
                        ExprKind::Index { receiver: Box::new(expr), index: Box::new(index) },
                        span,
                    );
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.current.kind {
            TokenKind::True | TokenKind::False => {
                let tok = self.bump();
                let value = matches!(tok.literal, Some(TokenLiteral::Bool(true)));
                Ok(Expr::new(ExprKind::Literal(Literal::Bool(value)), tok.span))
            }
            TokenKind::Int => {
                let tok = self.bump();
                let value = match tok.literal {
                    Some(TokenLiteral::Int(v)) => v,
                    _ => 0,
                };
                Ok(Expr::new(ExprKind::Literal(Literal::Int(value)), tok.span))
            }
            TokenKind::Float => {
                let tok = self.bump();
                let value = match tok.literal {
                    Some(TokenLiteral::Float(v)) => v,
                    _ => 0.0,
                };
                Ok(Expr::new(ExprKind::Literal(Literal::Float(value)), tok.span))
            }
            TokenKind::Str => {
                let tok = self.bump();
                let value = match &tok.literal {
                    Some(TokenLiteral::Str(s)) => s.clone(),
                    _ => tok.text.clone(),
                };
                Ok(Expr::new(ExprKind::Literal(Literal::Str(value)), tok.span))
            }
            TokenKind::Duration => {
                let tok = self.bump();
                let value = match tok.literal {
                    Some(TokenLiteral::Duration(v)) => v,
                    _ => 0.0,
                };
                Ok(Expr::new(ExprKind::Literal(Literal::Duration(value)), tok.span))
            }
            TokenKind::Identifier => {
                let tok = self.bump();
                Ok(Expr::new(ExprKind::Identifier(tok.text), tok.span))
            }
            TokenKind::LeftParen => self.parse_paren_or_tuple(),
            TokenKind::Sample => {
                let kw = self.bump();
                let inner = self.parse_unary()?;
                let span = Span::new(kw.span.start, inner.span.end);
                Ok(Expr::new(ExprKind::Sample(Box::new(inner)), span))
            }
            TokenKind::Dist => self.parse_distribute(),
            TokenKind::Case => self.parse_case_expr(),
            _ => Err(ParseError::UnexpectedToken {
                expected: "an expression".to_string(),
                found: self.current.kind.to_string(),
                span: self.current.span,
            }),
        }
    }

    fn parse_paren_or_tuple(&mut self) -> Result<Expr, ParseError> {
        let open = self.expect(TokenKind::LeftParen)?;
        let mut items = vec![self.parse_expr()?];
        let mut is_tuple = false;
        while self.eat(TokenKind::Comma).is_some() {
            is_tuple = true;
            items.push(self.parse_expr()?);
        }
        let close = self.expect(TokenKind::RightParen)?;
        let span = Span::new(open.span.start, close.span.end);
        if is_tuple {
            Ok(Expr::new(ExprKind::Tuple(items), span))
        } else {
            let mut inner = items.pop().expect("parenthesized group has exactly one item");
            inner.span = span;
            Ok(inner)
        }
    }

    /// `dist [using total] { (weight => body)* [default => body] }`.
    fn parse_distribute(&mut self) -> Result<Expr, ParseError> {
        let kw = self.expect(TokenKind::Dist)?;
        let total = if self.eat(TokenKind::Using).is_some() {
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };
        self.expect(TokenKind::LeftBrace)?;
        let mut cases = Vec::new();
        let mut default = None;
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            if self.eat(TokenKind::Default).is_some() {
                self.expect(TokenKind::Arrow)?;
                default = Some(Box::new(self.parse_expr()?));
            } else {
                let weight = self.parse_expr()?;
                self.expect(TokenKind::Arrow)?;
                let body = self.parse_expr()?;
                let span = Span::new(weight.span.start, body.span.end);
                cases.push(DistributeCase { weight, body, span });
            }
            self.eat(TokenKind::Comma);
        }
        let close = self.expect(TokenKind::RightBrace)?;
        Ok(Expr::new(
            ExprKind::Distribute { cases, default, total },
            Span::new(kw.span.start, close.span.end),
        ))
    }

    /// `case { (cond : body)* [default : body] }` — reserved alongside the
    /// `switch` statement; parsed but not yet constrained by
    /// inference.
    fn parse_case_expr(&mut self) -> Result<Expr, ParseError> {
        let kw = self.expect(TokenKind::Case)?;
        self.expect(TokenKind::LeftBrace)?;
        let mut branches = Vec::new();
        let mut default = None;
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            if self.eat(TokenKind::Default).is_some() {
                self.expect(TokenKind::Colon)?;
                default = Some(Box::new(self.parse_expr()?));
            } else {
                let condition = self.parse_expr()?;
                self.expect(TokenKind::Colon)?;
                let body = self.parse_expr()?;
                let span = Span::new(condition.span.start, body.span.end);
                branches.push(CaseBranch { condition, body, span });
            }
            self.eat(TokenKind::Comma);
        }
        let close = self.expect(TokenKind::RightBrace)?;
        Ok(Expr::new(
            ExprKind::Case { branches, default },
            Span::new(kw.span.start, close.span.end),
        ))
    }
}

enum ComponentMember {
    Param(ParamDecl),
    Uses(UsesDecl),
    Method(Rc<MethodDecl>),
}

fn string_literal_text(tok: &Token) -> String {
    match &tok.literal {
        Some(TokenLiteral::Str(s)) => s.clone(),
        _ => tok.text.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_expr_str(src: &str) -> Expr {
        let mut parser = Parser::new(src);
        let expr = parser.parse_expr().expect("expression should parse");
        assert!(parser.errors().is_empty());
        expr
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let expr = parse_expr_str("1 + 2 * 3");
        match expr.kind {
            ExprKind::Binary { op, left, right } => {
                assert_eq!(op, "+");
                assert!(matches!(left.kind, ExprKind::Literal(Literal::Int(1))));
                match right.kind {
                    ExprKind::Binary { op, .. } => assert_eq!(op, "*"),
                    _ => panic!("expected nested multiplication"),
                }
            }
            _ => panic!("expected a binary expression"),
        }
    }

    #[test]
    fn left_associative_equal_precedence_chains_left() {
        let chained = Chained {
            operands: vec![
                Expr::new(ExprKind::Identifier("a".into()), Span::default()),
                Expr::new(ExprKind::Identifier("b".into()), Span::default()),
                Expr::new(ExprKind::Identifier("c".into()), Span::default()),
            ],
            ops: vec![("+".into(), Span::default()), ("+".into(), Span::default())],
        };
        let tree = unchain(chained, &DefaultPrecedencer).unwrap();
        match tree.kind {
            ExprKind::Binary { op, left, .. } => {
                assert_eq!(op, "+");
                assert!(matches!(left.kind, ExprKind::Binary { .. }));
            }
            _ => panic!("expected ((a + b) + c)"),
        }
    }

    struct RightAssocPrecedencer;
    impl Precedencer for RightAssocPrecedencer {
        fn precedence_for(&self, _op: &str) -> i32 {
            1
        }
        fn associativity_for(&self, _op: &str) -> Assoc {
            Assoc::Right
        }
    }

    #[test]
    fn right_associative_equal_precedence_chains_right() {
        let chained = Chained {
            operands: vec![
                Expr::new(ExprKind::Identifier("a".into()), Span::default()),
                Expr::new(ExprKind::Identifier("b".into()), Span::default()),
                Expr::new(ExprKind::Identifier("c".into()), Span::default()),
            ],
            ops: vec![("=".into(), Span::default()), ("=".into(), Span::default())],
        };
        let tree = unchain(chained, &RightAssocPrecedencer).unwrap();
        match tree.kind {
            ExprKind::Binary { op, right, .. } => {
                assert_eq!(op, "=");
                assert!(matches!(right.kind, ExprKind::Binary { .. }));
            }
            _ => panic!("expected (a = (b = c))"),
        }
    }

    struct NonAssocPrecedencer;
    impl Precedencer for NonAssocPrecedencer {
        fn precedence_for(&self, _op: &str) -> i32 {
            1
        }
        fn associativity_for(&self, _op: &str) -> Assoc {
            Assoc::None
        }
    }

    #[test]
    fn non_associative_equal_precedence_is_an_error() {
        let chained = Chained {
            operands: vec![
                Expr::new(ExprKind::Identifier("a".into()), Span::default()),
                Expr::new(ExprKind::Identifier("b".into()), Span::default()),
                Expr::new(ExprKind::Identifier("c".into()), Span::default()),
            ],
            ops: vec![("==".into(), Span::default()), ("==".into(), Span::default())],
        };
        let err = unchain(chained, &NonAssocPrecedencer).unwrap_err();
        assert!(matches!(err, ParseError::NonAssociativeChain { .. }));
    }

    #[test]
    fn postfix_chains_left_to_right() {
        let expr = parse_expr_str("r.m(1)[0]");
        match expr.kind {
            ExprKind::Index { receiver, .. } => match receiver.kind {
                ExprKind::Call { callee, .. } => {
                    assert!(matches!(callee.kind, ExprKind::MemberAccess { .. }));
                }
                _ => panic!("expected a call receiver"),
            },
            _ => panic!("expected an index expression"),
        }
    }

    #[test]
    fn grouping_parens_are_not_a_tuple() {
        let expr = parse_expr_str("(1)");
        assert!(matches!(expr.kind, ExprKind::Literal(Literal::Int(1))));
    }

    #[test]
    fn comma_inside_parens_makes_a_tuple() {
        let expr = parse_expr_str("(1, 2)");
        match expr.kind {
            ExprKind::Tuple(items) => assert_eq!(items.len(), 2),
            _ => panic!("expected a tuple"),
        }
    }

    #[test]
    fn basic_component_and_system_scenario() {
        let src = r#"
            component Cache { param size Int = 1024  method get(k Str) Bool { return true } }
            system S { use c Cache = { size = 2048 } }
        "#;
        let (file, errors) = parse_file("scenario.sdl", src);
        assert!(errors.is_empty());
        assert_eq!(file.declarations.len(), 2);
    }

    #[test]
    fn bare_and_specifier_import_forms() {
        let src = r#"
            import "util.sdl"
            import Status as S from "status.sdl"
        "#;
        let (file, errors) = parse_file("f.sdl", src);
        assert!(errors.is_empty());
        assert_eq!(file.imports.len(), 2);
        assert!(file.imports[0].item.is_none());
        assert_eq!(file.imports[1].binding_name(), Some("S"));
    }

    #[test]
    fn malformed_statement_recovers_to_the_next_one() {
        let src = "component C { method m() { ??? ; return true ; } }";
        let (file, errors) = parse_file("f.sdl", src);
        assert!(!errors.is_empty());
        match &file.declarations[0] {
            TopDecl::Component(c) => {
                let body = c.methods[0].body.as_ref().unwrap();
                match &body.kind {
                    StmtKind::Block(stmts) => {
                        assert_eq!(stmts.len(), 1);
                        assert!(matches!(stmts[0].kind, StmtKind::Return(Some(_))));
                    }
                    _ => panic!("expected a block"),
                }
            }
            _ => panic!("expected a component"),
        }
    }

    #[test]
    fn native_component_methods_have_no_body() {
        let src = "native component Net { method send(b Str) Bool }";
        let (file, errors) = parse_file("f.sdl", src);
        assert!(errors.is_empty());
        match &file.declarations[0] {
            TopDecl::Component(c) => {
                assert!(c.native);
                assert!(c.methods[0].body.is_none());
            }
            _ => panic!("expected a component"),
        }
    }
}
