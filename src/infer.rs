//! Multi-pass type inference (C8).
//!
//! `infer_types_for_file` walks a [`FileDecl`] after the loader has staged
//! an environment populated with imported aliases and local declarations
//!. Three passes run in order:
//!
//! 1. **Signatures** — resolves every component's parameter and `uses`
//!    types and every method's signature, independent of any body.
//! 2. **Method bodies** — infers each method body in a scope containing
//!    `self` plus the method's own parameters.
//! 3. **Systems** — binds instances/lets/sets in declaration order, then
//!    type-checks every instance's overrides.
//!
//! Diagnostics are accumulated, never thrown: every function here takes a
//! `&mut Vec<TypeError>` sink and keeps going after a mismatch so later
//! errors in the same file are still reported.

use std::rc::Rc;

use crate::ast::*;
use crate::env::Env;
use crate::error::TypeError;
use crate::types::Type;

/// What a name in scope is bound to. Unlike `crate::ast`'s tree nodes
/// (owned, not `Rc`, outside of components/enums/aggregators/methods),
/// `Symbol` is the cheap handle the environment hands out — see
/// `crate::ast`'s module doc on why cross-file/cross-scope references go
/// through a name table rather than AST pointers.
#[derive(Debug, Clone)]
pub enum Symbol {
    Enum(Rc<EnumDecl>),
    Component(Rc<ComponentDecl>),
    Aggregator(Rc<AggregatorDecl>),
    /// A component's own method, bound so `self.method_name` resolves
    /// without a second lookup through `ComponentDecl::find_method`.
    Method(Rc<ComponentDecl>, Rc<MethodDecl>),
    /// Anything else with a plain type: method/aggregator parameters,
    /// `let`-bound locals (including destructured tuple elements), and
    /// system instance names (bound to `Type::Component` of their
    /// component).
    Local(Type),
}

/// Wraps the lexical scope plus the "current return type" context a
/// `return` statement checks against.
pub struct TypeScope {
    env: Env<Symbol>,
    return_type: Option<Type>,
}

impl TypeScope {
    pub fn new(env: Env<Symbol>) -> Self {
        Self {
            env,
            return_type: None,
        }
    }

    /// Resolves a written type annotation against the environment, caching
    /// the result on `type_decl.resolved` so repeat lookups are O(1).
    /// Unknown names and malformed nesting are reported once, at first
    /// resolution.
    pub fn resolve_type(&self, type_decl: &TypeDecl, errors: &mut Vec<TypeError>) -> Type {
        if let Some(cached) = type_decl.resolved.borrow().clone() {
            return cached;
        }
        let ty = match &type_decl.kind {
            TypeDeclKind::Named(name) => self.resolve_named(name, type_decl.span, errors),
            TypeDeclKind::List(inner) => Type::List(Box::new(self.resolve_type(inner, errors))),
            TypeDeclKind::Outcomes(inner) => Type::Outcomes(Box::new(self.resolve_type(inner, errors))),
            TypeDeclKind::Tuple(items) => {
                Type::Tuple(items.iter().map(|t| self.resolve_type(t, errors)).collect())
            }
        };
        *type_decl.resolved.borrow_mut() = Some(ty.clone());
        ty
    }

    fn resolve_named(&self, name: &str, span: Span, errors: &mut Vec<TypeError>) -> Type {
        match name {
            "Bool" => Type::Bool,
            "Int" => Type::Int,
            "Float" => Type::Float,
            // The lexer's literal/token kind is `Str`; some source programs
            // spell the primitive "String" instead. Both resolve to the
            // same primitive here (see DESIGN.md's Open Questions).
            "Str" | "String" => Type::Str,
            "Nil" => Type::Nil,
            other => match self.env.get(other) {
                Some(sym) => match sym.as_ref() {
                    Symbol::Enum(e) => Type::Enum(e.clone()),
                    Symbol::Component(c) => Type::Component(c.clone()),
                    _ => {
                        errors.push(TypeError::UnresolvedType {
                            name: other.to_string(),
                            span,
                        });
                        Type::Unresolved
                    }
                },
                None => {
                    errors.push(TypeError::UnresolvedType {
                        name: other.to_string(),
                        span,
                    });
                    Type::Unresolved
                }
            },
        }
    }
}

/// Two types are compatible for "share a common type" purposes (distribute
/// branches, tuple destructuring element-wise) if they're equal either way
/// under Int-to-Float promotion.
fn compatible(a: &Type, b: &Type) -> bool {
    a == b || a.equals_with_promotion(b) || b.equals_with_promotion(a)
}

fn param_type(p: &ParamDecl) -> Type {
    p.resolved_type.borrow().clone().unwrap_or(Type::Unresolved)
}

/// Entry point: infers every component signature and body, then every
/// system, over one file's already-resolved environment.
pub fn infer_types_for_file(file: &FileDecl, env: Env<Symbol>) -> Vec<TypeError> {
    let mut errors = Vec::new();
    let mut scope = TypeScope::new(env);

    for decl in &file.declarations {
        match decl {
            TopDecl::Component(c) => infer_component_signature(c, &mut scope, &mut errors),
            TopDecl::Aggregator(a) => infer_aggregator_signature(a, &mut scope, &mut errors),
            _ => {}
        }
    }
    for decl in &file.declarations {
        match decl {
            TopDecl::Component(c) => infer_component_bodies(c, &mut scope, &mut errors),
            TopDecl::Aggregator(a) => infer_aggregator_body(a, &mut scope, &mut errors),
            _ => {}
        }
    }
    for decl in &file.declarations {
        match decl {
            TopDecl::System(s) => infer_system_block(&s.items, &mut scope, &mut errors),
            TopDecl::Options(o) => infer_system_block(&o.items, &mut scope, &mut errors),
            _ => {}
        }
    }
    errors
}

// ---- Pass I: signatures --------------------------------------------------

fn infer_component_signature(comp: &Rc<ComponentDecl>, scope: &mut TypeScope, errors: &mut Vec<TypeError>) {
    for p in &comp.params {
        let resolved = match (&p.type_decl, &p.default) {
            (Some(td), Some(default)) => {
                let declared = scope.resolve_type(td, errors);
                let default_ty = infer_expr(default, scope, errors);
                if !default_ty.equals_with_promotion(&declared) {
                    errors.push(TypeError::Mismatch {
                        expected: declared.display_name(),
                        found: default_ty.display_name(),
                        span: default.span,
                    });
                }
                declared
            }
            (Some(td), None) => scope.resolve_type(td, errors),
            (None, Some(default)) => infer_expr(default, scope, errors),
            (None, None) => {
                errors.push(TypeError::ParamNeedsTypeOrDefault {
                    name: p.name.clone(),
                    span: p.span,
                });
                Type::Unresolved
            }
        };
        *p.resolved_type.borrow_mut() = Some(resolved);
    }

    for u in &comp.uses {
        match scope.env.get(&u.component_name) {
            Some(sym) => match sym.as_ref() {
                Symbol::Component(found) => *u.resolved.borrow_mut() = Some(found.clone()),
                _ => errors.push(TypeError::UnknownComponent {
                    name: u.component_name.clone(),
                    span: u.span,
                }),
            },
            None => errors.push(TypeError::UnknownComponent {
                name: u.component_name.clone(),
                span: u.span,
            }),
        }
    }

    for m in &comp.methods {
        for p in &m.params {
            scope.resolve_type(&p.type_decl, errors);
        }
        if let Some(rt) = &m.return_type {
            scope.resolve_type(rt, errors);
        }
    }
}

fn infer_aggregator_signature(agg: &Rc<AggregatorDecl>, scope: &mut TypeScope, errors: &mut Vec<TypeError>) {
    for p in &agg.params {
        scope.resolve_type(&p.type_decl, errors);
    }
    if let Some(rt) = &agg.return_type {
        scope.resolve_type(rt, errors);
    }
}

// ---- Pass II: bodies ------------------------------------------------------

fn infer_component_bodies(comp: &Rc<ComponentDecl>, scope: &mut TypeScope, errors: &mut Vec<TypeError>) {
    for method in &comp.methods {
        let Some(body) = &method.body else { continue };
        scope.env.push();
        scope.env.set("self", Rc::new(Symbol::Component(comp.clone())));
        for p in &method.params {
            let ty = scope.resolve_type(&p.type_decl, errors);
            scope.env.set(p.name.clone(), Rc::new(Symbol::Local(ty)));
        }
        let return_type = method
            .return_type
            .as_ref()
            .map(|rt| scope.resolve_type(rt, errors))
            .unwrap_or(Type::Nil);
        let prev_return = scope.return_type.replace(return_type);
        infer_stmt(body, scope, errors);
        scope.return_type = prev_return;
        scope.env.pop();
    }
}

fn infer_aggregator_body(agg: &Rc<AggregatorDecl>, scope: &mut TypeScope, errors: &mut Vec<TypeError>) {
    let Some(body) = &agg.body else { return };
    scope.env.push();
    for p in &agg.params {
        let ty = scope.resolve_type(&p.type_decl, errors);
        scope.env.set(p.name.clone(), Rc::new(Symbol::Local(ty)));
    }
    let return_type = agg
        .return_type
        .as_ref()
        .map(|rt| scope.resolve_type(rt, errors))
        .unwrap_or(Type::Nil);
    let prev_return = scope.return_type.replace(return_type);
    infer_stmt(body, scope, errors);
    scope.return_type = prev_return;
    scope.env.pop();
}

// ---- Pass III: systems ------------------------------------------------------

/// Shared by `SystemDecl` and nested `OptionsDecl` bodies: binds instances/lets/sets in order, then
/// type-checks every instance's overrides found anywhere in this block,
/// including inside nested `options { ... }` items.
fn infer_system_block(items: &[SystemItem], scope: &mut TypeScope, errors: &mut Vec<TypeError>) {
    scope.env.push();
    for item in items {
        match item {
            SystemItem::Instance(inst) => infer_instance_binding(inst, scope, errors),
            SystemItem::Let { names, value, .. } => infer_let_binding(names, value, scope, errors),
            SystemItem::Set { target, value, .. } => infer_set(target, value, scope, errors),
            SystemItem::Options(opts) => infer_system_block(&opts.items, scope, errors),
        }
    }
    check_overrides_in_block(items, scope, errors);
    scope.env.pop();
}

fn infer_instance_binding(inst: &InstanceDecl, scope: &mut TypeScope, errors: &mut Vec<TypeError>) {
    match scope.env.get(&inst.component_name) {
        Some(sym) => match sym.as_ref() {
            Symbol::Component(c) => {
                scope
                    .env
                    .set(inst.name.clone(), Rc::new(Symbol::Local(Type::Component(c.clone()))));
            }
            _ => errors.push(TypeError::UnknownComponent {
                name: inst.component_name.clone(),
                span: inst.span,
            }),
        },
        None => errors.push(TypeError::UnknownComponent {
            name: inst.component_name.clone(),
            span: inst.span,
        }),
    }
}

fn check_overrides_in_block(items: &[SystemItem], scope: &mut TypeScope, errors: &mut Vec<TypeError>) {
    for item in items {
        match item {
            SystemItem::Instance(inst) => check_instance_overrides(inst, scope, errors),
            SystemItem::Options(opts) => check_overrides_in_block(&opts.items, scope, errors),
            _ => {}
        }
    }
}

fn check_instance_overrides(inst: &InstanceDecl, scope: &mut TypeScope, errors: &mut Vec<TypeError>) {
    let comp = match scope.env.get(&inst.name) {
        Some(sym) => match sym.as_ref() {
            Symbol::Local(Type::Component(c)) => c.clone(),
            _ => return, // binding failed earlier; already reported.
        },
        None => return,
    };

    for ov in &inst.overrides {
        if let Some(p) = comp.find_param(&ov.name) {
            let expected = param_type(p);
            let actual = infer_expr(&ov.value, scope, errors);
            if !actual.equals_with_promotion(&expected) {
                errors.push(TypeError::Mismatch {
                    expected: expected.display_name(),
                    found: actual.display_name(),
                    span: ov.value.span,
                });
            }
        } else if let Some(u) = comp.find_uses(&ov.name) {
            match &ov.value.kind {
                ExprKind::Identifier(name) => match scope.env.get(name) {
                    Some(sym) => match sym.as_ref() {
                        Symbol::Local(Type::Component(target_comp)) => {
                            let matches = match u.resolved.borrow().as_ref() {
                                Some(dep_comp) => Rc::ptr_eq(dep_comp, target_comp),
                                None => false,
                            };
                            if !matches {
                                errors.push(TypeError::Mismatch {
                                    expected: u
                                        .resolved
                                        .borrow()
                                        .as_ref()
                                        .map(|d| d.name.clone())
                                        .unwrap_or_else(|| "<unresolved>".to_string()),
                                    found: target_comp.name.clone(),
                                    span: ov.value.span,
                                });
                            }
                        }
                        _ => errors.push(TypeError::Other {
                            message: format!("'{name}' does not name a component instance"),
                            span: ov.value.span,
                        }),
                    },
                    None => errors.push(TypeError::Undefined {
                        name: name.clone(),
                        span: ov.value.span,
                    }),
                },
                _ => errors.push(TypeError::Other {
                    message: "dependency override must name an instance".to_string(),
                    span: ov.value.span,
                }),
            }
        } else {
            errors.push(TypeError::UnknownOverrideTarget {
                name: ov.name.clone(),
                component: comp.name.clone(),
                span: ov.span,
            });
        }
    }
}

// ---- Statements -------------------------------------------------------------

fn infer_stmt(stmt: &Stmt, scope: &mut TypeScope, errors: &mut Vec<TypeError>) {
    match &stmt.kind {
        StmtKind::Block(stmts) => {
            scope.env.push();
            for s in stmts {
                infer_stmt(s, scope, errors);
            }
            scope.env.pop();
        }
        StmtKind::Let { names, value } => infer_let_binding(names, value, scope, errors),
        StmtKind::Set { target, value } => infer_set(target, value, scope, errors),
        StmtKind::Expr(e) => {
            infer_expr(e, scope, errors);
        }
        StmtKind::Return(value) => {
            let actual = match value {
                Some(e) => infer_expr(e, scope, errors),
                None => Type::Nil,
            };
            match scope.return_type.clone() {
                Some(expected) => {
                    if !actual.equals_with_promotion(&expected) {
                        errors.push(TypeError::Mismatch {
                            expected: expected.display_name(),
                            found: actual.display_name(),
                            span: stmt.span,
                        });
                    }
                }
                None => errors.push(TypeError::ReturnOutsideMethod { span: stmt.span }),
            }
        }
        StmtKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            let c = infer_expr(condition, scope, errors);
            if c != Type::Bool {
                errors.push(TypeError::Mismatch {
                    expected: "Bool".to_string(),
                    found: c.display_name(),
                    span: condition.span,
                });
            }
            infer_stmt(then_branch, scope, errors);
            if let Some(e) = else_branch {
                infer_stmt(e, scope, errors);
            }
        }
        StmtKind::For { condition, body } => {
            if let Some(c) = condition {
                let ct = infer_expr(c, scope, errors);
                if ct != Type::Bool && ct != Type::Int {
                    errors.push(TypeError::Mismatch {
                        expected: "Bool or Int".to_string(),
                        found: ct.display_name(),
                        span: c.span,
                    });
                }
            }
            infer_stmt(body, scope, errors);
        }
        StmtKind::Delay(e) => {
            let t = infer_expr(e, scope, errors);
            if !t.is_numeric() {
                errors.push(TypeError::NonNumericCondition {
                    found: t.display_name(),
                    span: e.span,
                });
            }
        }
        StmtKind::Wait(opt) => {
            if let Some(e) = opt {
                infer_expr(e, scope, errors);
            }
        }
        StmtKind::Log(args) => {
            for a in args {
                infer_expr(a, scope, errors);
            }
        }
        StmtKind::Go(inner) => infer_stmt(inner, scope, errors),
        StmtKind::Switch {
            subject,
            cases,
            default,
        } => {
            infer_expr(subject, scope, errors);
            for (cond, body) in cases {
                infer_expr(cond, scope, errors);
                infer_stmt(body, scope, errors);
            }
            if let Some(d) = default {
                infer_stmt(d, scope, errors);
            }
        }
    }
}

fn infer_let_binding(names: &[String], value: &Expr, scope: &mut TypeScope, errors: &mut Vec<TypeError>) {
    let value_ty = infer_expr(value, scope, errors);
    if names.len() == 1 {
        scope.env.set(names[0].clone(), Rc::new(Symbol::Local(value_ty)));
        return;
    }
    match &value_ty {
        Type::Tuple(elems) if elems.len() == names.len() => {
            for (name, elem_ty) in names.iter().zip(elems.iter()) {
                scope.env.set(name.clone(), Rc::new(Symbol::Local(elem_ty.clone())));
            }
        }
        _ => {
            errors.push(TypeError::Mismatch {
                expected: format!("Tuple[{} elements]", names.len()),
                found: value_ty.display_name(),
                span: value.span,
            });
            for name in names {
                scope
                    .env
                    .set(name.clone(), Rc::new(Symbol::Local(Type::Unresolved)));
            }
        }
    }
}

fn infer_set(target: &Expr, value: &Expr, scope: &mut TypeScope, errors: &mut Vec<TypeError>) {
    let target_ty = infer_expr(target, scope, errors);
    let value_ty = infer_expr(value, scope, errors);
    match target_ty {
        Type::Ref(_, inner) => {
            if !value_ty.equals_with_promotion(&inner) {
                errors.push(TypeError::Mismatch {
                    expected: inner.display_name(),
                    found: value_ty.display_name(),
                    span: value.span,
                });
            }
        }
        other => errors.push(TypeError::NonRefSetTarget {
            found: other.display_name(),
            span: target.span,
        }),
    }
}

// ---- Expressions ------------------------------------------------------------

fn infer_expr(expr: &Expr, scope: &mut TypeScope, errors: &mut Vec<TypeError>) -> Type {
    let ty = match &expr.kind {
        ExprKind::Literal(lit) => literal_type(lit),
        ExprKind::Identifier(name) => infer_identifier(name, expr.span, scope, errors),
        ExprKind::Binary { op, left, right } => {
            let l = infer_expr(left, scope, errors);
            let r = infer_expr(right, scope, errors);
            infer_binary(op, &l, &r, expr.span, errors)
        }
        ExprKind::Unary { op, operand } => {
            let t = infer_expr(operand, scope, errors);
            infer_unary(op, &t, expr.span, errors)
        }
        ExprKind::MemberAccess { receiver, member } => {
            let rt = infer_expr(receiver, scope, errors);
            infer_member(&rt, member, expr.span, errors)
        }
        ExprKind::Index { receiver, index } => {
            let rt = infer_expr(receiver, scope, errors);
            infer_index(&rt, index, expr.span, scope, errors)
        }
        ExprKind::Call { callee, args } => {
            let ct = infer_expr(callee, scope, errors);
            infer_call(&ct, args, expr.span, scope, errors)
        }
        ExprKind::Tuple(items) => {
            Type::Tuple(items.iter().map(|i| infer_expr(i, scope, errors)).collect())
        }
        ExprKind::Sample(inner) => {
            let it = infer_expr(inner, scope, errors);
            infer_sample(&it, expr.span, errors)
        }
        ExprKind::Distribute { cases, default, total } => {
            infer_distribute(cases, default, total, scope, errors)
        }
        ExprKind::Case { branches, default } => infer_case(branches, default, scope, errors),
    };
    expr.set_type(ty.clone());
    ty
}

fn literal_type(lit: &Literal) -> Type {
    match lit {
        Literal::Bool(_) => Type::Bool,
        Literal::Int(_) => Type::Int,
        Literal::Float(_) => Type::Float,
        Literal::Str(_) => Type::Str,
        // Canonical internal unit is seconds, represented as Float.
        Literal::Duration(_) => Type::Float,
    }
}

fn infer_identifier(name: &str, span: Span, scope: &mut TypeScope, errors: &mut Vec<TypeError>) -> Type {
    match scope.env.get(name) {
        Some(sym) => match sym.as_ref() {
            Symbol::Enum(e) => Type::Enum(e.clone()),
            Symbol::Component(c) => Type::Component(c.clone()),
            Symbol::Aggregator(a) => Type::Aggregator(a.clone()),
            Symbol::Method(c, m) => Type::Method(c.clone(), m.clone()),
            Symbol::Local(t) => t.clone(),
        },
        None => {
            errors.push(TypeError::Undefined {
                name: name.to_string(),
                span,
            });
            Type::Unresolved
        }
    }
}

fn infer_member(receiver: &Type, member: &str, span: Span, errors: &mut Vec<TypeError>) -> Type {
    match receiver {
        Type::Enum(e) => {
            if e.contains(member) {
                Type::Enum(e.clone())
            } else {
                errors.push(TypeError::NoSuchMember {
                    name: e.name.clone(),
                    member: member.to_string(),
                    span,
                });
                Type::Unresolved
            }
        }
        // A `Ref` unwraps to its inner component context for further
        // member resolution.
        Type::Ref(_, inner) => match inner.as_ref() {
            Type::Component(_) => infer_member(inner, member, span, errors),
            other => {
                errors.push(TypeError::NoSuchMember {
                    name: other.display_name(),
                    member: member.to_string(),
                    span,
                });
                Type::Unresolved
            }
        },
        Type::Component(c) => {
            if let Some(p) = c.find_param(member) {
                Type::Ref(c.clone(), Box::new(param_type(p)))
            } else if let Some(u) = c.find_uses(member) {
                match u.resolved.borrow().as_ref() {
                    Some(dep) => Type::Ref(c.clone(), Box::new(Type::Component(dep.clone()))),
                    None => {
                        errors.push(TypeError::NoSuchMember {
                            name: c.name.clone(),
                            member: member.to_string(),
                            span,
                        });
                        Type::Unresolved
                    }
                }
            } else if let Some(m) = c.find_method(member) {
                Type::Method(c.clone(), m.clone())
            } else {
                errors.push(TypeError::NoSuchMember {
                    name: c.name.clone(),
                    member: member.to_string(),
                    span,
                });
                Type::Unresolved
            }
        }
        other => {
            errors.push(TypeError::NoSuchMember {
                name: other.display_name(),
                member: member.to_string(),
                span,
            });
            Type::Unresolved
        }
    }
}

fn infer_index(
    receiver: &Type,
    index_expr: &Expr,
    span: Span,
    scope: &mut TypeScope,
    errors: &mut Vec<TypeError>,
) -> Type {
    match receiver {
        Type::List(elem) => {
            let key_ty = infer_expr(index_expr, scope, errors);
            if key_ty != Type::Int {
                errors.push(TypeError::NonIntIndex {
                    found: key_ty.display_name(),
                    span: index_expr.span,
                });
            }
            elem.as_ref().clone()
        }
        Type::Tuple(elems) => match &index_expr.kind {
            ExprKind::Literal(Literal::Int(i)) => {
                index_expr.set_type(Type::Int);
                let idx = *i as usize;
                match elems.get(idx) {
                    Some(t) => t.clone(),
                    None => {
                        errors.push(TypeError::Other {
                            message: format!("tuple index {i} out of range"),
                            span: index_expr.span,
                        });
                        Type::Unresolved
                    }
                }
            }
            _ => {
                infer_expr(index_expr, scope, errors);
                errors.push(TypeError::NonLiteralTupleIndex {
                    span: index_expr.span,
                });
                Type::Unresolved
            }
        },
        Type::Str => {
            let key_ty = infer_expr(index_expr, scope, errors);
            if key_ty != Type::Int {
                errors.push(TypeError::NonIntIndex {
                    found: key_ty.display_name(),
                    span: index_expr.span,
                });
            }
            Type::Str
        }
        Type::Outcomes(_) => {
            infer_expr(index_expr, scope, errors);
            errors.push(TypeError::IndexingOutcomes { span });
            Type::Unresolved
        }
        other => {
            infer_expr(index_expr, scope, errors);
            errors.push(TypeError::Other {
                message: format!("cannot index a value of type {}", other.display_name()),
                span,
            });
            Type::Unresolved
        }
    }
}

fn infer_binary(op: &str, left: &Type, right: &Type, span: Span, errors: &mut Vec<TypeError>) -> Type {
    match op {
        "+" | "-" | "*" | "/" => {
            if *left == Type::Int && *right == Type::Int {
                Type::Int
            } else if left.is_numeric() && right.is_numeric() {
                Type::Float
            } else if op == "+" && *left == Type::Str && *right == Type::Str {
                Type::Str
            } else {
                errors.push(TypeError::Mismatch {
                    expected: "two numeric operands".to_string(),
                    found: format!("{} {op} {}", left.display_name(), right.display_name()),
                    span,
                });
                Type::Unresolved
            }
        }
        "%" => {
            if *left == Type::Int && *right == Type::Int {
                Type::Int
            } else {
                errors.push(TypeError::Mismatch {
                    expected: "Int % Int".to_string(),
                    found: format!("{} % {}", left.display_name(), right.display_name()),
                    span,
                });
                Type::Unresolved
            }
        }
        "==" | "!=" | "<" | "<=" | ">" | ">=" => {
            if left.is_numeric() && right.is_numeric() {
                Type::Bool
            } else if left == right {
                Type::Bool
            } else {
                errors.push(TypeError::Mismatch {
                    expected: left.display_name(),
                    found: right.display_name(),
                    span,
                });
                Type::Unresolved
            }
        }
        "&&" | "||" => {
            if *left == Type::Bool && *right == Type::Bool {
                Type::Bool
            } else {
                errors.push(TypeError::Mismatch {
                    expected: "Bool".to_string(),
                    found: format!("{} {op} {}", left.display_name(), right.display_name()),
                    span,
                });
                Type::Unresolved
            }
        }
        _ => {
            errors.push(TypeError::Other {
                message: format!("unknown binary operator '{op}'"),
                span,
            });
            Type::Unresolved
        }
    }
}

fn infer_unary(op: &str, operand: &Type, span: Span, errors: &mut Vec<TypeError>) -> Type {
    match op {
        "!" | "not" => {
            if *operand == Type::Bool {
                Type::Bool
            } else {
                errors.push(TypeError::Mismatch {
                    expected: "Bool".to_string(),
                    found: operand.display_name(),
                    span,
                });
                Type::Unresolved
            }
        }
        "-" => {
            if operand.is_numeric() {
                operand.clone()
            } else {
                errors.push(TypeError::Mismatch {
                    expected: "a numeric type".to_string(),
                    found: operand.display_name(),
                    span,
                });
                Type::Unresolved
            }
        }
        _ => {
            errors.push(TypeError::Other {
                message: format!("unknown unary operator '{op}'"),
                span,
            });
            Type::Unresolved
        }
    }
}

fn infer_call(callee: &Type, args: &[Expr], span: Span, scope: &mut TypeScope, errors: &mut Vec<TypeError>) -> Type {
    match callee {
        Type::Method(_, m) => {
            check_args(&m.params, args, scope, errors);
            m.return_type
                .as_ref()
                .map(|rt| scope.resolve_type(rt, errors))
                .unwrap_or(Type::Nil)
        }
        Type::Aggregator(a) => {
            check_args(&a.params, args, scope, errors);
            a.return_type
                .as_ref()
                .map(|rt| scope.resolve_type(rt, errors))
                .unwrap_or(Type::Nil)
        }
        other => {
            for a in args {
                infer_expr(a, scope, errors);
            }
            errors.push(TypeError::Other {
                message: format!("cannot call a value of type {}", other.display_name()),
                span,
            });
            Type::Unresolved
        }
    }
}

fn check_args(params: &[MethodParam], args: &[Expr], scope: &mut TypeScope, errors: &mut Vec<TypeError>) {
    if params.len() != args.len() {
        let span = args
            .first()
            .map(|a| a.span)
            .or_else(|| params.first().map(|p| p.span))
            .unwrap_or_default();
        errors.push(TypeError::ArityMismatch {
            expected: params.len(),
            found: args.len(),
            span,
        });
    }
    for (p, a) in params.iter().zip(args.iter()) {
        let expected = scope.resolve_type(&p.type_decl, errors);
        let actual = infer_expr(a, scope, errors);
        if !actual.equals_with_promotion(&expected) {
            errors.push(TypeError::Mismatch {
                expected: expected.display_name(),
                found: actual.display_name(),
                span: a.span,
            });
        }
    }
    for extra in args.iter().skip(params.len()) {
        infer_expr(extra, scope, errors);
    }
}

fn infer_sample(inner: &Type, span: Span, errors: &mut Vec<TypeError>) -> Type {
    match inner {
        Type::Outcomes(t) => t.as_ref().clone(),
        other => {
            errors.push(TypeError::NonOutcomesSample {
                found: other.display_name(),
                span,
            });
            Type::Unresolved
        }
    }
}

fn infer_distribute(
    cases: &[DistributeCase],
    default: &Option<Box<Expr>>,
    total: &Option<Box<Expr>>,
    scope: &mut TypeScope,
    errors: &mut Vec<TypeError>,
) -> Type {
    let mut body_ty: Option<Type> = None;
    for case in cases {
        let w = infer_expr(&case.weight, scope, errors);
        if !w.is_numeric() {
            errors.push(TypeError::NonNumericCondition {
                found: w.display_name(),
                span: case.weight.span,
            });
        }
        let b = infer_expr(&case.body, scope, errors);
        match &body_ty {
            None => body_ty = Some(b),
            Some(t) if compatible(t, &b) => {}
            Some(_) => errors.push(TypeError::DistributeTypeMismatch { span: case.body.span }),
        }
    }
    if let Some(d) = default {
        let b = infer_expr(d, scope, errors);
        match &body_ty {
            None => body_ty = Some(b),
            Some(t) if compatible(t, &b) => {}
            Some(_) => errors.push(TypeError::DistributeTypeMismatch { span: d.span }),
        }
    }
    if let Some(t) = total {
        let tt = infer_expr(t, scope, errors);
        if !tt.is_numeric() {
            errors.push(TypeError::NonNumericCondition {
                found: tt.display_name(),
                span: t.span,
            });
        }
    }
    Type::Outcomes(Box::new(body_ty.unwrap_or(Type::Unresolved)))
}

/// `case` is reserved alongside the `switch` statement and is
/// not constrained by inference beyond inferring its subexpressions, so
/// every reachable `Expr` still ends up with a slot.
fn infer_case(
    branches: &[CaseBranch],
    default: &Option<Box<Expr>>,
    scope: &mut TypeScope,
    errors: &mut Vec<TypeError>,
) -> Type {
    let mut body_ty = None;
    for b in branches {
        infer_expr(&b.condition, scope, errors);
        let bt = infer_expr(&b.body, scope, errors);
        if body_ty.is_none() {
            body_ty = Some(bt);
        }
    }
    if let Some(d) = default {
        let dt = infer_expr(d, scope, errors);
        if body_ty.is_none() {
            body_ty = Some(dt);
        }
    }
    body_ty.unwrap_or(Type::Nil)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_file;

    fn infer_source(src: &str) -> (FileDecl, Vec<TypeError>) {
        let (file, parse_errors) = parse_file("t.sdl", src);
        assert!(parse_errors.is_empty(), "{parse_errors:?}");
        let resolve_errors = file.resolve();
        assert!(resolve_errors.is_empty(), "{resolve_errors:?}");

        let mut env: Env<Symbol> = Env::new();
        for decl in &file.declarations {
            match decl {
                TopDecl::Enum(e) => env.set(e.name.clone(), Rc::new(Symbol::Enum(e.clone()))),
                TopDecl::Component(c) => env.set(c.name.clone(), Rc::new(Symbol::Component(c.clone()))),
                TopDecl::Aggregator(a) => env.set(a.name.clone(), Rc::new(Symbol::Aggregator(a.clone()))),
                _ => None,
            };
        }
        let errors = infer_types_for_file(&file, env);
        (file, errors)
    }

    #[test]
    fn basic_component_and_system_scenario() {
        let src = r#"
            component Cache { param size Int = 1024  method get(k Str) Bool { return true } }
            system S { use c Cache = { size = 2048 } }
        "#;
        let (file, errors) = infer_source(src);
        assert!(errors.is_empty(), "{errors:?}");
        match &file.declarations[0] {
            TopDecl::Component(c) => {
                assert_eq!(param_type(&c.params[0]), Type::Int);
            }
            _ => panic!(),
        }
    }

    #[test]
    fn operator_precedence_scenario() {
        let (file, errors) = infer_source("system S { let x = 1 + 2 * 3 }");
        assert!(errors.is_empty(), "{errors:?}");
        match &file.declarations[0] {
            TopDecl::System(s) => match &s.items[0] {
                SystemItem::Let { value, .. } => assert_eq!(value.get_type(), Some(Type::Int)),
                _ => panic!(),
            },
            _ => panic!(),
        }
    }

    #[test]
    fn int_to_float_promotion_in_defaults() {
        let src = "component C { param rate Float = 5  method tick() Float { return 7 } }";
        let (_, errors) = infer_source(src);
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn int_param_rejects_float_default() {
        let src = "component C { param p Int = 1.0 }";
        let (_, errors) = infer_source(src);
        assert!(!errors.is_empty());
        assert!(matches!(errors[0], TypeError::Mismatch { .. }));
    }

    #[test]
    fn tuple_literal_index_returns_element_type() {
        let src = "component C { method m() Int { let t = (1, \"a\") return t[0] } }";
        let (_, errors) = infer_source(src);
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn tuple_identifier_index_is_an_error() {
        let src = "component C { method m() Int { let t = (1, \"a\") let k = 0 return t[k] } }";
        let (_, errors) = infer_source(src);
        assert!(errors.iter().any(|e| matches!(e, TypeError::NonLiteralTupleIndex { .. })));
    }

    #[test]
    fn sample_on_non_outcomes_is_an_error() {
        let src = "component C { method m() Int { return sample 5 } }";
        let (_, errors) = infer_source(src);
        assert!(errors.iter().any(|e| matches!(e, TypeError::NonOutcomesSample { .. })));
    }

    #[test]
    fn indexing_outcomes_directly_is_an_error() {
        let src = "component C { method m() Int { let d = dist { 1 => 2, 2 => 3 } return d[0] } }";
        let (_, errors) = infer_source(src);
        assert!(errors.iter().any(|e| matches!(e, TypeError::IndexingOutcomes { .. })));
    }

    #[test]
    fn distribute_requires_common_branch_type() {
        let src = r#"component C { method m() Int { let d = dist { 1 => 2, 2 => "x" } return sample d } }"#;
        let (_, errors) = infer_source(src);
        assert!(errors.iter().any(|e| matches!(e, TypeError::DistributeTypeMismatch { .. })));
    }

    #[test]
    fn return_outside_method_is_an_error() {
        // `return` isn't valid system-item syntax, so build the statement directly.
        let stmt = Stmt::new(
            StmtKind::Return(Some(Expr::new(ExprKind::Literal(Literal::Int(1)), Span::default()))),
            Span::default(),
        );
        let mut scope = TypeScope::new(Env::new());
        let mut errors = Vec::new();
        infer_stmt(&stmt, &mut scope, &mut errors);
        assert!(matches!(errors[0], TypeError::ReturnOutsideMethod { .. }));
    }

    #[test]
    fn set_requires_ref_lhs() {
        let src = "component C { param p Int = 1  method m() { p = 2 } }";
        let (_, errors) = infer_source(src);
        assert!(errors.iter().any(|e| matches!(e, TypeError::Undefined { .. })));
    }

    #[test]
    fn set_through_self_ref_type_checks() {
        let src = "component C { param p Int = 1  method m() { self.p = 2 } }";
        let (_, errors) = infer_source(src);
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn let_destructures_tuple_element_types() {
        let src = r#"component C { method m() Str { let a, b = (1, "hi") return b } }"#;
        let (_, errors) = infer_source(src);
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn call_arity_mismatch_is_reported() {
        let src = "component C { method m(a Int) { } method n() { self.m(1, 2) } }";
        let (_, errors) = infer_source(src);
        assert!(errors.iter().any(|e| matches!(e, TypeError::ArityMismatch { .. })));
    }
}
