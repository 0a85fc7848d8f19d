//! End-to-end scenarios exercising the lexer, parser, loader, and type
//! inferencer together through the crate's public API.

use sdlfront::vfs::Memory;
use sdlfront::{ast::ExprKind, ast::Literal, ast::StmtKind, ast::TopDecl};
use sdlfront::{parse_file, Loader, Type, VfsResolver};

fn loader_with(files: &[(&str, &str)]) -> Loader<VfsResolver<Memory>> {
    let fs = Memory::with_files(files.iter().map(|(p, c)| (p.to_string(), c.as_bytes().to_vec())));
    Loader::new(VfsResolver::new(fs), 0)
}

#[test]
fn basic_component_and_system() {
    let src = r#"
        component Cache { param size Int = 1024  method get(k Str) Bool { return true } }
        system S { use c Cache = { size = 2048 } }
    "#;
    let loader = loader_with(&[("f.sdl", src)]);
    let status = loader.load_file("f.sdl", "", 0).expect("load should succeed");
    assert!(
        loader.validate(&status),
        "{:?}",
        status.borrow().errors.iter().map(|e| e.message.clone()).collect::<Vec<_>>()
    );

    let file = status.borrow().file.clone().unwrap();
    match &file.declarations[0] {
        TopDecl::Component(c) => {
            assert_eq!(c.params[0].resolved_type.borrow().clone(), Some(Type::Int));
        }
        _ => panic!("expected a component"),
    }
}

#[test]
fn operator_precedence_builds_canonical_tree() {
    let (file, errors) = parse_file("f.sdl", "system S { let x = 1 + 2 * 3 }");
    assert!(errors.is_empty(), "{errors:?}");
    match &file.declarations[0] {
        TopDecl::System(s) => match &s.items[0] {
            sdlfront::ast::SystemItem::Let { value, .. } => match &value.kind {
                ExprKind::Binary { op, left, right } => {
                    assert_eq!(op, "+");
                    assert!(matches!(left.kind, ExprKind::Literal(Literal::Int(1))));
                    match &right.kind {
                        ExprKind::Binary { op, .. } => assert_eq!(op, "*"),
                        _ => panic!("expected nested multiplication on the right"),
                    }
                }
                _ => panic!("expected a binary expression"),
            },
            _ => panic!("expected a let item"),
        },
        _ => panic!("expected a system"),
    }
}

#[test]
fn int_promotes_to_float_in_defaults_and_returns() {
    let src = "component C { param rate Float = 5  method tick() Float { return 7 } }";
    let loader = loader_with(&[("f.sdl", src)]);
    let status = loader.load_file("f.sdl", "", 0).unwrap();
    assert!(loader.validate(&status), "{:?}", status.borrow().errors);
}

#[test]
fn float_param_with_float_default_and_int_param_with_float_default_boundary() {
    // param p Float = 1 (an Int literal default) must succeed via promotion.
    let ok = loader_with(&[("f.sdl", "component C { param p Float = 1 }")]);
    let status = ok.load_file("f.sdl", "", 0).unwrap();
    assert!(ok.validate(&status));

    // param p Int = 1.0 must fail: Float cannot demote to Int.
    let bad = loader_with(&[("f.sdl", "component C { param p Int = 1.0 }")]);
    let status = bad.load_file("f.sdl", "", 0).unwrap();
    assert!(!bad.validate(&status));
}

#[test]
fn cross_file_import_with_alias() {
    let loader = loader_with(&[
        ("a.sdl", "enum Status { OK FAIL }"),
        (
            "b.sdl",
            r#"import Status as S from "a.sdl" component C { method m() S { return S.OK } }"#,
        ),
    ]);
    let status = loader.load_file("b.sdl", "", 0).unwrap();
    assert!(
        loader.validate(&status),
        "{:?}",
        status.borrow().errors.iter().map(|e| e.message.clone()).collect::<Vec<_>>()
    );
}

#[test]
fn cycle_detection_reports_circular_import_without_panicking() {
    let loader = loader_with(&[
        ("x.sdl", r#"import Y from "y.sdl""#),
        ("y.sdl", r#"import X from "x.sdl""#),
    ]);
    let status = loader.load_file("x.sdl", "", 0).unwrap();
    assert!(!status.borrow().is_ok());
    let message = status.borrow().errors[0].message.clone();
    assert!(message.contains("circular import"), "{message}");
}

#[test]
fn duration_unit_boundary_cases() {
    use sdlfront::lexer::{Lexer, TokenKind, TokenLiteral};

    let mut bad = Lexer::new("1msident");
    let tok = bad.next_token();
    assert_eq!(tok.kind, TokenKind::Error);
    assert_eq!(bad.errors().len(), 1);

    let mut spaced = Lexer::new("10ms ident");
    let dur = spaced.next_token();
    assert_eq!(dur.literal, Some(TokenLiteral::Duration(0.010)));
    let ident = spaced.next_token();
    assert_eq!(ident.kind, TokenKind::Identifier);

    let mut semi = Lexer::new("1ms;");
    let dur = semi.next_token();
    assert_eq!(dur.literal, Some(TokenLiteral::Duration(0.001)));
    assert_eq!(semi.next_token().kind, TokenKind::Semicolon);
}

#[test]
fn max_import_depth_boundary() {
    let files: &[(&str, &str)] = &[("a.sdl", r#"import "b.sdl""#), ("b.sdl", "enum E { A }")];

    let deep_enough = loader_with(files);
    let status = deep_enough.load_file("a.sdl", "", 0);
    assert!(matches!(&status, Ok(s) if s.borrow().is_ok()));

    let shallow_fs = Memory::with_files(files.iter().map(|(p, c)| (p.to_string(), c.as_bytes().to_vec())));
    let shallow = Loader::new(VfsResolver::new(shallow_fs), 1);
    let status = shallow.load_file("a.sdl", "", 0).unwrap();
    assert!(!status.borrow().is_ok());
}

#[test]
fn tuple_literal_index_vs_identifier_index() {
    let good = loader_with(&[(
        "f.sdl",
        r#"component C { method m() Int { let t = (1, "a") return t[0] } }"#,
    )]);
    let status = good.load_file("f.sdl", "", 0).unwrap();
    assert!(good.validate(&status), "{:?}", status.borrow().errors);

    let bad = loader_with(&[(
        "f.sdl",
        r#"component C { method m() Int { let t = (1, "a") let k = 0 return t[k] } }"#,
    )]);
    let status = bad.load_file("f.sdl", "", 0).unwrap();
    assert!(!bad.validate(&status));
}

#[test]
fn sample_and_outcomes_indexing_boundaries() {
    let sample_non_outcomes = loader_with(&[(
        "f.sdl",
        "component C { method m() Int { return sample 5 } }",
    )]);
    let status = sample_non_outcomes.load_file("f.sdl", "", 0).unwrap();
    assert!(!sample_non_outcomes.validate(&status));

    let index_outcomes = loader_with(&[(
        "f.sdl",
        "component C { method m() Int { let d = dist { 1 => 2, 2 => 3 } return d[0] } }",
    )]);
    let status = index_outcomes.load_file("f.sdl", "", 0).unwrap();
    assert!(!index_outcomes.validate(&status));
}

#[test]
fn import_collision_produces_exactly_one_diagnostic() {
    let loader = loader_with(&[
        ("a.sdl", "enum Status { OK }"),
        ("b.sdl", "enum Status { OK }"),
        (
            "c.sdl",
            r#"import Status from "a.sdl" import Status as Status from "b.sdl""#,
        ),
    ]);
    let status = loader.load_file("c.sdl", "", 0).unwrap();
    assert!(!loader.validate(&status));
    let collisions = status
        .borrow()
        .errors
        .iter()
        .filter(|e| e.message.contains("collides"))
        .count();
    assert_eq!(collisions, 1);
}

#[test]
fn every_reachable_expr_gets_an_inferred_type_after_successful_validation() {
    let src = r#"
        component C {
            param size Int = 4
            method m(a Int) Int {
                let x = a + 1
                if x > 0 {
                    return x
                } else {
                    return 0
                }
            }
        }
    "#;
    let loader = loader_with(&[("f.sdl", src)]);
    let status = loader.load_file("f.sdl", "", 0).unwrap();
    assert!(loader.validate(&status), "{:?}", status.borrow().errors);

    let file = status.borrow().file.clone().unwrap();
    match &file.declarations[0] {
        TopDecl::Component(c) => {
            let body = c.methods[0].body.as_ref().unwrap();
            assert_every_expr_typed(body);
        }
        _ => panic!("expected a component"),
    }
}

fn assert_every_expr_typed(stmt: &sdlfront::ast::Stmt) {
    match &stmt.kind {
        StmtKind::Block(stmts) => stmts.iter().for_each(assert_every_expr_typed),
        StmtKind::Let { value, .. } => assert_expr_typed(value),
        StmtKind::Set { target, value } => {
            assert_expr_typed(target);
            assert_expr_typed(value);
        }
        StmtKind::Expr(e) => assert_expr_typed(e),
        StmtKind::Return(Some(e)) => assert_expr_typed(e),
        StmtKind::Return(None) => {}
        StmtKind::If { condition, then_branch, else_branch } => {
            assert_expr_typed(condition);
            assert_every_expr_typed(then_branch);
            if let Some(e) = else_branch {
                assert_every_expr_typed(e);
            }
        }
        StmtKind::For { condition, body } => {
            if let Some(c) = condition {
                assert_expr_typed(c);
            }
            assert_every_expr_typed(body);
        }
        StmtKind::Delay(e) => assert_expr_typed(e),
        StmtKind::Wait(Some(e)) => assert_expr_typed(e),
        StmtKind::Wait(None) => {}
        StmtKind::Log(args) => args.iter().for_each(assert_expr_typed),
        StmtKind::Go(inner) => assert_every_expr_typed(inner),
        StmtKind::Switch { subject, cases, default } => {
            assert_expr_typed(subject);
            for (cond, body) in cases {
                assert_expr_typed(cond);
                assert_every_expr_typed(body);
            }
            if let Some(d) = default {
                assert_every_expr_typed(d);
            }
        }
    }
}

fn assert_expr_typed(expr: &sdlfront::ast::Expr) {
    assert!(expr.get_type().is_some(), "expression at {:?} has no inferred type", expr.span);
    match &expr.kind {
        ExprKind::Binary { left, right, .. } => {
            assert_expr_typed(left);
            assert_expr_typed(right);
        }
        ExprKind::Unary { operand, .. } => assert_expr_typed(operand),
        ExprKind::MemberAccess { receiver, .. } => assert_expr_typed(receiver),
        ExprKind::Index { receiver, index } => {
            assert_expr_typed(receiver);
            assert_expr_typed(index);
        }
        ExprKind::Call { callee, args } => {
            assert_expr_typed(callee);
            args.iter().for_each(assert_expr_typed);
        }
        ExprKind::Tuple(items) => items.iter().for_each(assert_expr_typed),
        ExprKind::Sample(inner) => assert_expr_typed(inner),
        _ => {}
    }
}
