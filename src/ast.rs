//! Abstract syntax tree for the systems-modeling language (C2).
//!
//! The tree is strictly owned: a `FileDecl` owns every node reachable from
//! it. Declarations that can be referenced from other files (components,
//! enums, aggregators, their methods and parameters) are wrapped in `Rc` so
//! that the environment (`crate::env`) and the type model (`crate::types`)
//! can hold a cheap handle to the *same* node rather than a copy — cross-file
//! references are resolved by logical name through the environment, never by
//! AST pointer ownership, so the tree itself never cycles.
//!
//! Every expression carries a `RefCell<Option<Type>>` "inferred type" slot
//! and every `TypeDecl` a `RefCell<Option<Type>>` "resolved type" slot,
//! mutated in place by `crate::infer`.

use std::cell::RefCell;
use std::rc::Rc;

pub use crate::span::Span;
use crate::types::Type;

/// A written type annotation, before resolution against the environment.
#[derive(Debug)]
pub struct TypeDecl {
    pub kind: TypeDeclKind,
    pub span: Span,
    pub resolved: RefCell<Option<Type>>,
}

impl TypeDecl {
    pub fn new(kind: TypeDeclKind, span: Span) -> Self {
        Self {
            kind,
            span,
            resolved: RefCell::new(None),
        }
    }
}

#[derive(Debug)]
pub enum TypeDeclKind {
    /// A bare name: a primitive (`Int`, `Float`, `Bool`, `Str`, `Nil`) or a
    /// user-declared enum/component name, resolved later against the
    /// environment.
    Named(String),
    List(Box<TypeDecl>),
    Tuple(Vec<TypeDecl>),
    Outcomes(Box<TypeDecl>),
}

/// A literal value as written in source, before it is folded into a
/// `crate::types::Value`.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// A duration literal, already normalized to seconds.
    Duration(f64),
}

/// An expression node. Every expression has a mutable inferred-type slot,
/// empty until `crate::infer` visits it.
#[derive(Debug)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
    pub inferred_type: RefCell<Option<Type>>,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self {
            kind,
            span,
            inferred_type: RefCell::new(None),
        }
    }

    pub fn set_type(&self, ty: Type) {
        *self.inferred_type.borrow_mut() = Some(ty);
    }

    pub fn get_type(&self) -> Option<Type> {
        self.inferred_type.borrow().clone()
    }
}

#[derive(Debug)]
pub struct DistributeCase {
    /// The probabilistic weight; must infer as numeric.
    pub weight: Expr,
    pub body: Expr,
    pub span: Span,
}

#[derive(Debug)]
pub struct CaseBranch {
    pub condition: Expr,
    pub body: Expr,
    pub span: Span,
}

#[derive(Debug)]
pub enum ExprKind {
    Literal(Literal),
    Identifier(String),
    Binary {
        op: String,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: String,
        operand: Box<Expr>,
    },
    MemberAccess {
        receiver: Box<Expr>,
        member: String,
    },
    Index {
        receiver: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Tuple(Vec<Expr>),
    /// Draws a concrete value out of an `Outcomes[T]`.
    Sample(Box<Expr>),
    /// A probabilistic case expression producing `Outcomes[T]`.
    Distribute {
        cases: Vec<DistributeCase>,
        default: Option<Box<Expr>>,
        /// Optional total-probability check expression; numeric if present.
        total: Option<Box<Expr>>,
    },
    /// A deterministic case expression, reserved alongside the `switch`
    /// statement as part of the reserved surface grammar.
    Case {
        branches: Vec<CaseBranch>,
        default: Option<Box<Expr>>,
    },
}

/// A statement node.
#[derive(Debug)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug)]
pub enum StmtKind {
    Block(Vec<Stmt>),
    /// `let a, b = expr` — supports tuple destructuring when `names.len() > 1`.
    Let {
        names: Vec<String>,
        value: Expr,
    },
    /// `target = value`, assigning through a `Ref` or to an already-bound
    /// local.
    Set {
        target: Expr,
        value: Expr,
    },
    Expr(Expr),
    Return(Option<Expr>),
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    For {
        condition: Option<Expr>,
        body: Box<Stmt>,
    },
    Delay(Expr),
    Wait(Option<Expr>),
    Log(Vec<Expr>),
    /// Spawns a concurrent statement; not otherwise constrained by
    /// inference.
    Go(Box<Stmt>),
    /// Reserved switch/case surface; parsed but not constrained.
    Switch {
        subject: Expr,
        cases: Vec<(Expr, Stmt)>,
        default: Option<Box<Stmt>>,
    },
}

/// `param name [: type] [= default]`. At least one of `type_decl`/`default`
/// must be present; the parser enforces this, `crate::infer`
/// relies on it.
#[derive(Debug)]
pub struct ParamDecl {
    pub name: String,
    pub type_decl: Option<TypeDecl>,
    pub default: Option<Expr>,
    pub span: Span,
    /// The param's effective type, cached by `crate::infer` Pass I: either
    /// `type_decl` resolved, or (when absent) the default expression's
    /// inferred type. The single place later passes read a param's type
    /// from, regardless of which of `type_decl`/`default` supplied it.
    pub resolved_type: RefCell<Option<Type>>,
}

/// `uses local_name component_name` — a named dependency slot.
#[derive(Debug)]
pub struct UsesDecl {
    pub local_name: String,
    pub component_name: String,
    pub resolved: RefCell<Option<Rc<ComponentDecl>>>,
    pub span: Span,
}

/// A method parameter. Unlike `ParamDecl`, the type annotation is mandatory
///.
#[derive(Debug)]
pub struct MethodParam {
    pub name: String,
    pub type_decl: TypeDecl,
    pub default: Option<Expr>,
    pub span: Span,
}

#[derive(Debug)]
pub struct MethodDecl {
    pub name: String,
    pub params: Vec<MethodParam>,
    pub return_type: Option<TypeDecl>,
    /// `None` for native component method signatures, which declare shape
    /// only.
    pub body: Option<Stmt>,
    pub span: Span,
}

#[derive(Debug)]
pub struct ComponentDecl {
    pub name: String,
    pub native: bool,
    pub params: Vec<ParamDecl>,
    pub uses: Vec<UsesDecl>,
    pub methods: Vec<Rc<MethodDecl>>,
    pub span: Span,
}

impl ComponentDecl {
    pub fn find_param(&self, name: &str) -> Option<&ParamDecl> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn find_uses(&self, name: &str) -> Option<&UsesDecl> {
        self.uses.iter().find(|u| u.local_name == name)
    }

    pub fn find_method(&self, name: &str) -> Option<&Rc<MethodDecl>> {
        self.methods.iter().find(|m| m.name == name)
    }
}

/// `enum Name { A B C }` — ordered, unique values.
#[derive(Debug)]
pub struct EnumDecl {
    pub name: String,
    pub values: Vec<String>,
    pub span: Span,
}

impl EnumDecl {
    pub fn contains(&self, value: &str) -> bool {
        self.values.iter().any(|v| v == value)
    }
}

/// A named, reusable method-like entity.
#[derive(Debug)]
pub struct AggregatorDecl {
    pub name: String,
    pub params: Vec<MethodParam>,
    pub return_type: Option<TypeDecl>,
    pub body: Option<Stmt>,
    pub span: Span,
}

/// `param_or_uses_name = expr` inside an instance body.
#[derive(Debug)]
pub struct Override {
    pub name: String,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug)]
pub struct InstanceDecl {
    pub name: String,
    pub component_name: String,
    pub overrides: Vec<Override>,
    pub span: Span,
}

/// An `options { ... }` block inside a system; its inner items are processed
/// like any other system body.
#[derive(Debug)]
pub struct OptionsDecl {
    pub name: Option<String>,
    pub items: Vec<SystemItem>,
    pub span: Span,
}

#[derive(Debug)]
pub enum SystemItem {
    Instance(InstanceDecl),
    Let { names: Vec<String>, value: Expr, span: Span },
    Set { target: Expr, value: Expr, span: Span },
    Options(OptionsDecl),
}

#[derive(Debug)]
pub struct SystemDecl {
    pub name: String,
    pub items: Vec<SystemItem>,
    pub span: Span,
}

/// `import "path"` or `import item [as alias] from "path"`.
#[derive(Debug)]
pub struct ImportDecl {
    /// `None` for the bare `import "path"` form.
    pub item: Option<String>,
    pub alias: Option<String>,
    /// The path string exactly as it appeared between quotes.
    pub path: String,
    /// Filled in by the loader once the path has been resolved against the
    /// importer's directory.
    pub resolved_path: RefCell<Option<String>>,
    pub span: Span,
}

impl ImportDecl {
    /// The name this import is bound under in the importing file's scope:
    /// the alias if given, otherwise the imported item's own name.
    pub fn binding_name(&self) -> Option<&str> {
        self.alias.as_deref().or(self.item.as_deref())
    }
}

#[derive(Debug)]
pub enum TopDecl {
    Enum(Rc<EnumDecl>),
    Component(Rc<ComponentDecl>),
    Aggregator(Rc<AggregatorDecl>),
    System(Rc<SystemDecl>),
    /// A file-level `options { ... }` block, processed the same
    /// way as one nested in a system.
    Options(Rc<OptionsDecl>),
}

impl TopDecl {
    pub fn name(&self) -> &str {
        match self {
            TopDecl::Enum(d) => &d.name,
            TopDecl::Component(d) => &d.name,
            TopDecl::Aggregator(d) => &d.name,
            TopDecl::System(d) => &d.name,
            TopDecl::Options(d) => d.name.as_deref().unwrap_or("options"),
        }
    }

    pub fn span(&self) -> Span {
        match self {
            TopDecl::Enum(d) => d.span,
            TopDecl::Component(d) => d.span,
            TopDecl::Aggregator(d) => d.span,
            TopDecl::System(d) => d.span,
            TopDecl::Options(d) => d.span,
        }
    }
}

/// A single parsed source file: its imports, its top-level declarations,
/// and — after `resolve()` — the name-indexed lookup maps components,
/// enums, and aggregators are found through.
#[derive(Debug)]
pub struct FileDecl {
    pub path: String,
    pub imports: Vec<ImportDecl>,
    pub declarations: Vec<TopDecl>,
    pub components: RefCell<std::collections::HashMap<String, Rc<ComponentDecl>>>,
    pub enums: RefCell<std::collections::HashMap<String, Rc<EnumDecl>>>,
    pub aggregators: RefCell<std::collections::HashMap<String, Rc<AggregatorDecl>>>,
    pub span: Span,
}

impl FileDecl {
    pub fn new(path: impl Into<String>, imports: Vec<ImportDecl>, declarations: Vec<TopDecl>, span: Span) -> Self {
        Self {
            path: path.into(),
            imports,
            declarations,
            components: RefCell::new(std::collections::HashMap::new()),
            enums: RefCell::new(std::collections::HashMap::new()),
            aggregators: RefCell::new(std::collections::HashMap::new()),
            span,
        }
    }

    /// Indexes local components/enums/aggregators by name, detecting
    /// duplicates. Cheap: one pass over `declarations`, no recursion into
    /// bodies.
    pub fn resolve(&self) -> Vec<crate::error::ResolveError> {
        let mut errors = Vec::new();
        let mut components = self.components.borrow_mut();
        let mut enums = self.enums.borrow_mut();
        let mut aggregators = self.aggregators.borrow_mut();

        for decl in &self.declarations {
            match decl {
                TopDecl::Component(c) => {
                    if components.insert(c.name.clone(), c.clone()).is_some() {
                        errors.push(crate::error::ResolveError::DuplicateLocal {
                            name: c.name.clone(),
                            span: c.span,
                        });
                    }
                }
                TopDecl::Enum(e) => {
                    if enums.insert(e.name.clone(), e.clone()).is_some() {
                        errors.push(crate::error::ResolveError::DuplicateLocal {
                            name: e.name.clone(),
                            span: e.span,
                        });
                    }
                }
                TopDecl::Aggregator(a) => {
                    if aggregators.insert(a.name.clone(), a.clone()).is_some() {
                        errors.push(crate::error::ResolveError::DuplicateLocal {
                            name: a.name.clone(),
                            span: a.span,
                        });
                    }
                }
                TopDecl::System(_) | TopDecl::Options(_) => {}
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span() -> Span {
        Span::default()
    }

    #[test]
    fn resolve_indexes_components_and_flags_duplicates() {
        let a = Rc::new(ComponentDecl {
            name: "Cache".to_string(),
            native: false,
            params: vec![],
            uses: vec![],
            methods: vec![],
            span: span(),
        });
        let b = Rc::new(ComponentDecl {
            name: "Cache".to_string(),
            native: false,
            params: vec![],
            uses: vec![],
            methods: vec![],
            span: span(),
        });
        let file = FileDecl::new(
            "f.sdl",
            vec![],
            vec![TopDecl::Component(a), TopDecl::Component(b)],
            span(),
        );
        let errors = file.resolve();
        assert_eq!(errors.len(), 1);
        assert_eq!(file.components.borrow().len(), 1);
    }

    #[test]
    fn import_binding_name_prefers_alias() {
        let import = ImportDecl {
            item: Some("Status".to_string()),
            alias: Some("S".to_string()),
            path: "a.sdl".to_string(),
            resolved_path: RefCell::new(None),
            span: span(),
        };
        assert_eq!(import.binding_name(), Some("S"));
    }

    #[test]
    fn enum_contains_checks_membership() {
        let e = EnumDecl {
            name: "Status".to_string(),
            values: vec!["OK".to_string(), "FAIL".to_string()],
            span: span(),
        };
        assert!(e.contains("OK"));
        assert!(!e.contains("MAYBE"));
    }
}
