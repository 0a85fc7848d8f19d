//! Lexical, nestable name -> declaration scope (C6).
//!
//! `Env` is a stack of frames forming a tree that mirrors the AST: a file's
//! root scope, with a child per component, with a grandchild per method body.
//! `push` returns a fresh child frame; `set` always writes into the
//! innermost frame; `get` searches innermost-outward so inner declarations
//! shadow outer ones. `get_local` only looks at the innermost frame, which is
//! what callers use to diagnose redefinition within the same lexical scope
//! without rejecting legitimate shadowing.

use std::collections::HashMap;
use std::rc::Rc;

/// A single lexical scope frame, plus a link to its parent.
///
/// `Node` is generic so the same structure serves both the type-resolution
/// scope (`crate::infer::TypeScope`, bindings are AST declaration handles)
/// and any other name->node table a caller wants a scope stack for.
pub struct Env<Node> {
    frames: Vec<HashMap<String, Rc<Node>>>,
}

impl<Node> Env<Node> {
    /// A fresh environment with a single (root) frame.
    pub fn new() -> Self {
        Self {
            frames: vec![HashMap::new()],
        }
    }

    /// Pushes a new, empty child frame. Pair with `pop` (or rely on the
    /// `ScopeGuard` below) to keep scopes balanced.
    pub fn push(&mut self) {
        self.frames.push(HashMap::new());
    }

    /// Pops the innermost frame. Panics if called on the root frame: callers
    /// must never pop past the bottom of the stack.
    pub fn pop(&mut self) {
        assert!(self.frames.len() > 1, "cannot pop the root scope");
        self.frames.pop();
    }

    /// Binds `name` in the innermost frame, returning the previous binding
    /// (if any) for that name *in this frame only* — callers use this to
    /// detect same-scope redefinitions without consulting `get_local`
    /// separately.
    pub fn set(&mut self, name: impl Into<String>, node: Rc<Node>) -> Option<Rc<Node>> {
        self.frames
            .last_mut()
            .expect("env always has at least the root frame")
            .insert(name.into(), node)
    }

    /// Searches innermost-outward, returning the first binding found.
    pub fn get(&self, name: &str) -> Option<Rc<Node>> {
        for frame in self.frames.iter().rev() {
            if let Some(node) = frame.get(name) {
                return Some(node.clone());
            }
        }
        None
    }

    /// Looks only at the innermost frame; used to diagnose redefinitions
    /// within the same lexical scope.
    pub fn get_local(&self, name: &str) -> Option<Rc<Node>> {
        self.frames
            .last()
            .expect("env always has at least the root frame")
            .get(name)
            .cloned()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

impl<Node> Default for Env<Node> {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII helper that pushes a child scope on construction and pops it on
/// drop, so a scope is never left unbalanced by an early return inside a
/// fallible pass (mirrors the `PendingGuard` pattern used by the loader).
pub struct ScopeGuard<'a, Node> {
    env: &'a mut Env<Node>,
}

impl<'a, Node> ScopeGuard<'a, Node> {
    pub fn new(env: &'a mut Env<Node>) -> Self {
        env.push();
        Self { env }
    }

    pub fn env(&mut self) -> &mut Env<Node> {
        self.env
    }
}

impl<'a, Node> Drop for ScopeGuard<'a, Node> {
    fn drop(&mut self) {
        self.env.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_searches_innermost_outward() {
        let mut env: Env<i32> = Env::new();
        env.set("x", Rc::new(1));
        env.push();
        env.set("x", Rc::new(2));
        assert_eq!(*env.get("x").unwrap(), 2);
        env.pop();
        assert_eq!(*env.get("x").unwrap(), 1);
    }

    #[test]
    fn get_local_only_sees_innermost_frame() {
        let mut env: Env<i32> = Env::new();
        env.set("x", Rc::new(1));
        env.push();
        assert!(env.get_local("x").is_none());
        assert!(env.get("x").is_some());
    }

    #[test]
    fn shadowing_does_not_error_but_redefinition_in_same_frame_is_detectable() {
        let mut env: Env<i32> = Env::new();
        assert!(env.set("x", Rc::new(1)).is_none());
        // Same-frame rebind returns the previous binding: caller turns this
        // into a "duplicate declaration" diagnostic.
        assert!(env.set("x", Rc::new(2)).is_some());
    }

    #[test]
    fn scope_guard_pops_on_drop_even_after_early_return() {
        let mut env: Env<i32> = Env::new();
        fn fallible(env: &mut Env<i32>) -> Result<(), ()> {
            let mut guard = ScopeGuard::new(env);
            guard.env().set("x", Rc::new(1));
            Err(())
        }
        assert_eq!(env.depth(), 1);
        let _ = fallible(&mut env);
        assert_eq!(env.depth(), 1);
    }
}
