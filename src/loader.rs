//! Multi-file import resolution and validation ordering (C7).
//!
//! `Loader` drives two phases per file path. Phase L1 (`load_file`) resolves
//! an import path against an importer's directory through a [`Vfs`], parses
//! the bytes with `crate::lexer`/`crate::parser`, and recurses into that
//! file's own imports, caching everything by canonical path so a file is
//! parsed at most once per loader lifetime. Phase L2 (`validate`) walks the
//! cached import graph bottom-up, populates an environment with imported
//! aliases plus local declarations, and hands it to `crate::infer`.
//!
//! Cycle detection in both phases is a `pending` set guarded by a scoped
//! drop guard, so an early return (including the `?` from a nested
//! `load_file` failing) can never leave a canonical path marked pending
//! forever.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::ast::FileDecl;
use crate::error::{Diagnostic, ResolveError};
use crate::infer;
use crate::parser;
use crate::vfs::{dirname, join_path, Vfs, VfsError};

/// The resolver's answer for one import: a canonical path plus the bytes
/// read from it. Canonical paths are the loader's cache and cycle-detection
/// key; callers only need them to be deterministic and stable
/// for the lifetime of one loader.
pub struct Resolved {
    pub canonical_path: String,
    pub bytes: Vec<u8>,
}

/// Resolves an import path against an importer's canonical path and reads
/// its bytes. The default implementation (`VfsResolver`) delegates both
/// steps to a [`Vfs`]; a host can implement this trait directly for
/// resolution strategies a plain file system can't express.
pub trait Resolver {
    fn resolve(&self, importer_canonical_path: &str, import_path: &str) -> Result<Resolved, VfsError>;
}

/// The default resolver: joins paths with `crate::vfs::join_path` and reads
/// through a `Vfs`. The canonical path is just the joined path — for the
/// `Local` backend a host typically passes already-absolute paths in and
/// out, which keeps this deterministic without a `std::fs::canonicalize`
/// round-trip into the trait.
pub struct VfsResolver<F: Vfs> {
    fs: F,
}

impl<F: Vfs> VfsResolver<F> {
    pub fn new(fs: F) -> Self {
        Self { fs }
    }
}

impl<F: Vfs> Resolver for VfsResolver<F> {
    fn resolve(&self, importer_canonical_path: &str, import_path: &str) -> Result<Resolved, VfsError> {
        let dir = dirname(importer_canonical_path);
        let canonical_path = join_path(dir, import_path);
        let bytes = self.fs.read(&canonical_path)?;
        Ok(Resolved { canonical_path, bytes })
    }
}

/// Everything the loader has learned about one canonical path: its parsed
/// tree (if parsing succeeded), the canonical paths of its direct imports,
/// and every error collected against it so far.
pub struct FileStatus {
    pub canonical_path: String,
    pub file: Option<Rc<FileDecl>>,
    pub import_paths: Vec<String>,
    pub errors: Vec<Diagnostic>,
    pub last_parsed: Option<u64>,
    pub last_validated: Option<u64>,
}

impl FileStatus {
    fn empty(canonical_path: String) -> Self {
        Self {
            canonical_path,
            file: None,
            import_paths: Vec::new(),
            errors: Vec::new(),
            last_parsed: None,
            last_validated: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn is_validated(&self) -> bool {
        self.last_validated.is_some()
    }
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Loader-wide state guarded by a single mutex: the `pending` set
/// used for cycle detection and the canonical-path status cache. A single
/// `load_file` call is recursive and holds no lock across recursion — the
/// mutex is only taken around the small mutations below.
struct State {
    pending: HashSet<String>,
    statuses: HashMap<String, Rc<RefCell<FileStatus>>>,
}

/// RAII guard that marks a canonical path pending on construction and
/// clears it on drop, so every return path out of `load_file` — including
/// an early `?` or a panic unwinding through recursive calls — releases the
/// marker.
struct PendingGuard<'a> {
    loader: &'a Loader,
    path: String,
}

impl<'a> PendingGuard<'a> {
    fn acquire(loader: &'a Loader, path: String) -> Self {
        loader.state.lock().expect("loader lock poisoned").pending.insert(path.clone());
        Self { loader, path }
    }
}

impl<'a> Drop for PendingGuard<'a> {
    fn drop(&mut self) {
        self.loader
            .state
            .lock()
            .expect("loader lock poisoned")
            .pending
            .remove(&self.path);
    }
}

/// Resolves imports through a pluggable [`Resolver`], caches parsed files by
/// canonical path, detects import cycles, and orders validation bottom-up
///.
pub struct Loader<R: Resolver> {
    resolver: R,
    max_depth: usize,
    state: Mutex<State>,
}

impl<R: Resolver> Loader<R> {
    /// `max_depth == 0` means unlimited.
    pub fn new(resolver: R, max_depth: usize) -> Self {
        Self {
            resolver,
            max_depth,
            state: Mutex::new(State {
                pending: HashSet::new(),
                statuses: HashMap::new(),
            }),
        }
    }

    /// Phase L1: resolves, parses (at most once per canonical path), and
    /// recursively loads every import. Returns the status keyed by
    /// canonical path; `importer_path` is the canonical path of the file
    /// that is importing `path`, or `""` for a root load.
    pub fn load_file(
        &self,
        path: &str,
        importer_path: &str,
        depth: usize,
    ) -> Result<Rc<RefCell<FileStatus>>, ResolveError> {
        if self.max_depth > 0 && depth >= self.max_depth {
            return Err(ResolveError::MaxDepthExceeded {
                span: crate::span::Span::default(),
            });
        }

        let resolved = self
            .resolver
            .resolve(importer_path, path)
            .map_err(|_| ResolveError::FileNotFound {
                path: path.to_string(),
                span: crate::span::Span::default(),
            })?;
        let canonical = resolved.canonical_path.clone();

        // The pending check must run before the cache lookup: a file already
        // in `statuses` but still `pending` is a parent of this call still
        // being loaded, not a finished sibling result, and must be reported
        // as a cycle rather than returned as if it were done.
        if self
            .state
            .lock()
            .expect("loader lock poisoned")
            .pending
            .contains(&canonical)
        {
            return Err(ResolveError::ImportCycle {
                path: canonical,
                span: crate::span::Span::default(),
            });
        }

        if let Some(existing) = self
            .state
            .lock()
            .expect("loader lock poisoned")
            .statuses
            .get(&canonical)
            .cloned()
        {
            return Ok(existing);
        }

        let guard = PendingGuard::acquire(self, canonical.clone());
        let status = Rc::new(RefCell::new(FileStatus::empty(canonical.clone())));
        self.state
            .lock()
            .expect("loader lock poisoned")
            .statuses
            .insert(canonical.clone(), status.clone());

        let source = String::from_utf8_lossy(&resolved.bytes).into_owned();
        let (file, parse_errors) = parser::parse_file(canonical.clone(), &source);
        {
            let mut s = status.borrow_mut();
            s.errors.extend(parse_errors.iter().map(Diagnostic::from));
            s.last_parsed = Some(now_unix());
        }

        let resolve_errors = file.resolve();
        let import_paths_raw: Vec<String> = file.imports.iter().map(|i| i.path.clone()).collect();
        let file = Rc::new(file);
        {
            let mut s = status.borrow_mut();
            s.errors.extend(resolve_errors.iter().map(Diagnostic::from));
            s.file = Some(file.clone());
        }

        if status.borrow().is_ok() {
            let mut import_canonicals = Vec::with_capacity(import_paths_raw.len());
            for (import_decl, raw_path) in file.imports.iter().zip(import_paths_raw.iter()) {
                match self.load_file(raw_path, &canonical, depth + 1) {
                    Ok(child_status) => {
                        let child_canonical = child_status.borrow().canonical_path.clone();
                        *import_decl.resolved_path.borrow_mut() = Some(child_canonical.clone());
                        import_canonicals.push(child_canonical);
                    }
                    Err(e) => {
                        status.borrow_mut().errors.push(Diagnostic::from(&e));
                    }
                }
            }
            status.borrow_mut().import_paths = import_canonicals;
        }

        drop(guard);
        Ok(status)
    }

    /// Loads every path in `paths`, returning whether all of them loaded and
    /// validated cleanly plus a map from the path as given to its status
    ///.
    pub fn load_files<'p>(
        &self,
        paths: impl IntoIterator<Item = &'p str>,
    ) -> (bool, HashMap<String, Rc<RefCell<FileStatus>>>) {
        let mut all_ok = true;
        let mut out = HashMap::new();
        for path in paths {
            match self.load_file(path, "", 0) {
                Ok(status) => {
                    let validated_ok = self.validate(&status);
                    all_ok &= validated_ok;
                    out.insert(path.to_string(), status);
                }
                Err(_) => {
                    all_ok = false;
                }
            }
        }
        (all_ok, out)
    }

    /// Phase L2: validates `status` and everything it (transitively)
    /// imports, bottom-up, then runs type inference over this file. Returns
    /// `true` iff `status` ends up with no errors. Idempotent: a second call
    /// after `last_validated` is set just re-reports the cached outcome
    /// without re-running inference.
    pub fn validate(&self, status: &Rc<RefCell<FileStatus>>) -> bool {
        let mut visiting = HashSet::new();
        self.validate_inner(status, &mut visiting)
    }

    fn validate_inner(
        &self,
        status: &Rc<RefCell<FileStatus>>,
        visiting: &mut HashSet<String>,
    ) -> bool {
        if status.borrow().is_validated() {
            return status.borrow().is_ok();
        }
        if !status.borrow().is_ok() {
            return false;
        }

        let canonical = status.borrow().canonical_path.clone();
        if visiting.contains(&canonical) {
            status.borrow_mut().errors.push(Diagnostic::new(
                crate::span::Location::start(),
                format!("circular import during validation: {canonical}"),
            ));
            return false;
        }
        visiting.insert(canonical.clone());

        let import_paths = status.borrow().import_paths.clone();
        let mut imports_ok = true;
        let mut import_statuses = Vec::new();
        for import_canonical in &import_paths {
            let child = self
                .state
                .lock()
                .expect("loader lock poisoned")
                .statuses
                .get(import_canonical)
                .cloned();
            if let Some(child) = child {
                let ok = self.validate_inner(&child, visiting);
                imports_ok &= ok;
                let child_errors = child.borrow().errors.clone();
                status.borrow_mut().errors.extend(child_errors);
                import_statuses.push(child);
            } else {
                imports_ok = false;
            }
        }
        visiting.remove(&canonical);

        if !imports_ok {
            return false;
        }

        let file = status.borrow().file.clone().expect("a resolved file has a parsed tree");
        let mut env: crate::env::Env<crate::infer::Symbol> = crate::env::Env::new();
        let mut errors = Vec::new();

        for (import_decl, import_status) in file.imports.iter().zip(import_statuses.iter()) {
            let binding = match import_decl.binding_name() {
                Some(b) => b.to_string(),
                None => continue, // bare `import "path"` form: no binding, side effect only.
            };
            let imported_item = import_decl.item.as_deref().unwrap_or(binding.as_str());
            let imported_file = import_status.borrow().file.clone();
            let Some(imported_file) = imported_file else {
                errors.push(ResolveError::ImportItemNotFound {
                    item: imported_item.to_string(),
                    path: import_decl.path.clone(),
                    span: import_decl.span,
                });
                continue;
            };
            let symbol = imported_file
                .enums
                .borrow()
                .get(imported_item)
                .map(|e| infer::Symbol::Enum(e.clone()))
                .or_else(|| {
                    imported_file
                        .aggregators
                        .borrow()
                        .get(imported_item)
                        .map(|a| infer::Symbol::Aggregator(a.clone()))
                })
                .or_else(|| {
                    imported_file
                        .components
                        .borrow()
                        .get(imported_item)
                        .map(|c| infer::Symbol::Component(c.clone()))
                });
            match symbol {
                Some(symbol) => {
                    if env.set(binding.clone(), Rc::new(symbol)).is_some() {
                        errors.push(ResolveError::AliasCollision {
                            name: binding,
                            span: import_decl.span,
                        });
                    }
                }
                None => errors.push(ResolveError::ImportItemNotFound {
                    item: imported_item.to_string(),
                    path: import_decl.path.clone(),
                    span: import_decl.span,
                }),
            }
        }

        for decl in &file.declarations {
            let (name, symbol, span) = match decl {
                crate::ast::TopDecl::Enum(e) => (e.name.clone(), infer::Symbol::Enum(e.clone()), e.span),
                crate::ast::TopDecl::Component(c) => {
                    (c.name.clone(), infer::Symbol::Component(c.clone()), c.span)
                }
                crate::ast::TopDecl::Aggregator(a) => {
                    (a.name.clone(), infer::Symbol::Aggregator(a.clone()), a.span)
                }
                crate::ast::TopDecl::System(_) | crate::ast::TopDecl::Options(_) => continue,
            };
            if env.get_local(&name).is_some() {
                errors.push(ResolveError::AliasCollision { name, span });
            } else {
                env.set(name, Rc::new(symbol));
            }
        }

        status.borrow_mut().errors.extend(errors.iter().map(Diagnostic::from));
        if !status.borrow().is_ok() {
            return false;
        }

        let inference_errors = infer::infer_types_for_file(&file, env);
        let mut s = status.borrow_mut();
        s.errors.extend(inference_errors.iter().map(Diagnostic::from));
        if s.errors.is_empty() {
            s.last_validated = Some(now_unix());
            true
        } else {
            false
        }
    }

    /// Looks up a cached status without triggering a load.
    pub fn get_file_status(&self, path: &str, importer_path: &str) -> Option<Rc<RefCell<FileStatus>>> {
        let resolved = self.resolver.resolve(importer_path, path).ok()?;
        self.state
            .lock()
            .expect("loader lock poisoned")
            .statuses
            .get(&resolved.canonical_path)
            .cloned()
    }

    /// Number of distinct canonical paths parsed so far; used by tests to
    /// assert the "parsed at most once" invariant.
    pub fn parsed_count(&self) -> usize {
        self.state.lock().expect("loader lock poisoned").statuses.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::Memory;

    fn loader_with(files: &[(&str, &str)]) -> Loader<VfsResolver<Memory>> {
        let fs = Memory::with_files(files.iter().map(|(p, c)| (p.to_string(), c.as_bytes().to_vec())));
        Loader::new(VfsResolver::new(fs), 0)
    }

    #[test]
    fn a_file_is_parsed_at_most_once() {
        let loader = loader_with(&[
            ("a.sdl", r#"import "b.sdl" import "b.sdl""#),
            ("b.sdl", "enum E { A }"),
        ]);
        let status = loader.load_file("a.sdl", "", 0).unwrap();
        assert!(status.borrow().is_ok());
        // a.sdl + b.sdl, regardless of b.sdl being imported twice.
        assert_eq!(loader.parsed_count(), 2);
    }

    #[test]
    fn cycle_is_detected_and_pending_is_cleared() {
        let loader = loader_with(&[
            ("x.sdl", r#"import Y from "y.sdl""#),
            ("y.sdl", r#"import X from "x.sdl""#),
        ]);
        let status = loader.load_file("x.sdl", "", 0).unwrap();
        assert!(!status.borrow().is_ok());
        let msg = status.borrow().errors[0].message.clone();
        assert!(msg.contains("circular import"), "{msg}");
        assert!(loader.state.lock().unwrap().pending.is_empty());
    }

    #[test]
    fn max_depth_boundary() {
        let loader = loader_with(&[
            ("a.sdl", r#"import "b.sdl""#),
            ("b.sdl", "enum E { A }"),
        ]);
        let status = loader.load_file("a.sdl", "", 0).unwrap();
        assert!(status.borrow().is_ok());

        let shallow = Loader::new(
            VfsResolver::new(Memory::with_files([
                ("a.sdl", b"import \"b.sdl\"".to_vec()),
                ("b.sdl", b"enum E { A }".to_vec()),
            ])),
            1,
        );
        let status = shallow.load_file("a.sdl", "", 0).unwrap();
        assert!(!status.borrow().is_ok());
    }

    #[test]
    fn cross_file_import_with_alias_resolves_enum() {
        let loader = loader_with(&[
            ("a.sdl", "enum Status { OK FAIL }"),
            (
                "b.sdl",
                r#"import Status as S from "a.sdl" component C { method m() S { return S.OK } }"#,
            ),
        ]);
        let status = loader.load_file("b.sdl", "", 0).unwrap();
        assert!(loader.validate(&status), "{:?}", status.borrow().errors.iter().map(|e| e.message.clone()).collect::<Vec<_>>());
    }

    #[test]
    fn import_alias_collision_is_one_diagnostic() {
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
    fn imports_must_validate_before_importer() {
        let loader = loader_with(&[
            ("a.sdl", "enum Status { OK FAIL }"),
            (
                "b.sdl",
                r#"import Status as S from "a.sdl" component C { method m() S { return S.OK } }"#,
            ),
        ]);
        let status = loader.load_file("b.sdl", "", 0).unwrap();
        assert!(loader.validate(&status));
        let a_status = loader.get_file_status("a.sdl", "b.sdl").unwrap();
        assert!(a_status.borrow().is_validated());
    }
}
