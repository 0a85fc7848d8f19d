//! Pluggable virtual file system (C3).
//!
//! The loader (`crate::loader`) only ever talks to a `Vfs` trait object; it
//! never touches `std::fs` directly. That keeps import resolution testable
//! against an in-memory tree and lets a host swap in HTTP- or
//! composite-backed resolution without touching the core.

mod composite;
mod local;
mod memory;

#[cfg(feature = "vfs-http")]
mod github;
#[cfg(feature = "vfs-http")]
mod http;

pub use composite::Composite;
pub use local::Local;
pub use memory::Memory;

#[cfg(feature = "vfs-http")]
pub use github::GitHub;
#[cfg(feature = "vfs-http")]
pub use http::Http;

use std::fmt;

/// A read/write capability over some storage medium, keyed by path strings.
///
/// Every method is synchronous: the core treats file access as a blocking
/// call and has no suspension points of its own. Implementations
/// that front a network medium (HTTP, GitHub) must do their own blocking
/// I/O and are expected to be safe to call from concurrent readers.
pub trait Vfs: fmt::Debug {
    fn read(&self, path: &str) -> Result<Vec<u8>, VfsError>;
    fn write(&self, path: &str, bytes: &[u8]) -> Result<(), VfsError>;
    fn list(&self, dir: &str) -> Result<Vec<String>, VfsError>;
    fn exists(&self, path: &str) -> bool;
    /// Whether `path` can be written to. Takes a path rather than being a
    /// blanket per-backend answer so a `Composite` can report accurately for
    /// whichever backend a given path actually routes to.
    fn is_read_only(&self, path: &str) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VfsError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("read-only file system")]
    ReadOnly,
    #[error("io error: {0}")]
    Io(String),
}

/// Joins an importer's directory with an import path string, normalizing
/// `.`/`..` components without touching the file system. Absolute paths
/// (starting with `/`) bypass the importer directory entirely.
pub fn join_path(importer_dir: &str, import_path: &str) -> String {
    if import_path.starts_with('/') || is_url(import_path) {
        return normalize(import_path);
    }
    if importer_dir.is_empty() {
        return normalize(import_path);
    }
    normalize(&format!("{}/{}", importer_dir.trim_end_matches('/'), import_path))
}

pub fn is_url(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://") || path.starts_with("github.com/")
}

/// Returns the directory portion of `path` (everything before the final
/// `/`, or `""` if there is none).
pub fn dirname(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

fn normalize(path: &str) -> String {
    let is_absolute = path.starts_with('/');
    let scheme = if is_url(path) {
        let idx = path.find("://").map(|i| i + 3).unwrap_or(0);
        Some(path[..idx].to_string())
    } else {
        None
    };
    let rest = scheme.as_ref().map_or(path, |s| &path[s.len()..]);

    let mut out: Vec<&str> = Vec::new();
    for segment in rest.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                out.pop();
            }
            seg => out.push(seg),
        }
    }
    let joined = out.join("/");
    match scheme {
        Some(s) => format!("{s}{joined}"),
        None if is_absolute => format!("/{joined}"),
        None => joined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_resolves_relative_to_importer_dir() {
        assert_eq!(join_path("a/b", "c.sdl"), "a/b/c.sdl");
    }

    #[test]
    fn join_normalizes_parent_segments() {
        assert_eq!(join_path("a/b", "../c.sdl"), "a/c.sdl");
    }

    #[test]
    fn absolute_import_bypasses_importer_dir() {
        assert_eq!(join_path("a/b", "/root.sdl"), "/root.sdl");
    }

    #[test]
    fn dirname_of_top_level_path_is_empty() {
        assert_eq!(dirname("root.sdl"), "");
    }
}
