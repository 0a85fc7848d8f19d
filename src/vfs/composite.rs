//! Mount-table VFS backend: routes a path to one of several backends.
//!
//! Lookup order is longest-matching-prefix among explicit mounts, then
//! scheme prefix (`https://`, `http://`), then an optional fallback. The
//! mount table is guarded by an `RwLock` so mounts can be added
//! concurrently.

use std::sync::{Arc, RwLock};

use super::{Vfs, VfsError};

pub struct Composite {
    mounts: RwLock<Vec<(String, Arc<dyn Vfs + Send + Sync>)>>,
    schemes: RwLock<Vec<(&'static str, Arc<dyn Vfs + Send + Sync>)>>,
    fallback: Option<Arc<dyn Vfs + Send + Sync>>,
}

impl std::fmt::Debug for Composite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Composite")
            .field("mounts", &self.mounts.read().expect("lock poisoned").len())
            .finish()
    }
}

impl Composite {
    pub fn new() -> Self {
        Self {
            mounts: RwLock::new(Vec::new()),
            schemes: RwLock::new(Vec::new()),
            fallback: None,
        }
    }

    pub fn with_fallback(fallback: Arc<dyn Vfs + Send + Sync>) -> Self {
        Self {
            mounts: RwLock::new(Vec::new()),
            schemes: RwLock::new(Vec::new()),
            fallback: Some(fallback),
        }
    }

    /// Mounts `backend` under path prefix `prefix`. Longer prefixes are
    /// preferred over shorter ones regardless of insertion order.
    pub fn mount(&self, prefix: impl Into<String>, backend: Arc<dyn Vfs + Send + Sync>) {
        self.mounts
            .write()
            .expect("composite vfs lock poisoned")
            .push((prefix.into(), backend));
    }

    /// Registers `backend` to handle every path beginning with `scheme`
    /// (e.g. `"https://"`), used for the built-in HTTP/GitHub backends.
    pub fn mount_scheme(&self, scheme: &'static str, backend: Arc<dyn Vfs + Send + Sync>) {
        self.schemes
            .write()
            .expect("composite vfs lock poisoned")
            .push((scheme, backend));
    }

    fn route(&self, path: &str) -> Option<Arc<dyn Vfs + Send + Sync>> {
        let mounts = self.mounts.read().expect("composite vfs lock poisoned");
        let best = mounts
            .iter()
            .filter(|(prefix, _)| path.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len());
        if let Some((_, backend)) = best {
            return Some(backend.clone());
        }
        drop(mounts);

        let schemes = self.schemes.read().expect("composite vfs lock poisoned");
        if let Some((_, backend)) = schemes.iter().find(|(scheme, _)| path.starts_with(scheme)) {
            return Some(backend.clone());
        }
        drop(schemes);

        self.fallback.clone()
    }
}

impl Default for Composite {
    fn default() -> Self {
        Self::new()
    }
}

impl Vfs for Composite {
    fn read(&self, path: &str) -> Result<Vec<u8>, VfsError> {
        self.route(path)
            .ok_or_else(|| VfsError::NotFound(path.to_string()))?
            .read(path)
    }

    fn write(&self, path: &str, bytes: &[u8]) -> Result<(), VfsError> {
        self.route(path)
            .ok_or_else(|| VfsError::NotFound(path.to_string()))?
            .write(path, bytes)
    }

    fn list(&self, dir: &str) -> Result<Vec<String>, VfsError> {
        self.route(dir)
            .ok_or_else(|| VfsError::NotFound(dir.to_string()))?
            .list(dir)
    }

    fn exists(&self, path: &str) -> bool {
        self.route(path).is_some_and(|b| b.exists(path))
    }

    fn is_read_only(&self, path: &str) -> bool {
        self.route(path).is_some_and(|b| b.is_read_only(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::Memory;

    #[test]
    fn longest_prefix_wins() {
        let composite = Composite::new();
        let short = Arc::new(Memory::with_files([("a/x.sdl", b"short".to_vec())]));
        let long = Arc::new(Memory::with_files([("a/b/x.sdl", b"long".to_vec())]));
        composite.mount("a", short);
        composite.mount("a/b", long.clone());
        assert_eq!(composite.read("a/b/x.sdl").unwrap(), b"long");
    }

    #[test]
    fn falls_back_when_no_mount_matches() {
        let fallback = Arc::new(Memory::with_files([("z.sdl", b"fallback".to_vec())]));
        let composite = Composite::with_fallback(fallback);
        assert_eq!(composite.read("z.sdl").unwrap(), b"fallback");
    }

    #[test]
    fn unmatched_path_with_no_fallback_is_not_found() {
        let composite = Composite::new();
        assert!(matches!(composite.read("nope.sdl"), Err(VfsError::NotFound(_))));
    }
}
