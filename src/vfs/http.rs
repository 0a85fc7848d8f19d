//! HTTP-backed VFS: GETs under a base URL and caches bodies by path.
//!
//! Gated behind the `vfs-http` feature so the core builds with zero network
//! dependencies. Blocking, matching the synchronous
//! `Vfs` contract — the loader has no suspension points of its own.

use std::collections::HashMap;
use std::sync::RwLock;

use super::{Vfs, VfsError};

#[derive(Debug)]
pub struct Http {
    base_url: String,
    cache: RwLock<HashMap<String, Vec<u8>>>,
}

impl Http {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
        }
    }

    fn fetch(&self, path: &str) -> Result<Vec<u8>, VfsError> {
        if let Some(cached) = self.cache.read().expect("http vfs lock poisoned").get(path) {
            return Ok(cached.clone());
        }
        let url = self.url_for(path);
        let body = ureq::get(&url)
            .call()
            .map_err(|e| match e {
                ureq::Error::Status(404, _) => VfsError::NotFound(path.to_string()),
                other => VfsError::Io(other.to_string()),
            })?
            .into_string()
            .map_err(|e| VfsError::Io(e.to_string()))?
            .into_bytes();
        self.cache
            .write()
            .expect("http vfs lock poisoned")
            .insert(path.to_string(), body.clone());
        Ok(body)
    }
}

impl Vfs for Http {
    fn read(&self, path: &str) -> Result<Vec<u8>, VfsError> {
        self.fetch(path)
    }

    fn write(&self, _path: &str, _bytes: &[u8]) -> Result<(), VfsError> {
        Err(VfsError::ReadOnly)
    }

    fn list(&self, _dir: &str) -> Result<Vec<String>, VfsError> {
        Err(VfsError::Io("HTTP backend does not support listing".to_string()))
    }

    fn exists(&self, path: &str) -> bool {
        self.fetch(path).is_ok()
    }

    fn is_read_only(&self, _path: &str) -> bool {
        true
    }
}
