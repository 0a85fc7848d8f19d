//! GitHub VFS backend: a thin adapter over `Http` that rewrites
//! `github.com/<user>/<repo>/<path>` into a raw-content fetch against the
//! default branch.

use super::http::Http;
use super::{Vfs, VfsError};

#[derive(Debug)]
pub struct GitHub {
    http: Http,
}

impl GitHub {
    pub fn new() -> Self {
        Self {
            http: Http::new("https://raw.githubusercontent.com"),
        }
    }

    /// Rewrites `github.com/<user>/<repo>/<path>` (with or without a
    /// scheme) into `raw.githubusercontent.com/<user>/<repo>/main/<path>`.
    fn rewrite(path: &str) -> Option<String> {
        let stripped = path
            .strip_prefix("https://github.com/")
            .or_else(|| path.strip_prefix("http://github.com/"))
            .or_else(|| path.strip_prefix("github.com/"))?;
        let mut parts = stripped.splitn(3, '/');
        let user = parts.next()?;
        let repo = parts.next()?;
        let rest = parts.next().unwrap_or("");
        Some(format!("{user}/{repo}/main/{rest}"))
    }
}

impl Default for GitHub {
    fn default() -> Self {
        Self::new()
    }
}

impl Vfs for GitHub {
    fn read(&self, path: &str) -> Result<Vec<u8>, VfsError> {
        let rewritten = Self::rewrite(path).ok_or_else(|| VfsError::NotFound(path.to_string()))?;
        self.http.read(&rewritten)
    }

    fn write(&self, _path: &str, _bytes: &[u8]) -> Result<(), VfsError> {
        Err(VfsError::ReadOnly)
    }

    fn list(&self, dir: &str) -> Result<Vec<String>, VfsError> {
        self.http.list(dir)
    }

    fn exists(&self, path: &str) -> bool {
        Self::rewrite(path).is_some_and(|r| self.http.exists(&r))
    }

    fn is_read_only(&self, _path: &str) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_github_path_to_raw_main_branch() {
        assert_eq!(
            GitHub::rewrite("github.com/univrs/sdl/lib/status.sdl"),
            Some("univrs/sdl/main/lib/status.sdl".to_string())
        );
    }

    #[test]
    fn non_github_path_does_not_rewrite() {
        assert_eq!(GitHub::rewrite("gitlab.com/foo/bar"), None);
    }
}
