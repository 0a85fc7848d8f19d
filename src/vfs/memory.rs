//! In-memory VFS backend: a thread-safe `path -> bytes` map.
//!
//! Exists primarily so tests exercise the loader's import resolution and
//! cycle detection deterministically, without touching disk.

use std::collections::HashMap;
use std::sync::RwLock;

use super::{Vfs, VfsError};

#[derive(Debug, Default)]
pub struct Memory {
    files: RwLock<HashMap<String, Vec<u8>>>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the file system with `(path, contents)` pairs; convenient for
    /// building a fixture tree in one call.
    pub fn with_files<I, P, B>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, B)>,
        P: Into<String>,
        B: Into<Vec<u8>>,
    {
        let fs = Self::new();
        for (path, bytes) in files {
            fs.files
                .write()
                .expect("memory vfs lock poisoned")
                .insert(path.into(), bytes.into());
        }
        fs
    }
}

impl Vfs for Memory {
    fn read(&self, path: &str) -> Result<Vec<u8>, VfsError> {
        self.files
            .read()
            .expect("memory vfs lock poisoned")
            .get(path)
            .cloned()
            .ok_or_else(|| VfsError::NotFound(path.to_string()))
    }

    fn write(&self, path: &str, bytes: &[u8]) -> Result<(), VfsError> {
        self.files
            .write()
            .expect("memory vfs lock poisoned")
            .insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    fn list(&self, dir: &str) -> Result<Vec<String>, VfsError> {
        Ok(self
            .files
            .read()
            .expect("memory vfs lock poisoned")
            .keys()
            .filter(|p| p.starts_with(dir))
            .cloned()
            .collect())
    }

    fn exists(&self, path: &str) -> bool {
        self.files
            .read()
            .expect("memory vfs lock poisoned")
            .contains_key(path)
    }

    fn is_read_only(&self, _path: &str) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_returns_paths_with_prefix() {
        let fs = Memory::with_files([("a/x.sdl", b"1".to_vec()), ("a/y.sdl", b"2".to_vec()), ("b/z.sdl", b"3".to_vec())]);
        let mut listed = fs.list("a/").unwrap();
        listed.sort();
        assert_eq!(listed, vec!["a/x.sdl", "a/y.sdl"]);
    }

    #[test]
    fn write_then_read_round_trips() {
        let fs = Memory::new();
        fs.write("f.sdl", b"enum E { A }").unwrap();
        assert_eq!(fs.read("f.sdl").unwrap(), b"enum E { A }");
    }
}
