//! Disk-rooted VFS backend.

use std::path::{Path, PathBuf};

use super::{Vfs, VfsError};

/// Reads/writes relative to a fixed base directory. Paths that are already
/// absolute bypass the base entirely.
#[derive(Debug, Clone)]
pub struct Local {
    base: PathBuf,
}

impl Local {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.base.join(p)
        }
    }
}

impl Vfs for Local {
    fn read(&self, path: &str) -> Result<Vec<u8>, VfsError> {
        std::fs::read(self.resolve(path)).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => VfsError::NotFound(path.to_string()),
            _ => VfsError::Io(e.to_string()),
        })
    }

    fn write(&self, path: &str, bytes: &[u8]) -> Result<(), VfsError> {
        let target = self.resolve(path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| VfsError::Io(e.to_string()))?;
        }
        std::fs::write(target, bytes).map_err(|e| VfsError::Io(e.to_string()))
    }

    fn list(&self, dir: &str) -> Result<Vec<String>, VfsError> {
        let target = self.resolve(dir);
        let entries = std::fs::read_dir(&target).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => VfsError::NotFound(dir.to_string()),
            _ => VfsError::Io(e.to_string()),
        })?;
        let mut out = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| VfsError::Io(e.to_string()))?;
            out.push(entry.path().to_string_lossy().into_owned());
        }
        Ok(out)
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).exists()
    }

    fn is_read_only(&self, _path: &str) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn reads_back_what_it_wrote() {
        let dir = tempdir().unwrap();
        let fs = Local::new(dir.path());
        fs.write("a.sdl", b"component C {}").unwrap();
        assert_eq!(fs.read("a.sdl").unwrap(), b"component C {}");
        assert!(fs.exists("a.sdl"));
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let fs = Local::new(dir.path());
        assert!(matches!(fs.read("missing.sdl"), Err(VfsError::NotFound(_))));
    }

    #[test]
    fn absolute_path_bypasses_base() {
        let dir = tempdir().unwrap();
        let outside = tempdir().unwrap();
        let outside_file = outside.path().join("x.sdl");
        std::fs::write(&outside_file, b"enum E { A }").unwrap();
        let fs = Local::new(dir.path());
        let abs = outside_file.to_string_lossy().into_owned();
        assert_eq!(fs.read(&abs).unwrap(), b"enum E { A }");
    }
}
