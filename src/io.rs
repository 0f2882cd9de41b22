//! The filesystem capability the pipeline runs against.
//!
//! Nothing else in the crate touches `std::fs` directly. Every read, listing,
//! write, copy and delete goes through the [`Io`] trait so the pipeline can
//! be driven against a real vault ([`FsIo`]) or anything else that can hand
//! back file contents and directory listings.
//!
//! ## Listing order
//!
//! [`FsIo::read_dir`] returns entries sorted by file name. Directory listings
//! from the OS come back in whatever order the filesystem stores them, and
//! sibling order feeds pagination and series numbering, so the listing order
//! is pinned here once instead of at every call site.
//!
//! ## Atomic writes
//!
//! [`FsIo::write`] writes to a temporary sibling file and renames it over the
//! target. A reader either sees the old document or the new one, never half
//! of each. Writes can be refused wholesale through an [`AbortHandle`].

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum IoError {
    #[error("Not found: {0}")]
    NotFound(PathBuf),
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Write aborted: {0}")]
    Aborted(PathBuf),
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
}

impl IoError {
    fn at(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            IoError::NotFound(path.to_path_buf())
        } else {
            IoError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
    /// Lowercased extension without the dot, if any.
    pub extension: Option<String>,
}

/// Filesystem operations consumed by the pipeline.
pub trait Io: Send + Sync {
    fn read_file(&self, path: &Path) -> Result<String, IoError>;
    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>, IoError>;
    fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>, IoError>;
    /// Write `data` to `path`, creating parent directories. All-or-nothing.
    fn write(&self, path: &Path, data: &str) -> Result<(), IoError>;
    fn delete_file(&self, path: &Path) -> Result<(), IoError>;
    /// Delete an empty folder.
    fn delete_folder(&self, path: &Path) -> Result<(), IoError>;
    /// Delete a folder and everything below it.
    fn delete_folder_force(&self, path: &Path) -> Result<(), IoError>;
    fn copy_file(&self, from: &Path, to: &Path) -> Result<(), IoError>;
    fn copy_folder(&self, from: &Path, to: &Path) -> Result<(), IoError>;
    fn move_file(&self, from: &Path, to: &Path) -> Result<(), IoError>;
    fn move_folder(&self, from: &Path, to: &Path) -> Result<(), IoError>;
    fn exists(&self, path: &Path) -> bool;
}

/// Shared cancellation flag for pending writes.
///
/// Cloning yields a handle to the same flag. Once aborted, every later
/// [`Io::write`] / copy / move through the owning [`FsIo`] fails with
/// [`IoError::Aborted`] before touching the target.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// [`Io`] backed by the local filesystem.
#[derive(Debug, Default, Clone)]
pub struct FsIo {
    abort: AbortHandle,
}

impl FsIo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    fn check_abort(&self, target: &Path) -> Result<(), IoError> {
        if self.abort.is_aborted() {
            return Err(IoError::Aborted(target.to_path_buf()));
        }
        Ok(())
    }

    fn ensure_parent(path: &Path) -> Result<(), IoError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| IoError::at(parent, e))?;
        }
        Ok(())
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .filter(|e| !e.is_empty())
}

impl Io for FsIo {
    fn read_file(&self, path: &Path) -> Result<String, IoError> {
        fs::read_to_string(path).map_err(|e| IoError::at(path, e))
    }

    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>, IoError> {
        fs::read(path).map_err(|e| IoError::at(path, e))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>, IoError> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path).map_err(|e| IoError::at(path, e))? {
            let entry = entry.map_err(|e| IoError::at(path, e))?;
            let entry_path = entry.path();
            let is_dir = entry_path.is_dir();
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                extension: if is_dir {
                    None
                } else {
                    extension_of(&entry_path)
                },
                path: entry_path,
                is_dir,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn write(&self, path: &Path, data: &str) -> Result<(), IoError> {
        self.check_abort(path)?;
        Self::ensure_parent(path)?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let tmp = path.with_file_name(format!(".{file_name}.vaultpress-tmp"));
        fs::write(&tmp, data).map_err(|e| IoError::at(&tmp, e))?;

        if let Err(e) = self.check_abort(path) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        fs::rename(&tmp, path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            IoError::at(path, e)
        })
    }

    fn delete_file(&self, path: &Path) -> Result<(), IoError> {
        fs::remove_file(path).map_err(|e| IoError::at(path, e))
    }

    fn delete_folder(&self, path: &Path) -> Result<(), IoError> {
        fs::remove_dir(path).map_err(|e| IoError::at(path, e))
    }

    fn delete_folder_force(&self, path: &Path) -> Result<(), IoError> {
        fs::remove_dir_all(path).map_err(|e| IoError::at(path, e))
    }

    fn copy_file(&self, from: &Path, to: &Path) -> Result<(), IoError> {
        self.check_abort(to)?;
        Self::ensure_parent(to)?;
        fs::copy(from, to).map_err(|e| IoError::at(from, e))?;
        Ok(())
    }

    fn copy_folder(&self, from: &Path, to: &Path) -> Result<(), IoError> {
        self.check_abort(to)?;
        for entry in WalkDir::new(from) {
            let entry = entry?;
            let rel = entry.path().strip_prefix(from).unwrap_or(entry.path());
            let target = to.join(rel);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&target).map_err(|e| IoError::at(&target, e))?;
            } else {
                self.copy_file(entry.path(), &target)?;
            }
        }
        Ok(())
    }

    fn move_file(&self, from: &Path, to: &Path) -> Result<(), IoError> {
        self.check_abort(to)?;
        Self::ensure_parent(to)?;
        if fs::rename(from, to).is_err() {
            // Rename fails across devices; fall back to copy + delete.
            self.copy_file(from, to)?;
            self.delete_file(from)?;
        }
        Ok(())
    }

    fn move_folder(&self, from: &Path, to: &Path) -> Result<(), IoError> {
        self.check_abort(to)?;
        Self::ensure_parent(to)?;
        if fs::rename(from, to).is_err() {
            self.copy_folder(from, to)?;
            self.delete_folder_force(from)?;
        }
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn read_dir_sorted_by_name() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("b.md"), "b").unwrap();
        fs::write(tmp.path().join("a.MD"), "a").unwrap();
        fs::create_dir(tmp.path().join("c")).unwrap();

        let entries = FsIo::new().read_dir(tmp.path()).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.MD", "b.md", "c"]);
        assert_eq!(entries[0].extension.as_deref(), Some("md"));
        assert!(entries[2].is_dir);
        assert_eq!(entries[2].extension, None);
    }

    #[test]
    fn read_missing_file_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let result = FsIo::new().read_file(&tmp.path().join("nope.md"));
        assert!(matches!(result, Err(IoError::NotFound(_))));
    }

    #[test]
    fn write_creates_parents_and_leaves_no_temp_file() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("a/b/post.md");
        let io = FsIo::new();
        io.write(&target, "hello").unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "hello");
        let names: Vec<String> = io
            .read_dir(&tmp.path().join("a/b"))
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["post.md"]);
    }

    #[test]
    fn aborted_write_leaves_target_untouched() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("post.md");
        fs::write(&target, "original").unwrap();

        let io = FsIo::new();
        io.abort_handle().abort();
        let result = io.write(&target, "changed");

        assert!(matches!(result, Err(IoError::Aborted(_))));
        assert_eq!(fs::read_to_string(&target).unwrap(), "original");
    }

    #[test]
    fn copy_folder_recurses() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("one.md"), "1").unwrap();
        fs::write(src.join("nested/two.md"), "2").unwrap();

        let dst = tmp.path().join("dst");
        FsIo::new().copy_folder(&src, &dst).unwrap();

        assert_eq!(fs::read_to_string(dst.join("one.md")).unwrap(), "1");
        assert_eq!(fs::read_to_string(dst.join("nested/two.md")).unwrap(), "2");
    }

    #[test]
    fn move_and_delete() {
        let tmp = TempDir::new().unwrap();
        let io = FsIo::new();
        let a = tmp.path().join("a.md");
        let b = tmp.path().join("sub/b.md");
        io.write(&a, "x").unwrap();
        io.move_file(&a, &b).unwrap();
        assert!(!io.exists(&a));
        assert!(io.exists(&b));

        io.delete_folder_force(&tmp.path().join("sub")).unwrap();
        assert!(!io.exists(&b));
    }
}
