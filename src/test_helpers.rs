//! Shared test utilities for the vaultpress test suite.
//!
//! Provides fixture setup, tree lookups and a one-call build harness for
//! plugin tests.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_fixtures();
//! let outcome = parse(tmp.path(), &FsIo::new(), &ScanOptions::default()).unwrap();
//! let post = find_node(&outcome.tree, "010-tech/001-intro.md");
//!
//! let tmp = TempDir::new().unwrap();
//! write_vault(&tmp, &[("a.md", "---\ntitle: A\ndescription: d\n---\n")]);
//! let report = build_vault(&tmp, vec![(Stage::TreeWalk, plugin)]);
//! assert!(output_path(&tmp, "a.md").exists());
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use crate::build::{BuildReport, Builder};
use crate::io::{DirEntry, FsIo, Io, IoError};
use crate::logger::BufferedLogger;
use crate::plugin::{PluginDescriptor, Stage};
use crate::tree::{FileTree, FileTreeNode};

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/vault/` to a temp directory and return it.
///
/// Tests get an isolated copy they can mutate without affecting other tests
/// or the source fixtures.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/vault");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

/// Write `text` to `path`, creating parent directories.
pub fn write_file(path: &Path, text: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, text).unwrap();
}

/// Write `(vault-relative path, text)` pairs under `<tmp>/vault`.
pub fn write_vault(tmp: &TempDir, docs: &[(&str, &str)]) {
    for (path, text) in docs {
        write_file(&tmp.path().join("vault").join(path), text);
    }
}

/// `<tmp>/out/<rel>`.
pub fn output_path(tmp: &TempDir, rel: &str) -> PathBuf {
    tmp.path().join("out").join(rel)
}

// =========================================================================
// Build harness
// =========================================================================

/// Build `<tmp>/vault` into `<tmp>/out` with only `plugins` registered and
/// the cache off.
pub fn build_vault(tmp: &TempDir, plugins: Vec<(Stage, PluginDescriptor)>) -> BuildReport {
    build_vault_logged(tmp, plugins).0
}

/// [`build_vault`], also returning the log.
pub fn build_vault_logged(
    tmp: &TempDir,
    plugins: Vec<(Stage, PluginDescriptor)>,
) -> (BuildReport, Arc<BufferedLogger>) {
    let logger = Arc::new(BufferedLogger::default());
    let mut builder = Builder::new(
        tmp.path().join("vault"),
        tmp.path().join("out"),
        Arc::new(FsIo::new()),
        logger.clone(),
    )
    .with_cache(false);
    for (stage, plugin) in plugins {
        builder.register(stage, Arc::new(plugin)).unwrap();
    }
    (builder.build().unwrap(), logger)
}

// =========================================================================
// Tree lookups
// =========================================================================

/// Find a node by id. Panics with the available ids if not found.
pub fn find_node<'a>(tree: &'a FileTree, id: &str) -> &'a FileTreeNode {
    match tree.find(id) {
        Some(found) => tree.get(found),
        None => panic!("node {id:?} not found. Available: {:?}", node_ids(tree)),
    }
}

/// Every attached node id in pre-order.
pub fn node_ids(tree: &FileTree) -> Vec<String> {
    tree.iter().map(|id| tree.get(id).id.clone()).collect()
}

// =========================================================================
// Failing IO
// =========================================================================

/// [`FsIo`] whose directory listing of `failing` always errors.
pub struct FailingDirIo {
    pub inner: FsIo,
    pub failing: PathBuf,
}

impl Io for FailingDirIo {
    fn read_file(&self, path: &Path) -> Result<String, IoError> {
        self.inner.read_file(path)
    }

    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>, IoError> {
        self.inner.read_bytes(path)
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>, IoError> {
        if path == self.failing {
            return Err(IoError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            });
        }
        self.inner.read_dir(path)
    }

    fn write(&self, path: &Path, data: &str) -> Result<(), IoError> {
        self.inner.write(path, data)
    }

    fn delete_file(&self, path: &Path) -> Result<(), IoError> {
        self.inner.delete_file(path)
    }

    fn delete_folder(&self, path: &Path) -> Result<(), IoError> {
        self.inner.delete_folder(path)
    }

    fn delete_folder_force(&self, path: &Path) -> Result<(), IoError> {
        self.inner.delete_folder_force(path)
    }

    fn copy_file(&self, from: &Path, to: &Path) -> Result<(), IoError> {
        self.inner.copy_file(from, to)
    }

    fn copy_folder(&self, from: &Path, to: &Path) -> Result<(), IoError> {
        self.inner.copy_folder(from, to)
    }

    fn move_file(&self, from: &Path, to: &Path) -> Result<(), IoError> {
        self.inner.move_file(from, to)
    }

    fn move_folder(&self, from: &Path, to: &Path) -> Result<(), IoError> {
        self.inner.move_folder(from, to)
    }

    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path)
    }
}
