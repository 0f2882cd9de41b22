//! Vault scanning: directory tree → [`FileTree`].
//!
//! Stage 1 of the vaultpress build. Walks a root directory through the
//! [`Io`] collaborator and classifies every entry it keeps.
//!
//! ## Naming predicates
//!
//! Two predicates decide what enters the tree, each called with the entry's
//! name and its depth (0 for the root's direct children):
//!
//! ```text
//! file_matcher(name, depth)    false → file left out
//! folder_matcher(name, depth)  false → folder and everything below left out
//! ```
//!
//! Both default to accepting everything. [`ScanOptions::ignoring`] builds
//! predicates from glob patterns such as `.*` or `_templates`.
//!
//! ## Classification
//!
//! | Entry | Category |
//! |-------|----------|
//! | directory | `FOLDER` |
//! | text extension (`md`, `mdx`, ...) | `TEXT_DOCUMENT` |
//! | media extension (`png`, `mp4`, ...) | `MEDIA_FILE` |
//! | anything else | `UNKNOWN` |
//!
//! ## Failures
//!
//! An unreadable root fails the scan. An unreadable directory further down
//! keeps its folder node with no children and is reported in
//! [`ParseOutcome::failures`]; its siblings are scanned as usual.

use crate::io::{DirEntry, Io, IoError};
use crate::tree::{FileTree, FileTreeNode, NodeCategory, NodeId};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Cannot read vault root {0}: {1}")]
    Root(PathBuf, #[source] IoError),
    #[error("Invalid ignore pattern {0:?}: {1}")]
    Pattern(String, #[source] glob::PatternError),
}

pub type NameMatcher = Box<dyn Fn(&str, usize) -> bool + Send + Sync>;

pub const DEFAULT_TEXT_EXTENSIONS: &[&str] = &["md", "mdx", "markdown"];
pub const DEFAULT_MEDIA_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "webp", "avif", "svg", "mp3", "mp4", "webm", "pdf",
];

/// Inclusion rules and extension sets for one scan.
pub struct ScanOptions {
    pub file_matcher: NameMatcher,
    pub folder_matcher: NameMatcher,
    pub text_extensions: Vec<String>,
    pub media_extensions: Vec<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            file_matcher: Box::new(|_, _| true),
            folder_matcher: Box::new(|_, _| true),
            text_extensions: DEFAULT_TEXT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            media_extensions: DEFAULT_MEDIA_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl ScanOptions {
    /// Options that leave out any file or folder whose name matches one of
    /// `patterns`.
    pub fn ignoring(patterns: &[String]) -> Result<Self, ScanError> {
        let compiled = patterns
            .iter()
            .map(|p| glob::Pattern::new(p).map_err(|e| ScanError::Pattern(p.clone(), e)))
            .collect::<Result<Vec<_>, _>>()?;
        let for_files = compiled.clone();
        Ok(Self {
            file_matcher: Box::new(move |name, _| !for_files.iter().any(|p| p.matches(name))),
            folder_matcher: Box::new(move |name, _| !compiled.iter().any(|p| p.matches(name))),
            ..Self::default()
        })
    }

    pub fn with_extensions(mut self, text: &[String], media: &[String]) -> Self {
        self.text_extensions = text.iter().map(|e| e.to_lowercase()).collect();
        self.media_extensions = media.iter().map(|e| e.to_lowercase()).collect();
        self
    }

    fn classify(&self, entry: &DirEntry) -> NodeCategory {
        if entry.is_dir {
            return NodeCategory::Folder;
        }
        match entry.extension.as_deref() {
            Some(ext) if self.text_extensions.iter().any(|e| e == ext) => {
                NodeCategory::TextDocument
            }
            Some(ext) if self.media_extensions.iter().any(|e| e == ext) => NodeCategory::MediaFile,
            _ => NodeCategory::Unknown,
        }
    }
}

/// A subtree that could not be read.
#[derive(Debug)]
pub struct ScanFailure {
    pub path: PathBuf,
    pub error: IoError,
}

#[derive(Debug)]
pub struct ParseOutcome {
    pub tree: FileTree,
    pub failures: Vec<ScanFailure>,
}

/// Scan `root` into a [`FileTree`].
pub fn parse(root: &Path, io: &dyn Io, options: &ScanOptions) -> Result<ParseOutcome, ScanError> {
    let entries = io
        .read_dir(root)
        .map_err(|e| ScanError::Root(root.to_path_buf(), e))?;

    let mut tree = FileTree::new(root.to_path_buf());
    let mut failures = Vec::new();
    scan_entries(
        entries,
        root,
        None,
        0,
        io,
        options,
        &mut tree,
        &mut failures,
    );

    Ok(ParseOutcome { tree, failures })
}

#[allow(clippy::too_many_arguments)]
fn scan_entries(
    entries: Vec<DirEntry>,
    root: &Path,
    parent: Option<NodeId>,
    depth: usize,
    io: &dyn Io,
    options: &ScanOptions,
    tree: &mut FileTree,
    failures: &mut Vec<ScanFailure>,
) {
    for entry in entries {
        let keep = if entry.is_dir {
            (options.folder_matcher)(&entry.name, depth)
        } else {
            (options.file_matcher)(&entry.name, depth)
        };
        if !keep {
            continue;
        }

        let node = FileTreeNode::new(
            relative_id(root, &entry.path),
            entry.name.clone(),
            entry.path.clone(),
            options.classify(&entry),
            depth,
        );
        let id = tree.insert(node, parent);

        if entry.is_dir {
            match io.read_dir(&entry.path) {
                Ok(children) => scan_entries(
                    children,
                    root,
                    Some(id),
                    depth + 1,
                    io,
                    options,
                    tree,
                    failures,
                ),
                Err(error) => failures.push(ScanFailure {
                    path: entry.path,
                    error,
                }),
            }
        }
    }
}

/// Root-relative path with `/` separators.
fn relative_id(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
