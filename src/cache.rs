//! Fingerprint cache for incremental builds.
//!
//! Two things are expensive to redo on an unchanged vault: copying every
//! document into the output tree (which would also throw away the headers
//! earlier plugin runs wrote there) and re-running plugins whose inputs are
//! the same as last time. This module records enough to skip both.
//!
//! ## Copy entries
//!
//! Keyed by destination path relative to the output root, valued by the
//! SHA-256 of the origin file at the time it was published. A document is
//! re-copied when:
//!
//! 1. there is no entry for its destination, or
//! 2. the origin hash changed, or
//! 3. the destination file no longer exists, or
//! 4. it is a text document and the build does not replay (below).
//!
//! Content-based rather than mtime-based so it survives `git checkout`.
//! Destinations recorded last build but not produced by this one are stale
//! and get deleted.
//!
//! ## Plugin entries
//!
//! Keyed `"<stage>/<position>/<name>"`, valued by a fingerprint over:
//!
//! ```text
//! stage \0 name \0 config-json \0 exclude patterns \0 folder flag \0 tree
//! ```
//!
//! where `tree` starts as the [`tree_fingerprint`] of every published file
//! and is folded with each plugin's fingerprint as the build moves on
//! ([`chain_fingerprint`]). A content edit, a rename or any option change
//! on this plugin or one before it changes the fingerprint. A plugin is
//! skipped when its fingerprint equals the recorded one, the cache is
//! enabled, and the plugin does not opt out with `disable_cache`.
//!
//! A `disable_cache` plugin folds a fresh random value into the chain
//! instead of its fingerprint, and records nothing. Every plugin after it
//! therefore reruns too.
//!
//! Published documents carry the edits of every plugin that ran over
//! them, so skipping is all or nothing: the builder only skips plugins
//! when all of them can be skipped and every copy is current (see
//! [`crate::build`]).
//!
//! Documents written by a content-generation plugin are recorded under its
//! key, so a skipped run can still hand them to the path store and a rerun
//! can delete the ones it no longer produces.
//!
//! ## Storage
//!
//! `<output_root>/.vaultpress-cache.json`, written through [`Io::write`].
//! A missing, corrupt or version-mismatched manifest loads as empty.
//! `--no-cache` still reads the manifest so stale outputs get removed, but
//! reuses nothing from it.

use crate::io::{Io, IoError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Name of the cache manifest file within the output directory.
pub const MANIFEST_FILENAME: &str = ".vaultpress-cache.json";

/// Bump to invalidate every existing manifest when key computation changes.
const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheManifest {
    pub version: u32,
    /// Destination (relative to the output root) → origin content hash.
    pub copies: BTreeMap<String, String>,
    /// Plugin key → fingerprint of its last run.
    pub plugins: BTreeMap<String, String>,
    /// Plugin key → documents it generated (relative to the output root).
    pub outputs: BTreeMap<String, Vec<String>>,
}

impl CacheManifest {
    pub fn empty() -> Self {
        Self {
            version: MANIFEST_VERSION,
            copies: BTreeMap::new(),
            plugins: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    /// Load from the output directory, or an empty manifest when there is
    /// nothing usable there.
    pub fn load(io: &dyn Io, output_dir: &Path) -> Self {
        let Ok(content) = io.read_file(&manifest_path(output_dir)) else {
            return Self::empty();
        };
        match serde_json::from_str::<Self>(&content) {
            Ok(m) if m.version == MANIFEST_VERSION => m,
            _ => Self::empty(),
        }
    }

    pub fn save(&self, io: &dyn Io, output_dir: &Path) -> Result<(), IoError> {
        let path = manifest_path(output_dir);
        let json = serde_json::to_string_pretty(self).map_err(|e| IoError::Io {
            path: path.clone(),
            source: e.into(),
        })?;
        io.write(&path, &json)
    }

    /// Whether `dest` already holds the content of an origin hashing to
    /// `source_hash`.
    pub fn copy_is_current(&self, dest: &str, source_hash: &str, dest_exists: bool) -> bool {
        dest_exists && self.copies.get(dest).is_some_and(|h| h == source_hash)
    }

    pub fn record_copy(&mut self, dest: String, source_hash: String) {
        self.copies.insert(dest, source_hash);
    }

    pub fn plugin_unchanged(&self, key: &str, fingerprint: &str) -> bool {
        self.plugins.get(key).is_some_and(|f| f == fingerprint)
    }

    pub fn record_plugin(&mut self, key: String, fingerprint: String) {
        self.plugins.insert(key, fingerprint);
    }

    pub fn record_outputs(&mut self, key: String, outputs: Vec<String>) {
        self.outputs.insert(key, outputs);
    }

    pub fn outputs(&self, key: &str) -> &[String] {
        self.outputs.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// Destinations recorded here that `current` no longer produces.
    pub fn stale_copies<'a>(&'a self, current: &'a CacheManifest) -> impl Iterator<Item = &'a str> {
        self.copies
            .keys()
            .filter(|dest| !current.copies.contains_key(*dest))
            .map(String::as_str)
    }
}

/// Resolve the cache manifest path for an output directory.
pub fn manifest_path(output_dir: &Path) -> PathBuf {
    output_dir.join(MANIFEST_FILENAME)
}

/// Cache key of a plugin at `position` within `stage`.
pub fn plugin_key(stage: &str, position: usize, name: &str) -> String {
    format!("{stage}/{position}/{name}")
}

pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// SHA-256 hash of a file's contents, returned as a hex string.
pub fn hash_file(io: &dyn Io, path: &Path) -> Result<String, IoError> {
    Ok(hash_bytes(&io.read_bytes(path)?))
}

/// One published file as it enters the tree fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedFile<'a> {
    pub origin: &'a Path,
    pub destination: &'a Path,
    pub content_hash: &'a str,
}

/// Hash over every published file, in the order given.
pub fn tree_fingerprint<'a>(files: impl IntoIterator<Item = PublishedFile<'a>>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"tree\0");
    for file in files {
        hasher.update(file.origin.to_string_lossy().as_bytes());
        hasher.update(b"\0");
        hasher.update(file.destination.to_string_lossy().as_bytes());
        hasher.update(b"\0");
        hasher.update(file.content_hash.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

/// Inputs that decide whether a plugin run can be skipped.
#[derive(Debug, Clone, Copy)]
pub struct PluginInputs<'a> {
    pub stage: &'a str,
    pub name: &'a str,
    pub config: &'a serde_json::Value,
    pub exclude_patterns: &'a [String],
    pub skip_folder_nodes: bool,
    pub tree: &'a str,
}

pub fn plugin_fingerprint(inputs: &PluginInputs<'_>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"plugin\0");
    hasher.update(inputs.stage.as_bytes());
    hasher.update(b"\0");
    hasher.update(inputs.name.as_bytes());
    hasher.update(b"\0");
    hasher.update(inputs.config.to_string().as_bytes());
    hasher.update(b"\0");
    for pattern in inputs.exclude_patterns {
        hasher.update(pattern.as_bytes());
        hasher.update(b"\x1f");
    }
    hasher.update(b"\0");
    hasher.update([u8::from(inputs.skip_folder_nodes)]);
    hasher.update(b"\0");
    hasher.update(inputs.tree.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Fold a plugin fingerprint into the running pipeline state.
pub fn chain_fingerprint(state: &str, fingerprint: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"chain\0");
    hasher.update(state.as_bytes());
    hasher.update(b"\0");
    hasher.update(fingerprint.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Summary of cache use for a build run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub copies_reused: u32,
    pub copies_written: u32,
    pub stale_removed: u32,
    pub plugins_skipped: u32,
    pub plugins_run: u32,
}

impl CacheStats {
    pub fn reused(&mut self) {
        self.copies_reused += 1;
    }

    pub fn written(&mut self) {
        self.copies_written += 1;
    }

    pub fn removed(&mut self) {
        self.stale_removed += 1;
    }

    pub fn skipped(&mut self) {
        self.plugins_skipped += 1;
    }

    pub fn ran(&mut self) {
        self.plugins_run += 1;
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} copied, {} unchanged",
            self.copies_written, self.copies_reused
        )?;
        if self.stale_removed > 0 {
            write!(f, ", {} removed", self.stale_removed)?;
        }
        write!(
            f,
            "; plugins: {} run, {} skipped",
            self.plugins_run, self.plugins_skipped
        )
    }
}
