//! # vaultpress
//!
//! Publishes a vault of markdown notes as a derived content tree. Your
//! filesystem is the data source: folders become categories, notes are
//! ordered by numeric prefix, and every note carries a YAML header that the
//! build validates, completes and cross-links.
//!
//! # Architecture: Staged Plugin Pipeline
//!
//! A build scans the vault into a file tree, then hands that tree through
//! four fixed stages of plugins:
//!
//! ```text
//! 1. tree-shaping          origin tree   (filter: drafts, private folders)
//!    path assignment       origin → destination
//!    publish               copy documents and media into the output root
//! 2. tree-walk             published documents (headers, routes)
//! 3. content-generation    new documents (category indexes)
//!    re-scan               output root → generated tree
//! 4. generated-tree-walk   generated tree (pagination, series)
//! ```
//!
//! The vault is never written to. Every header change happens on the
//! published copy, so a build can always be thrown away and rerun.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`tree`] | Arena of file nodes with parent/child ids and build info |
//! | [`scan`] | Walks a root directory into a [`tree::FileTree`] |
//! | [`io`] | Filesystem capability trait and the `std::fs` implementation |
//! | [`logger`] | Logger trait, `tracing` and buffered implementations |
//! | [`naming`] | `NNN-name` ordering prefixes and slugs |
//! | [`route`] | Route shape grammar and path binding |
//! | [`metadata`] | Header parsing, validation, defaults and rewriting |
//! | [`plugin`] | Stages, plugin traits, descriptors and the registry |
//! | [`paths`] | Origin → destination store and the default path generator |
//! | [`build`] | The pipeline itself, plus `check` |
//! | [`cache`] | Fingerprints that let unchanged plugins skip a run |
//! | [`jobs`] | Bounded history of plugin runs |
//! | [`plugins`] | Built-in plugins |
//! | [`config`] | `vaultpress.toml` loading, merging and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Sequential Builds
//!
//! A build is one thread doing blocking IO. Plugins run in registration
//! order and see nodes in pre-order, so two builds of the same vault make
//! the same writes in the same order. Plugins are still `Send + Sync` so a
//! builder can be moved to a worker thread.
//!
//! ## Headers Stay YAML Mappings
//!
//! Known fields are validated into [`metadata::DocumentMeta`]; everything
//! else rides along untouched in header order. Updates merge into the raw
//! mapping, so a plugin that sets `href` never drops a field it does not
//! know about.
//!
//! ## NNN-Prefix Ordering
//!
//! Folders and notes use a numeric prefix (`001-`, `020-`) for ordering.
//! Listings are sorted by name, which makes the prefix the sort key; the
//! prefix is stripped from published paths by [`naming::publish_component`].

pub mod build;
pub mod cache;
pub mod config;
pub mod io;
pub mod jobs;
pub mod logger;
pub mod metadata;
pub mod naming;
pub mod output;
pub mod paths;
pub mod plugin;
pub mod plugins;
pub mod route;
pub mod scan;
pub mod tree;

#[cfg(test)]
pub(crate) mod test_helpers;
