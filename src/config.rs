//! Build configuration module.
//!
//! Handles loading, validating, and merging `vaultpress.toml`. Stock defaults
//! form the base layer; the user file only needs the keys it overrides.
//!
//! ## Config File Location
//!
//! `vaultpress.toml` next to the vault, or wherever `--config` points:
//!
//! ```text
//! blog/
//! ├── vaultpress.toml
//! ├── vault/               # vault_root
//! │   ├── 010-tech/
//! │   └── ...
//! └── dist/                # output_root (created by the build)
//! ```
//!
//! Relative `vault_root` / `output_root` resolve against the directory the
//! config file lives in.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! vault_root = "vault"
//! output_root = "dist"
//!
//! [route]
//! shape = "/[category]/[...post]"
//! open_tag = "["
//! close_tag = "]"
//!
//! [scan]
//! text_extensions = ["md", "mdx", "markdown"]
//! media_extensions = ["png", "jpg", "jpeg", "gif", "webp", "avif", "svg", "mp3", "mp4", "webm", "pdf"]
//! ignore = [".*"]
//!
//! [plugins]
//! exclude = []              # Globs (vault-relative) every built-in skips
//! drafts = true
//! meta_defaults = true
//! route_params = true
//! category_index = true
//! category_dir = "categories"
//! pagination = true
//! series = true
//!
//! [history]
//! capacity = 64             # Job records kept
//!
//! [cache]
//! enabled = true
//! ```
//!
//! ## Validation
//!
//! Unknown keys are rejected. [`BuildConfig::validate`] also builds the route
//! analyzer and analyzes the shape, so bad delimiters or a misplaced spread
//! parameter are reported before the build touches any file.

use crate::route::{RouteAnalyzer, RouteError, RouteShape};
use crate::scan::{DEFAULT_MEDIA_EXTENSIONS, DEFAULT_TEXT_EXTENSIONS};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file name looked up by the CLI.
pub const CONFIG_FILENAME: &str = "vaultpress.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("Route config error: {0}")]
    Route(#[from] RouteError),
}

/// Build configuration loaded from `vaultpress.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    pub vault_root: String,
    pub output_root: String,
    pub route: RouteConfig,
    pub scan: ScanConfig,
    pub plugins: PluginsConfig,
    pub history: HistoryConfig,
    pub cache: CacheConfig,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            vault_root: "vault".to_string(),
            output_root: "dist".to_string(),
            route: RouteConfig::default(),
            scan: ScanConfig::default(),
            plugins: PluginsConfig::default(),
            history: HistoryConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl BuildConfig {
    /// Validate config values and the route shape.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.vault_root.trim().is_empty() || self.output_root.trim().is_empty() {
            return Err(ConfigError::Validation(
                "vault_root and output_root must not be empty".into(),
            ));
        }
        if Path::new(&self.vault_root) == Path::new(&self.output_root) {
            return Err(ConfigError::Validation(
                "output_root must differ from vault_root".into(),
            ));
        }
        if self.scan.text_extensions.is_empty() {
            return Err(ConfigError::Validation(
                "scan.text_extensions must not be empty".into(),
            ));
        }
        if self.history.capacity == 0 {
            return Err(ConfigError::Validation(
                "history.capacity must be at least 1".into(),
            ));
        }
        if self.plugins.category_dir.contains(['/', '\\']) || self.plugins.category_dir.is_empty()
        {
            return Err(ConfigError::Validation(
                "plugins.category_dir must be a single path segment".into(),
            ));
        }
        for pattern in self.scan.ignore.iter().chain(&self.plugins.exclude) {
            glob::Pattern::new(pattern).map_err(|e| {
                ConfigError::Validation(format!("invalid glob {pattern:?}: {e}"))
            })?;
        }
        self.route_shape()?;
        Ok(())
    }

    pub fn route_analyzer(&self) -> Result<RouteAnalyzer, RouteError> {
        RouteAnalyzer::new(&self.route.open_tag, &self.route.close_tag)
    }

    pub fn route_shape(&self) -> Result<RouteShape, RouteError> {
        self.route_analyzer()?.analyze_param(&self.route.shape)
    }

    /// `(vault_root, output_root)` resolved against `base`.
    pub fn resolve_roots(&self, base: &Path) -> (PathBuf, PathBuf) {
        (base.join(&self.vault_root), base.join(&self.output_root))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RouteConfig {
    /// Route shape documents are bound against, e.g. `/[category]/[...post]`.
    pub shape: String,
    pub open_tag: String,
    pub close_tag: String,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            shape: "/[category]/[...post]".to_string(),
            open_tag: "[".to_string(),
            close_tag: "]".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    pub text_extensions: Vec<String>,
    pub media_extensions: Vec<String>,
    /// Name globs left out of the scan.
    pub ignore: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            text_extensions: DEFAULT_TEXT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            media_extensions: DEFAULT_MEDIA_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ignore: vec![".*".to_string()],
        }
    }
}

/// Toggles for the built-in plugins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PluginsConfig {
    /// Vault-relative globs every built-in plugin skips.
    pub exclude: Vec<String>,
    pub drafts: bool,
    pub meta_defaults: bool,
    pub route_params: bool,
    pub category_index: bool,
    /// Output folder for generated category indexes.
    pub category_dir: String,
    pub pagination: bool,
    pub series: bool,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            exclude: Vec::new(),
            drafts: true,
            meta_defaults: true,
            route_params: true,
            category_index: true,
            category_dir: "categories".to_string(),
            pagination: true,
            series: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HistoryConfig {
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { capacity: 64 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(BuildConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config must serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value. `Ok(None)` when it doesn't exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<BuildConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: BuildConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the config file at `path` over stock defaults.
///
/// A missing file yields the defaults. Unknown keys and invalid values are
/// errors.
pub fn load_config(path: &Path) -> Result<BuildConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `vaultpress.toml` with all keys and
/// explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# vaultpress configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# Vault to read and directory to publish into. Relative paths resolve
# against the directory containing this file.
vault_root = "vault"
output_root = "dist"

# ---------------------------------------------------------------------------
# Route shape
# ---------------------------------------------------------------------------
# Published documents are bound against this shape to compute their `href`
# and `params` header fields.
#   [name]     one path component
#   [...name]  every remaining component (must be last)
#   name       static divider: consumes one component as an anchor
[route]
shape = "/[category]/[...post]"
open_tag = "["
close_tag = "]"

# ---------------------------------------------------------------------------
# Scanning
# ---------------------------------------------------------------------------
[scan]
# Extensions (without the dot, case-insensitive) classified as documents.
text_extensions = ["md", "mdx", "markdown"]
# Extensions classified as media and copied alongside documents.
media_extensions = ["png", "jpg", "jpeg", "gif", "webp", "avif", "svg", "mp3", "mp4", "webm", "pdf"]
# File and folder names left out entirely (glob, matched against the name).
ignore = [".*"]

# ---------------------------------------------------------------------------
# Built-in plugins
# ---------------------------------------------------------------------------
[plugins]
# Vault-relative globs every built-in plugin skips, e.g. ["archive/**"].
exclude = []
# Drop documents whose header says `draft: true`.
drafts = true
# Repair invalid headers with generated defaults.
meta_defaults = true
# Bind each document to the route shape and write `href` / `params`.
route_params = true
# Generate one index document per category.
category_index = true
category_dir = "categories"
# Link sibling documents with `pagination.prev` / `pagination.next`.
pagination = true
# Write `seriesInfo` for documents sharing a `series`.
series = true

# ---------------------------------------------------------------------------
# Job history
# ---------------------------------------------------------------------------
[history]
# Number of plugin runs kept in the build report.
capacity = 64

# ---------------------------------------------------------------------------
# Cache
# ---------------------------------------------------------------------------
[cache]
# Skip unchanged copies and plugin runs. `build --no-cache` overrides this.
enabled = true
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(tmp: &TempDir, content: &str) -> PathBuf {
        let path = tmp.path().join(CONFIG_FILENAME);
        fs::write(&path, content).unwrap();
        path
    }

    // =========================================================================
    // Defaults
    // =========================================================================

    #[test]
    fn default_config_is_valid() {
        let config = BuildConfig::default();
        config.validate().unwrap();
        assert_eq!(config.vault_root, "vault");
        assert_eq!(config.output_root, "dist");
        assert_eq!(config.route.shape, "/[category]/[...post]");
        assert!(config.cache.enabled);
        assert_eq!(config.history.capacity, 64);
    }

    #[test]
    fn default_route_shape_analyzes() {
        let shape = BuildConfig::default().route_shape().unwrap();
        assert_eq!(shape.dynamic_params, vec!["category", "post"]);
    }

    // =========================================================================
    // Loading
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join(CONFIG_FILENAME)).unwrap();
        assert_eq!(config.plugins.category_dir, "categories");
    }

    #[test]
    fn load_config_reads_partial_file() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            r#"
output_root = "public"

[plugins]
pagination = false
"#,
        );

        let config = load_config(&path).unwrap();
        assert_eq!(config.output_root, "public");
        assert!(!config.plugins.pagination);
        // Unspecified values should be defaults
        assert!(config.plugins.series);
        assert_eq!(config.vault_root, "vault");
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, "this is not valid toml [[[");
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_rejects_unknown_keys() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, "[plugins]\nsitemap = true\n");
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn bad_delimiter_is_route_error() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, "[route]\nopen_tag = \"{{\"\n");
        assert!(matches!(
            load_config(&path),
            Err(ConfigError::Route(RouteError::InvalidDelimiter(_)))
        ));
    }

    #[test]
    fn spread_not_last_is_route_error() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, "[route]\nshape = \"/[...rest]/[slug]\"\n");
        assert!(matches!(
            load_config(&path),
            Err(ConfigError::Route(RouteError::SpreadNotLast { .. }))
        ));
    }

    #[test]
    fn custom_delimiters_analyze_shape() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            "[route]\nopen_tag = \"{\"\nclose_tag = \"}\"\nshape = \"/blog/{...slug}\"\n",
        );
        let config = load_config(&path).unwrap();
        assert_eq!(config.route_shape().unwrap().dynamic_params, vec!["slug"]);
    }

    #[test]
    fn zero_history_capacity_is_invalid() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, "[history]\ncapacity = 0\n");
        assert!(matches!(
            load_config(&path),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn invalid_exclude_glob_is_invalid() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, "[plugins]\nexclude = [\"[\"]\n");
        assert!(matches!(
            load_config(&path),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn same_vault_and_output_is_invalid() {
        let config = BuildConfig {
            output_root: "vault".into(),
            ..BuildConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn resolve_roots_joins_base() {
        let (vault, out) = BuildConfig::default().resolve_roots(Path::new("/blog"));
        assert_eq!(vault, PathBuf::from("/blog/vault"));
        assert_eq!(out, PathBuf::from("/blog/dist"));
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str(r#"capacity = 64"#).unwrap();
        let overlay: toml::Value = toml::from_str(r#"capacity = 8"#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("capacity").unwrap().as_integer(), Some(8));
    }

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str(
            r#"
[route]
shape = "/[slug]"
open_tag = "["
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[route]
shape = "/[...slug]"
"#,
        )
        .unwrap();
        let merged = merge_toml(base, overlay);
        let route = merged.get("route").unwrap();
        assert_eq!(route.get("shape").unwrap().as_str(), Some("/[...slug]"));
        // open_tag preserved from base
        assert_eq!(route.get("open_tag").unwrap().as_str(), Some("["));
    }

    #[test]
    fn merge_toml_array_replaces() {
        let base: toml::Value = toml::from_str(r#"ignore = [".*", "_*"]"#).unwrap();
        let overlay: toml::Value = toml::from_str(r#"ignore = ["tmp"]"#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("ignore").unwrap().as_array().unwrap().len(), 1);
    }

    // =========================================================================
    // Stock config
    // =========================================================================

    #[test]
    fn stock_config_toml_matches_defaults() {
        let parsed: BuildConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = BuildConfig::default();
        assert_eq!(parsed.vault_root, defaults.vault_root);
        assert_eq!(parsed.route.shape, defaults.route.shape);
        assert_eq!(parsed.scan.text_extensions, defaults.scan.text_extensions);
        assert_eq!(parsed.scan.media_extensions, defaults.scan.media_extensions);
        assert_eq!(parsed.scan.ignore, defaults.scan.ignore);
        assert_eq!(parsed.plugins.category_dir, defaults.plugins.category_dir);
        assert_eq!(parsed.history.capacity, defaults.history.capacity);
        assert_eq!(parsed.cache.enabled, defaults.cache.enabled);
    }
}
