//! Built-in plugins.
//!
//! | Plugin | Stage | Effect |
//! |--------|-------|--------|
//! | [`drafts`] | `tree-shaping` | drops documents whose header says `draft: true` |
//! | [`defaults`] | `tree-walk` | repairs headers that fail validation |
//! | [`route_params`] | `tree-walk` | writes `params` and `href` from the route shape |
//! | [`category_index`] | `content-generation` | one index document per `category` |
//! | [`pagination`] | `generated-tree-walk` | prev/next links between siblings |
//! | [`series`] | `generated-tree-walk` | position within a `series` |
//!
//! [`standard_plugins`] turns the `[plugins]` table of the config into
//! registrations, in the order above. Each built-in carries its options as
//! descriptor config so that changing them invalidates its cache entry.

pub mod category_index;
pub mod defaults;
pub mod drafts;
pub mod pagination;
pub mod route_params;
pub mod series;

use crate::config::{BuildConfig, ConfigError};
use crate::metadata::PageLink;
use crate::paths::relative_slash_path;
use crate::plugin::{BuildTools, PluginDescriptor, Stage};
use crate::tree::FileTreeNode;
use std::path::Path;
use std::sync::Arc;

/// The built-in plugins enabled by `config`, with the stage each runs in.
pub fn standard_plugins(
    config: &BuildConfig,
) -> Result<Vec<(Stage, Arc<PluginDescriptor>)>, ConfigError> {
    let toggles = &config.plugins;
    let mut enabled: Vec<(Stage, PluginDescriptor)> = Vec::new();

    if toggles.drafts {
        enabled.push((Stage::TreeShaping, drafts::descriptor()));
    }
    if toggles.meta_defaults {
        enabled.push((Stage::TreeWalk, defaults::descriptor()));
    }
    if toggles.route_params {
        let shape = config.route_shape()?;
        let options = serde_json::json!({
            "shape": config.route.shape,
            "open_tag": config.route.open_tag,
            "close_tag": config.route.close_tag,
        });
        enabled.push((
            Stage::TreeWalk,
            route_params::descriptor(shape).with_config(options),
        ));
    }
    if toggles.category_index {
        enabled.push((
            Stage::ContentGeneration,
            category_index::descriptor(&toggles.category_dir, &config.scan.text_extensions),
        ));
    }
    if toggles.pagination {
        enabled.push((Stage::GeneratedTreeWalk, pagination::descriptor()));
    }
    if toggles.series {
        enabled.push((Stage::GeneratedTreeWalk, series::descriptor()));
    }

    Ok(enabled
        .into_iter()
        .map(|(stage, plugin)| (stage, Arc::new(plugin.with_exclude(toggles.exclude.clone()))))
        .collect())
}

/// `/`-rooted path of a published file relative to the output root, without
/// its extension: `dist/tech/intro.md` → `/tech/intro`.
pub fn fallback_href(output_root: &Path, path: &Path) -> String {
    let stripped = path.with_extension("");
    let rel = relative_slash_path(output_root, &stripped)
        .unwrap_or_else(|| stripped.to_string_lossy().into_owned());
    format!("/{}", rel.trim_start_matches('/'))
}

/// Title and href of a published document. Documents whose header does not
/// validate fall back to their file stem and path.
pub(crate) fn page_link(tools: &BuildTools<'_>, node: &FileTreeNode) -> PageLink {
    let path = node.effective_path();
    let fallback = || fallback_href(tools.output_root, path);
    match tools.meta().extract_from_file(path) {
        Ok(doc) => PageLink {
            title: doc.meta.title,
            href: doc.meta.href.unwrap_or_else(fallback),
        },
        Err(_) => PageLink {
            title: path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            href: fallback(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;

    fn names(plugins: &[(Stage, Arc<PluginDescriptor>)]) -> Vec<(Stage, &str)> {
        plugins.iter().map(|(s, p)| (*s, p.name.as_str())).collect()
    }

    #[test]
    fn stock_config_enables_every_builtin_in_order() {
        let plugins = standard_plugins(&BuildConfig::default()).unwrap();
        assert_eq!(
            names(&plugins),
            vec![
                (Stage::TreeShaping, drafts::NAME),
                (Stage::TreeWalk, defaults::NAME),
                (Stage::TreeWalk, route_params::NAME),
                (Stage::ContentGeneration, category_index::NAME),
                (Stage::GeneratedTreeWalk, pagination::NAME),
                (Stage::GeneratedTreeWalk, series::NAME),
            ]
        );
    }

    #[test]
    fn toggles_disable_plugins() {
        let mut config = BuildConfig::default();
        config.plugins.drafts = false;
        config.plugins.series = false;
        config.plugins.category_index = false;

        let plugins = standard_plugins(&config).unwrap();
        assert_eq!(
            names(&plugins),
            vec![
                (Stage::TreeWalk, defaults::NAME),
                (Stage::TreeWalk, route_params::NAME),
                (Stage::GeneratedTreeWalk, pagination::NAME),
            ]
        );
    }

    #[test]
    fn shared_excludes_apply_to_every_builtin() {
        let mut config = BuildConfig::default();
        config.plugins.exclude = vec!["drafts/**".into()];

        let plugins = standard_plugins(&config).unwrap();
        assert!(
            plugins
                .iter()
                .all(|(_, p)| p.exclude_patterns == vec!["drafts/**".to_string()])
        );
    }

    #[test]
    fn route_options_feed_the_fingerprint_config() {
        let mut config = BuildConfig::default();
        config.route.shape = "/[slug]".into();

        let plugins = standard_plugins(&config).unwrap();
        let (_, route) = plugins
            .iter()
            .find(|(_, p)| p.name == route_params::NAME)
            .unwrap();
        assert_eq!(route.config["shape"], "/[slug]");
    }

    #[test]
    fn bad_route_shape_is_a_config_error() {
        let mut config = BuildConfig::default();
        config.route.shape = "/[...rest]/[slug]".into();
        assert!(matches!(
            standard_plugins(&config),
            Err(ConfigError::Route(_))
        ));
    }

    #[test]
    fn fallback_href_strips_root_and_extension() {
        assert_eq!(
            fallback_href(Path::new("/out"), Path::new("/out/tech/intro.md")),
            "/tech/intro"
        );
        assert_eq!(
            fallback_href(Path::new("/out"), Path::new("/out/about.md")),
            "/about"
        );
    }
}
