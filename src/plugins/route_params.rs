//! Writes `params` and `href` into every published document.
//!
//! The destination path relative to the output root, extension stripped, is
//! bound against the configured route shape:
//!
//! ```text
//! shape  /[category]/[...post]
//! dest   dist/tech/rust/intro.md  →  tech / rust / intro
//! params { category: tech, post: rust/intro }
//! href   /tech/rust/intro
//! ```
//!
//! A document whose path does not fit the shape (too few components for a
//! root-level page, say) is left alone with a warning.

use crate::metadata::PartialMeta;
use crate::plugin::{BuildTools, PluginDescriptor, PluginError, Visit, WalkOutcome, Walker};
use crate::route::{RouteError, RouteShape};
use std::path::Component;

pub const NAME: &str = "route-params";

pub struct RouteParams {
    shape: RouteShape,
}

impl RouteParams {
    pub fn new(shape: RouteShape) -> Self {
        Self { shape }
    }
}

impl Walker for RouteParams {
    fn walk(&self, visit: &Visit<'_>, tools: &BuildTools<'_>) -> Result<WalkOutcome, PluginError> {
        let node = visit.node;
        if !node.is_text_document() || node.build_info.is_none() {
            return Ok(WalkOutcome::Continue);
        }
        let path = node.effective_path();
        let stem = path.with_extension("");
        let relative = stem.strip_prefix(tools.output_root).map_err(|_| {
            PluginError::Failed(format!("{} is outside the output root", path.display()))
        })?;
        let components: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        let components: Vec<&str> = components.iter().map(String::as_str).collect();

        let binding = match self.shape.bind(&components) {
            Ok(binding) => binding,
            Err(RouteError::Mismatch { path, reason }) => {
                tools
                    .logger
                    .warn(&format!("{}: not routed, {path:?} {reason}", node.id));
                return Ok(WalkOutcome::Continue);
            }
            Err(e) => return Err(e.into()),
        };

        tools.meta().update(
            path,
            &PartialMeta::new()
                .params(&binding.params)
                .href(&binding.href),
        )?;
        Ok(WalkOutcome::Continue)
    }
}

pub fn descriptor(shape: RouteShape) -> PluginDescriptor {
    PluginDescriptor::walker(NAME, RouteParams::new(shape))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::FsIo;
    use crate::logger::Level;
    use crate::metadata::MetaEngine;
    use crate::plugin::Stage;
    use crate::route::RouteAnalyzer;
    use crate::test_helpers::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    const DOC: &str = "---\ntitle: T\ndescription: D\n---\nBody\n";

    fn plugin(shape: &str) -> PluginDescriptor {
        let shape = RouteAnalyzer::new("[", "]")
            .unwrap()
            .analyze_param(shape)
            .unwrap();
        descriptor(shape)
    }

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn binds_category_and_spread() {
        let tmp = TempDir::new().unwrap();
        write_vault(&tmp, &[("010-tech/020-rust/001-intro.md", DOC)]);

        let report = build_vault(&tmp, vec![(Stage::TreeWalk, plugin("/[category]/[...post]"))]);
        assert!(report.is_clean(), "{:?}", report.failures);

        let doc = MetaEngine::new(&FsIo::new())
            .extract_from_file(&output_path(&tmp, "tech/rust/intro.md"))
            .unwrap();
        assert_eq!(
            doc.meta.params,
            Some(params(&[("category", "tech"), ("post", "rust/intro")]))
        );
        assert_eq!(doc.meta.href.as_deref(), Some("/tech/rust/intro"));
        assert_eq!(doc.content, "Body\n");
    }

    #[test]
    fn static_divider_folds_into_next_param() {
        let tmp = TempDir::new().unwrap();
        write_vault(&tmp, &[("blog/2024/hello.md", DOC)]);

        build_vault(&tmp, vec![(Stage::TreeWalk, plugin("/blog/[year]/[slug]"))]);

        let doc = MetaEngine::new(&FsIo::new())
            .extract_from_file(&output_path(&tmp, "blog/2024/hello.md"))
            .unwrap();
        assert_eq!(
            doc.meta.params,
            Some(params(&[("year", "blog/2024"), ("slug", "hello")]))
        );
        assert_eq!(doc.meta.href.as_deref(), Some("/blog/2024/hello"));
    }

    #[test]
    fn unroutable_document_is_skipped_with_warning() {
        let tmp = TempDir::new().unwrap();
        write_vault(&tmp, &[("about.md", DOC)]);

        let (report, logger) =
            build_vault_logged(&tmp, vec![(Stage::TreeWalk, plugin("/[category]/[...post]"))]);

        assert!(report.is_clean());
        assert_eq!(
            std::fs::read_to_string(output_path(&tmp, "about.md")).unwrap(),
            DOC
        );
        assert!(
            logger
                .messages(Level::Warn)
                .iter()
                .any(|m| m.contains("about.md: not routed"))
        );
    }

    #[test]
    fn invalid_header_fails_the_node() {
        let tmp = TempDir::new().unwrap();
        write_vault(&tmp, &[("tech/a.md", "no header\n"), ("tech/b.md", DOC)]);

        let report = build_vault(&tmp, vec![(Stage::TreeWalk, plugin("/[category]/[post]"))]);

        let failed: Vec<_> = report.failed_jobs().collect();
        assert_eq!(failed.len(), 1);
        let reason = failed[0].failure_reason.as_deref().unwrap();
        assert!(reason.starts_with("1 of 2 nodes failed: tech/a.md:"), "{reason}");
        let doc = MetaEngine::new(&FsIo::new())
            .extract_from_file(&output_path(&tmp, "tech/b.md"))
            .unwrap();
        assert_eq!(doc.meta.href.as_deref(), Some("/tech/b"));
    }
}
