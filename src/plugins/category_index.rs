//! Generates one index document per `category`.
//!
//! Every published text document with a valid header and a `category` is
//! listed under `<output>/<category_dir>/<slug>.md`:
//!
//! ```text
//! ---
//! title: tech
//! description: 2 documents in tech
//! update: 2024-03-02T10:00:00Z
//! href: /categories/tech
//! ---
//! - [Intro to Rust](/tech/intro)
//! - [Ownership](/tech/ownership)
//! ```
//!
//! Entries follow vault order (the order of their origin paths). Documents
//! without a valid header are not listed.

use super::fallback_href;
use crate::metadata::{PageLink, PartialMeta, render_document};
use crate::naming::slugify;
use crate::plugin::{BuildTools, GeneratedDocument, Modifier, PluginDescriptor, PluginError};
use std::collections::BTreeMap;
use std::path::Path;

pub const NAME: &str = "category-index";

pub struct CategoryIndex {
    dir: String,
    text_extensions: Vec<String>,
}

impl CategoryIndex {
    pub fn new(dir: &str, text_extensions: &[String]) -> Self {
        Self {
            dir: dir.to_string(),
            text_extensions: text_extensions.iter().map(|e| e.to_lowercase()).collect(),
        }
    }

    fn is_text(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.text_extensions.contains(&e.to_lowercase()))
    }

    fn render(&self, category: &str, entries: &[PageLink]) -> Result<String, serde_yaml::Error> {
        let slug = index_slug(category);
        let description = match entries.len() {
            1 => format!("1 document in {category}"),
            n => format!("{n} documents in {category}"),
        };
        let meta = crate::metadata::generate(
            &PartialMeta::new()
                .title(category)
                .description(&description)
                .href(&format!("/{}/{slug}", self.dir)),
        );
        let body: String = entries
            .iter()
            .map(|link| format!("- [{}]({})\n", link.title, link.href))
            .collect();
        render_document(&meta, &body)
    }
}

/// File stem for a category's index; falls back to the raw name when it
/// has nothing to slug.
fn index_slug(category: &str) -> String {
    let slug = slugify(category);
    if slug.is_empty() {
        category.to_string()
    } else {
        slug
    }
}

impl Modifier for CategoryIndex {
    fn modify(&self, tools: &BuildTools<'_>) -> Result<Vec<GeneratedDocument>, PluginError> {
        let destinations = tools
            .paths
            .iter()
            .map(|(_, dest)| dest)
            .filter(|dest| self.is_text(dest));

        let mut categories: BTreeMap<String, Vec<PageLink>> = BTreeMap::new();
        for dest in destinations {
            let doc = match tools.meta().extract_from_file(dest) {
                Ok(doc) => doc,
                Err(e) => {
                    tools.logger.warn(&format!("{NAME}: not indexed: {e}"));
                    continue;
                }
            };
            if let Some(category) = doc.meta.category {
                let href = doc
                    .meta
                    .href
                    .unwrap_or_else(|| fallback_href(tools.output_root, dest));
                categories.entry(category).or_default().push(PageLink {
                    title: doc.meta.title,
                    href,
                });
            }
        }

        let folder = tools.output_root.join(&self.dir);
        categories
            .iter()
            .map(|(category, entries)| -> Result<GeneratedDocument, PluginError> {
                Ok(GeneratedDocument {
                    write_path: folder.join(format!("{}.md", index_slug(category))),
                    content: self.render(category, entries)?,
                })
            })
            .collect()
    }
}

pub fn descriptor(dir: &str, text_extensions: &[String]) -> PluginDescriptor {
    PluginDescriptor::modifier(NAME, CategoryIndex::new(dir, text_extensions)).with_config(
        serde_json::json!({ "dir": dir, "text_extensions": text_extensions }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::FsIo;
    use crate::metadata::MetaEngine;
    use crate::plugin::Stage;
    use crate::test_helpers::*;
    use std::fs;
    use tempfile::TempDir;

    fn plugin() -> PluginDescriptor {
        descriptor("categories", &["md".to_string()])
    }

    #[test]
    fn one_index_per_category() {
        let tmp = TempDir::new().unwrap();
        write_vault(
            &tmp,
            &[
                (
                    "010-tech/001-intro.md",
                    "---\ntitle: Intro\ndescription: d\ncategory: Tech Notes\nhref: /tech/intro\n---\n",
                ),
                (
                    "010-tech/002-borrow.md",
                    "---\ntitle: Borrowing\ndescription: d\ncategory: Tech Notes\n---\n",
                ),
                (
                    "020-life/001-move.md",
                    "---\ntitle: Moving\ndescription: d\ncategory: life\n---\n",
                ),
                ("020-life/002-loose.md", "---\ntitle: Loose\ndescription: d\n---\n"),
            ],
        );

        let report = build_vault(&tmp, vec![(Stage::ContentGeneration, plugin())]);
        assert!(report.is_clean(), "{:?}", report.jobs);
        assert_eq!(report.stage(Stage::ContentGeneration).unwrap().generated, 2);

        let tech = output_path(&tmp, "categories/tech-notes.md");
        let doc = MetaEngine::new(&FsIo::new()).extract_from_file(&tech).unwrap();
        assert_eq!(doc.meta.title, "Tech Notes");
        assert_eq!(doc.meta.description, "2 documents in Tech Notes");
        assert_eq!(doc.meta.href.as_deref(), Some("/categories/tech-notes"));
        assert_eq!(
            doc.content,
            "- [Intro](/tech/intro)\n- [Borrowing](/tech/borrow)\n"
        );

        let life = fs::read_to_string(output_path(&tmp, "categories/life.md")).unwrap();
        assert!(life.contains("- [Moving](/life/move)\n"));
        assert!(!life.contains("Loose"));
    }

    #[test]
    fn invalid_documents_are_not_indexed() {
        let tmp = TempDir::new().unwrap();
        write_vault(&tmp, &[("a.md", "---\ncategory: misc\n---\n")]);

        let report = build_vault(&tmp, vec![(Stage::ContentGeneration, plugin())]);

        assert!(report.is_clean());
        assert!(!output_path(&tmp, "categories").exists());
    }

    #[test]
    fn index_documents_join_the_generated_tree() {
        let tmp = TempDir::new().unwrap();
        write_vault(
            &tmp,
            &[("a.md", "---\ntitle: A\ndescription: d\ncategory: misc\n---\n")],
        );

        let report = build_vault(&tmp, vec![(Stage::ContentGeneration, plugin())]);

        assert_eq!(report.recent_writes, vec![output_path(&tmp, "categories/misc.md")]);
        // a.md, categories/, categories/misc.md
        assert_eq!(report.generated_tree, 3);
    }
}
