//! Numbers the documents of a series.
//!
//! A series is the set of sibling documents whose headers share a `series`
//! name. Members are ordered by `seriesOrder` (members without one go last)
//! and then by listing order. Every member gets a `seriesInfo` with its
//! 1-based position, the member count and links to every member.

use super::fallback_href;
use crate::metadata::{PageLink, PartialMeta, SeriesInfo};
use crate::plugin::{BuildTools, PluginDescriptor, PluginError, Visit, WalkOutcome, Walker};
use crate::tree::NodeId;

pub const NAME: &str = "series";

struct Member {
    order: Option<u32>,
    listing: usize,
    id: NodeId,
    link: PageLink,
}

pub struct Series;

impl Series {
    fn members(&self, visit: &Visit<'_>, tools: &BuildTools<'_>, name: &str) -> Vec<Member> {
        let mut members: Vec<Member> = visit
            .siblings
            .iter()
            .enumerate()
            .filter_map(|(listing, id)| {
                let node = visit.tree.get(*id);
                if !node.is_text_document() {
                    return None;
                }
                let path = node.effective_path();
                let doc = tools.meta().extract_from_file(path).ok()?;
                if doc.meta.series.as_deref() != Some(name) {
                    return None;
                }
                Some(Member {
                    order: doc.meta.series_order,
                    listing,
                    id: *id,
                    link: PageLink {
                        title: doc.meta.title,
                        href: doc
                            .meta
                            .href
                            .unwrap_or_else(|| fallback_href(tools.output_root, path)),
                    },
                })
            })
            .collect();
        members.sort_by_key(|m| (m.order.is_none(), m.order, m.listing));
        members
    }
}

impl Walker for Series {
    fn walk(&self, visit: &Visit<'_>, tools: &BuildTools<'_>) -> Result<WalkOutcome, PluginError> {
        if !visit.node.is_text_document() {
            return Ok(WalkOutcome::Continue);
        }
        let path = visit.node.effective_path();
        let Ok(doc) = tools.meta().extract_from_file(path) else {
            return Ok(WalkOutcome::Continue);
        };
        let Some(name) = doc.meta.series else {
            return Ok(WalkOutcome::Continue);
        };

        let members = self.members(visit, tools, &name);
        let Some(index) = members.iter().position(|m| m.id == visit.id) else {
            return Ok(WalkOutcome::Continue);
        };
        let info = SeriesInfo {
            name,
            position: index as u32 + 1,
            total: members.len() as u32,
            entries: members.into_iter().map(|m| m.link).collect(),
        };

        tools
            .meta()
            .update(path, &PartialMeta::new().series_info(&info))?;
        Ok(WalkOutcome::Continue)
    }
}

pub fn descriptor() -> PluginDescriptor {
    PluginDescriptor::walker(NAME, Series)
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

    fn member(title: &str, series: &str, order: Option<u32>) -> String {
        let order = order
            .map(|o| format!("seriesOrder: {o}\n"))
            .unwrap_or_default();
        format!("---\ntitle: {title}\ndescription: d\nseries: {series}\n{order}---\nBody\n")
    }

    fn info_of(tmp: &TempDir, rel: &str) -> Option<SeriesInfo> {
        MetaEngine::new(&FsIo::new())
            .extract_from_file(&output_path(tmp, rel))
            .unwrap()
            .meta
            .series_info
    }

    fn titles(info: &SeriesInfo) -> Vec<&str> {
        info.entries.iter().map(|e| e.title.as_str()).collect()
    }

    #[test]
    fn orders_by_series_order_then_listing() {
        let tmp = TempDir::new().unwrap();
        write_vault(
            &tmp,
            &[
                ("rust/a.md", &member("Unordered", "rust", None)),
                ("rust/b.md", &member("Second", "rust", Some(2))),
                ("rust/c.md", &member("First", "rust", Some(1))),
                ("rust/d.md", &member("Other", "go", None)),
                ("rust/e.md", "---\ntitle: Loose\ndescription: d\n---\n"),
            ],
        );

        let report = build_vault(&tmp, vec![(Stage::GeneratedTreeWalk, descriptor())]);
        assert!(report.is_clean(), "{:?}", report.jobs);

        let first = info_of(&tmp, "rust/c.md").unwrap();
        assert_eq!(first.name, "rust");
        assert_eq!(first.position, 1);
        assert_eq!(first.total, 3);
        assert_eq!(titles(&first), vec!["First", "Second", "Unordered"]);
        assert_eq!(first.entries[0].href, "/rust/c");

        assert_eq!(info_of(&tmp, "rust/b.md").unwrap().position, 2);
        assert_eq!(info_of(&tmp, "rust/a.md").unwrap().position, 3);

        let go = info_of(&tmp, "rust/d.md").unwrap();
        assert_eq!((go.position, go.total), (1, 1));
        assert_eq!(info_of(&tmp, "rust/e.md"), None);
    }

    #[test]
    fn series_do_not_span_folders() {
        let tmp = TempDir::new().unwrap();
        write_vault(
            &tmp,
            &[
                ("one/a.md", &member("A", "s", Some(1))),
                ("two/b.md", &member("B", "s", Some(2))),
            ],
        );

        build_vault(&tmp, vec![(Stage::GeneratedTreeWalk, descriptor())]);

        assert_eq!(info_of(&tmp, "two/b.md").unwrap().total, 1);
    }

    #[test]
    fn rerun_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        write_vault(
            &tmp,
            &[
                ("a.md", &member("A", "s", Some(1))),
                ("b.md", &member("B", "s", Some(2))),
            ],
        );

        build_vault(&tmp, vec![(Stage::GeneratedTreeWalk, descriptor())]);
        let first = fs::read_to_string(output_path(&tmp, "b.md")).unwrap();
        build_vault(&tmp, vec![(Stage::GeneratedTreeWalk, descriptor())]);

        assert_eq!(fs::read_to_string(output_path(&tmp, "b.md")).unwrap(), first);
    }
}
