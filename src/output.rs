//! CLI output formatting for builds, checks and route shapes.
//!
//! # Output Format
//!
//! ## Check
//!
//! ```text
//! Vault
//! 001 010-tech/
//!     001 001-intro.md
//!     002 diagram.png (media)
//! 002 about.md
//!
//! Headers
//!     010-tech/003-scratch.md: title: is required
//!
//! 3 documents, 1 media file, 1 invalid header
//! ```
//!
//! ## Build
//!
//! ```text
//! Stages
//!     tree-shaping: 1 run (1 excluded)
//!     tree-walk: 2 run
//!     content-generation: 1 run (2 generated)
//!     generated-tree-walk: 1 run, 1 skipped, 1 failed
//!
//! Failures
//!     generated-tree-walk:series: 1 of 6 nodes failed: tech/a.md: ...
//!
//! Published 6 files, generated tree 11 nodes
//! Cache: 1 copied, 5 unchanged; plugins: 4 run, 1 skipped
//! ```
//!
//! ## Route
//!
//! ```text
//! /[category]/[...post]
//!     001 [category]
//!     002 [...post] (spread)
//! Params: category, post
//! ```
//!
//! # Architecture
//!
//! Each report has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::build::{BuildReport, CheckReport};
use crate::route::{RouteBinding, RouteSegmentSpec, RouteShape};
use crate::tree::{FileTree, NodeCategory, NodeId};

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `1 document`, `2 documents`.
fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

fn tree_lines(tree: &FileTree, nodes: &[NodeId], depth: usize, lines: &mut Vec<String>) {
    for (i, id) in nodes.iter().enumerate() {
        let node = tree.get(*id);
        let label = match node.category() {
            NodeCategory::Folder => format!("{}/", node.file_name),
            NodeCategory::TextDocument => node.file_name.clone(),
            NodeCategory::MediaFile => format!("{} (media)", node.file_name),
            NodeCategory::Unknown => format!("{} (ignored)", node.file_name),
        };
        lines.push(format!("{}{} {}", indent(depth), format_index(i + 1), label));
        tree_lines(tree, &node.children, depth + 1, lines);
    }
}

// ============================================================================
// Check
// ============================================================================

pub fn format_check_report(report: &CheckReport) -> Vec<String> {
    let mut lines = vec!["Vault".to_string()];
    tree_lines(&report.tree, report.tree.roots(), 0, &mut lines);

    if !report.scan_failures.is_empty() {
        lines.push(String::new());
        lines.push("Unreadable".to_string());
        for failure in &report.scan_failures {
            lines.push(format!("{}{failure}", indent(1)));
        }
    }

    if !report.invalid.is_empty() {
        lines.push(String::new());
        lines.push("Headers".to_string());
        for doc in &report.invalid {
            lines.push(format!("{}{}: {}", indent(1), doc.id, doc.reason));
        }
    }

    lines.push(String::new());
    lines.push(format!(
        "{}, {}, {}",
        plural(report.documents, "document"),
        plural(report.media, "media file"),
        plural(report.invalid.len(), "invalid header")
    ));
    lines
}

pub fn print_check_report(report: &CheckReport) {
    for line in format_check_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Build
// ============================================================================

pub fn format_build_report(report: &BuildReport) -> Vec<String> {
    let mut lines = vec!["Stages".to_string()];
    for summary in &report.stages {
        let mut counts = vec![format!("{} run", summary.plugins_run)];
        if summary.plugins_skipped > 0 {
            counts.push(format!("{} skipped", summary.plugins_skipped));
        }
        if summary.plugins_failed > 0 {
            counts.push(format!("{} failed", summary.plugins_failed));
        }
        let mut line = format!("{}{}: {}", indent(1), summary.stage, counts.join(", "));
        if summary.excluded > 0 {
            line.push_str(&format!(" ({} excluded)", summary.excluded));
        }
        if summary.generated > 0 {
            line.push_str(&format!(" ({} generated)", summary.generated));
        }
        lines.push(line);
    }

    let failed_jobs: Vec<String> = report
        .failed_jobs()
        .map(|job| {
            format!(
                "{}{}: {}",
                indent(1),
                job.label,
                job.failure_reason.as_deref().unwrap_or_default()
            )
        })
        .collect();
    if !report.failures.is_empty() || !failed_jobs.is_empty() {
        lines.push(String::new());
        lines.push("Failures".to_string());
        lines.extend(report.failures.iter().map(|f| format!("{}{f}", indent(1))));
        lines.extend(failed_jobs);
    }

    lines.push(String::new());
    lines.push(format!(
        "Published {}, generated tree {}",
        plural(report.published, "file"),
        plural(report.generated_tree, "node")
    ));
    lines.push(format!("Cache: {}", report.cache));
    lines
}

pub fn print_build_report(report: &BuildReport) {
    for line in format_build_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Route
// ============================================================================

pub fn format_route_shape(
    source: &str,
    shape: &RouteShape,
    binding: Option<&RouteBinding>,
) -> Vec<String> {
    let mut lines = vec![source.to_string()];
    for (i, segment) in shape.segments.iter().enumerate() {
        let label = match segment {
            RouteSegmentSpec::Static { divider_name } => format!("{divider_name} (static)"),
            RouteSegmentSpec::Dynamic {
                param_name,
                multiple: true,
            } => format!("[...{param_name}] (spread)"),
            RouteSegmentSpec::Dynamic { param_name, .. } => format!("[{param_name}]"),
        };
        lines.push(format!("{}{} {}", indent(1), format_index(i + 1), label));
    }
    lines.push(format!("Params: {}", shape.dynamic_params.join(", ")));

    if let Some(binding) = binding {
        lines.push(format!("Href: {}", binding.href));
        for (name, value) in &binding.params {
            lines.push(format!("{}{name} = {value}", indent(1)));
        }
    }
    lines
}

pub fn print_route_shape(source: &str, shape: &RouteShape, binding: Option<&RouteBinding>) {
    for line in format_route_shape(source, shape, binding) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{InvalidDocument, StageSummary};
    use crate::cache::CacheStats;
    use crate::plugin::Stage;
    use crate::route::RouteAnalyzer;
    use crate::tree::FileTreeNode;
    use std::path::PathBuf;

    fn node(id: &str, category: NodeCategory, depth: usize) -> FileTreeNode {
        let name = id.rsplit('/').next().unwrap().to_string();
        FileTreeNode::new(id.into(), name, PathBuf::from("/v").join(id), category, depth)
    }

    fn sample_tree() -> FileTree {
        let mut tree = FileTree::new(PathBuf::from("/v"));
        let tech = tree.insert(node("010-tech", NodeCategory::Folder, 0), None);
        tree.insert(node("010-tech/001-intro.md", NodeCategory::TextDocument, 1), Some(tech));
        tree.insert(node("010-tech/diagram.png", NodeCategory::MediaFile, 1), Some(tech));
        tree.insert(node("about.md", NodeCategory::TextDocument, 0), None);
        tree
    }

    fn empty_report() -> BuildReport {
        BuildReport {
            vault_root: "/v".into(),
            output_root: "/o".into(),
            scanned: 0,
            published: 0,
            generated_tree: 0,
            stages: Vec::new(),
            failures: Vec::new(),
            jobs: Vec::new(),
            recent_writes: Vec::new(),
            cache: CacheStats::default(),
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(1234), "1234");
    }

    #[test]
    fn plural_forms() {
        assert_eq!(plural(1, "file"), "1 file");
        assert_eq!(plural(0, "file"), "0 files");
    }

    // =========================================================================
    // Check
    // =========================================================================

    #[test]
    fn check_lists_tree_and_invalid_headers() {
        let report = CheckReport {
            vault_root: "/v".into(),
            tree: sample_tree(),
            scan_failures: Vec::new(),
            documents: 2,
            media: 1,
            invalid: vec![InvalidDocument {
                id: "about.md".into(),
                reason: "title: is required".into(),
            }],
        };

        assert_eq!(
            format_check_report(&report),
            vec![
                "Vault",
                "001 010-tech/",
                "    001 001-intro.md",
                "    002 diagram.png (media)",
                "002 about.md",
                "",
                "Headers",
                "    about.md: title: is required",
                "",
                "2 documents, 1 media file, 1 invalid header",
            ]
        );
    }

    // =========================================================================
    // Build
    // =========================================================================

    #[test]
    fn build_report_shows_stage_counts() {
        let mut report = empty_report();
        report.published = 3;
        report.generated_tree = 5;
        report.stages = vec![StageSummary {
            stage: Stage::TreeShaping,
            plugins_run: 1,
            plugins_skipped: 0,
            plugins_failed: 0,
            excluded: 2,
            generated: 0,
        }];

        let lines = format_build_report(&report);
        assert_eq!(lines[0], "Stages");
        assert_eq!(lines[1], "    tree-shaping: 1 run (2 excluded)");
        assert!(lines.contains(&"Published 3 files, generated tree 5 nodes".to_string()));
        assert!(!lines.contains(&"Failures".to_string()));
    }

    #[test]
    fn build_report_lists_failures() {
        let mut report = empty_report();
        report.failures = vec!["Cannot read /v/x: denied".into()];

        let lines = format_build_report(&report);
        let at = lines.iter().position(|l| l == "Failures").unwrap();
        assert_eq!(lines[at + 1], "    Cannot read /v/x: denied");
    }

    // =========================================================================
    // Route
    // =========================================================================

    #[test]
    fn route_shape_lists_segments_and_binding() {
        let shape = RouteAnalyzer::new("[", "]")
            .unwrap()
            .analyze_param("/blog/[...post]")
            .unwrap();
        let binding = shape.bind(&["blog", "rust", "intro"]).unwrap();

        assert_eq!(
            format_route_shape("/blog/[...post]", &shape, Some(&binding)),
            vec![
                "/blog/[...post]",
                "    001 blog (static)",
                "    002 [...post] (spread)",
                "Params: post",
                "Href: /blog/rust/intro",
                "    post = blog/rust/intro",
            ]
        );
    }
}
