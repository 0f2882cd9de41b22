//! Origin → destination bookkeeping for published files.
//!
//! The builder asks a [`PathGenerator`] where each document and media file
//! goes, then records the answer in a [`PathStore`]. Plugins read the store
//! (for example to turn a link to a vault file into its published location);
//! only the builder writes to it, between plugin runs.
//!
//! ```text
//! vault/010-tech/001-Intro to Rust.md  →  dist/tech/intro-to-rust.md
//! vault/010-tech/diagram.PNG           →  dist/tech/diagram.png
//! dist/categories/tech.md              →  dist/categories/tech.md   (generated)
//! ```

use crate::naming::publish_component;
use crate::plugin::BuildTools;
use crate::tree::FileTreeNode;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

/// Computes the destination of one node.
pub type PathGenerator = Box<dyn Fn(&FileTreeNode, &BuildTools<'_>) -> PathBuf + Send + Sync>;

/// Origin path → destination path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathStore {
    map: BTreeMap<PathBuf, PathBuf>,
}

impl PathStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, origin: PathBuf, destination: PathBuf) {
        self.map.insert(origin, destination);
    }

    /// Record a generated document, which is its own origin.
    pub fn insert_generated(&mut self, path: PathBuf) {
        self.map.insert(path.clone(), path);
    }

    pub fn destination(&self, origin: &Path) -> Option<&Path> {
        self.map.get(origin).map(PathBuf::as_path)
    }

    pub fn origin_of(&self, destination: &Path) -> Option<&Path> {
        self.map
            .iter()
            .find(|(_, d)| d.as_path() == destination)
            .map(|(o, _)| o.as_path())
    }

    pub fn is_taken(&self, destination: &Path) -> bool {
        self.origin_of(destination).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &Path)> {
        self.map.iter().map(|(o, d)| (o.as_path(), d.as_path()))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Output root plus the vault-relative path, every component run through
/// [`publish_component`]: `010-tech/001-Intro.md` → `tech/intro.md`.
pub fn default_path_generator(node: &FileTreeNode, tools: &BuildTools<'_>) -> PathBuf {
    let relative = node
        .absolute_path
        .strip_prefix(tools.vault_root)
        .unwrap_or(Path::new(&node.file_name));
    let names: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    let last = names.len().saturating_sub(1);
    names
        .iter()
        .enumerate()
        .fold(tools.output_root.to_path_buf(), |dest, (i, name)| {
            dest.join(publish_component(name, i < last || node.is_folder()))
        })
}

/// Absolute form of `path` with `.` and `..` resolved lexically, so
/// `out/../escape.md` and `/blog/out` compare the way they would on disk.
/// Symlinks are left alone.
pub fn normalize_path(path: &Path) -> PathBuf {
    let absolute = if path.is_relative() {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    } else {
        path.to_path_buf()
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => normalized.push(component),
            },
            other => normalized.push(other),
        }
    }
    normalized
}

/// `path` relative to `root` with `/` separators, or `None` outside `root`.
pub fn relative_slash_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::FsIo;
    use crate::logger::BufferedLogger;
    use crate::tree::NodeCategory;

    fn doc(path: &str, category: NodeCategory) -> FileTreeNode {
        let absolute = PathBuf::from("/vault").join(path);
        let name = absolute.file_name().unwrap().to_string_lossy().into_owned();
        FileTreeNode::new(path.to_string(), name, absolute, category, 0)
    }

    fn with_tools<R>(f: impl FnOnce(&BuildTools<'_>) -> R) -> R {
        let io = FsIo::new();
        let logger = BufferedLogger::default();
        let paths = PathStore::new();
        let tools = BuildTools {
            io: &io,
            logger: &logger,
            paths: &paths,
            vault_root: Path::new("/vault"),
            output_root: Path::new("/out"),
        };
        f(&tools)
    }

    #[test]
    fn default_generator_strips_prefixes_and_slugs_folders() {
        let node = doc("010-Tech Notes/001-Intro to Rust.md", NodeCategory::TextDocument);
        let dest = with_tools(|tools| default_path_generator(&node, tools));
        assert_eq!(dest, PathBuf::from("/out/tech-notes/intro-to-rust.md"));
    }

    #[test]
    fn default_generator_keeps_media_extension_lowercased() {
        let node = doc("010-tech/Diagram.PNG", NodeCategory::MediaFile);
        let dest = with_tools(|tools| default_path_generator(&node, tools));
        assert_eq!(dest, PathBuf::from("/out/tech/diagram.png"));
    }

    #[test]
    fn store_lookups_both_ways() {
        let mut store = PathStore::new();
        store.insert("/vault/a.md".into(), "/out/a.md".into());
        store.insert_generated("/out/categories/tech.md".into());

        assert_eq!(
            store.destination(Path::new("/vault/a.md")),
            Some(Path::new("/out/a.md"))
        );
        assert_eq!(
            store.origin_of(Path::new("/out/a.md")),
            Some(Path::new("/vault/a.md"))
        );
        assert!(store.is_taken(Path::new("/out/categories/tech.md")));
        assert!(!store.is_taken(Path::new("/out/b.md")));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn relative_slash_path_inside_and_outside() {
        assert_eq!(
            relative_slash_path(Path::new("/out"), Path::new("/out/tech/a.md")),
            Some("tech/a.md".to_string())
        );
        assert_eq!(relative_slash_path(Path::new("/out"), Path::new("/vault/a.md")), None);
    }

    #[test]
    fn normalize_path_resolves_dots() {
        assert_eq!(
            normalize_path(Path::new("/blog/./dist/../escape.md")),
            PathBuf::from("/blog/escape.md")
        );
        assert_eq!(normalize_path(Path::new("/../a")), PathBuf::from("/a"));
        assert!(!normalize_path(Path::new("/out/../escape.md")).starts_with("/out"));
    }

    #[test]
    fn normalize_path_anchors_relative_paths() {
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(normalize_path(Path::new("dist")), cwd.join("dist"));
        assert_eq!(normalize_path(Path::new(".")), cwd);
    }
}
