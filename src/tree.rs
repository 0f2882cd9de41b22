//! The file tree model shared by every pipeline stage.
//!
//! Nodes live in a flat arena ([`FileTree::nodes`]) and refer to each other by
//! [`NodeId`]. A node's `children` list owns nothing; it is an ordered list of
//! ids. The `parent` field is a lookup back into the same arena. With no
//! pointers between nodes there is no ownership cycle, and pruning a subtree
//! only detaches ids.
//!
//! ```text
//! roots: [0, 3]
//! 0  posts/            children [1, 2]   parent None
//! 1  posts/a.md                          parent Some(0)
//! 2  posts/b.md                          parent Some(0)
//! 3  about.md                            parent None
//! ```
//!
//! Trees are rebuilt from scratch on every build; ids are only meaningful
//! within the tree that issued them.

use serde::Serialize;
use std::path::PathBuf;

/// Index of a node within its [`FileTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeCategory {
    Folder,
    TextDocument,
    MediaFile,
    Unknown,
}

/// Where a node comes from and where the build puts it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildInfo {
    pub origin_path: PathBuf,
    pub destination_path: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileTreeNode {
    /// Root-relative path with `/` separators.
    pub id: String,
    pub file_name: String,
    pub absolute_path: PathBuf,
    category: NodeCategory,
    /// Distance from the tree root; the root's direct children are depth 0.
    pub depth: usize,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
    pub build_info: Option<BuildInfo>,
}

impl FileTreeNode {
    pub fn new(
        id: String,
        file_name: String,
        absolute_path: PathBuf,
        category: NodeCategory,
        depth: usize,
    ) -> Self {
        Self {
            id,
            file_name,
            absolute_path,
            category,
            depth,
            children: Vec::new(),
            parent: None,
            build_info: None,
        }
    }

    pub fn category(&self) -> NodeCategory {
        self.category
    }

    pub fn is_folder(&self) -> bool {
        self.category == NodeCategory::Folder
    }

    pub fn is_text_document(&self) -> bool {
        self.category == NodeCategory::TextDocument
    }

    /// Destination if path assignment ran, otherwise the node's own path.
    pub fn effective_path(&self) -> &std::path::Path {
        self.build_info
            .as_ref()
            .map(|b| b.destination_path.as_path())
            .unwrap_or(&self.absolute_path)
    }
}

/// Arena of [`FileTreeNode`]s plus the ordered top-level ids.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FileTree {
    pub root: PathBuf,
    nodes: Vec<FileTreeNode>,
    roots: Vec<NodeId>,
}

impl FileTree {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            nodes: Vec::new(),
            roots: Vec::new(),
        }
    }

    /// Insert `node` under `parent` (or at the top level) after any existing
    /// siblings.
    pub fn insert(&mut self, mut node: FileTreeNode, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        node.parent = parent;
        self.nodes.push(node);
        match parent {
            Some(p) => self.nodes[p.0].children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    pub fn get(&self, id: NodeId) -> &FileTreeNode {
        &self.nodes[id.0]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut FileTreeNode {
        &mut self.nodes[id.0]
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn parent(&self, id: NodeId) -> Option<&FileTreeNode> {
        self.get(id).parent.map(|p| self.get(p))
    }

    /// Siblings of `id` (including itself) in listing order.
    pub fn siblings(&self, id: NodeId) -> &[NodeId] {
        match self.get(id).parent {
            Some(p) => &self.get(p).children,
            None => &self.roots,
        }
    }

    /// Look up a node by its path-derived id.
    pub fn find(&self, id: &str) -> Option<NodeId> {
        self.iter().find(|n| self.get(*n).id == id)
    }

    /// All attached node ids in pre-order.
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            stack.extend(self.get(next).children.iter().rev().copied());
            Some(next)
        })
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Detach `id` and its subtree. Detached nodes stay in the arena but are
    /// no longer reachable from the roots.
    pub fn detach(&mut self, id: NodeId) {
        match self.get(id).parent {
            Some(p) => self.nodes[p.0].children.retain(|c| *c != id),
            None => self.roots.retain(|c| *c != id),
        }
    }

    /// Visit `nodes` and their descendants in pre-order.
    ///
    /// The visitor finishes with a node before its children are visited and
    /// receives the node's index within `siblings`. Folders are descended
    /// into either way; `include_folders` only controls whether the visitor
    /// sees them. The first visitor error stops the walk.
    pub fn walk<E>(
        &self,
        nodes: &[NodeId],
        include_folders: bool,
        visitor: &mut impl FnMut(&FileTreeNode, usize, &[NodeId]) -> Result<(), E>,
    ) -> Result<(), E> {
        for (index, id) in nodes.iter().enumerate() {
            let node = self.get(*id);
            if include_folders || !node.is_folder() {
                visitor(node, index, nodes)?;
            }
            if !node.children.is_empty() {
                self.walk(&node.children, include_folders, visitor)?;
            }
        }
        Ok(())
    }

    /// [`walk`](Self::walk) over the whole tree.
    pub fn walk_all<E>(
        &self,
        include_folders: bool,
        visitor: &mut impl FnMut(&FileTreeNode, usize, &[NodeId]) -> Result<(), E>,
    ) -> Result<(), E> {
        self.walk(&self.roots, include_folders, visitor)
    }

    /// Id of a node reference obtained from this tree.
    pub fn id_of(&self, node: &FileTreeNode) -> Option<NodeId> {
        self.iter().find(|id| std::ptr::eq(self.get(*id), node))
    }
}
