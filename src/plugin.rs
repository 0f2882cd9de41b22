//! Plugins and the stages they run in.
//!
//! A build runs four stages in a fixed order. Each stage accepts one kind
//! of plugin:
//!
//! | Stage | Kind | Runs over |
//! |-------|------|-----------|
//! | `tree-shaping` | [`Walker`] | origin tree, before paths exist |
//! | `tree-walk` | [`Walker`] | origin tree, documents published |
//! | `content-generation` | [`Modifier`] | once, returns new documents |
//! | `generated-tree-walk` | [`Walker`] | tree re-read from the output root |
//!
//! Walkers see one node at a time, in pre-order, with the node's siblings.
//! Returning [`WalkOutcome::Exclude`] from a tree-shaping walker removes the
//! node (and its subtree) from the build; the other walker stages ignore it.
//!
//! ## Registration
//!
//! Plugins are described by a [`PluginDescriptor`] and registered as
//! `Arc<PluginDescriptor>` into a [`PluginRegistry`]. Registering the same
//! `Arc` twice into a stage is a no-op. Registering a modifier into a walker
//! stage (or the reverse) and invalid exclude globs are errors at
//! registration, before any build runs.
//!
//! ```rust,ignore
//! let stamp = PluginDescriptor::walker_fn("stamp", |visit, tools| {
//!     let path = visit.node.effective_path();
//!     tools.meta().update(path, &PartialMeta::new().set("built", true.into()))?;
//!     Ok(WalkOutcome::Continue)
//! })
//! .with_exclude(vec!["drafts/**".into()]);
//! registry.register(Stage::TreeWalk, Arc::new(stamp))?;
//! ```

use crate::io::{Io, IoError};
use crate::logger::Logger;
use crate::metadata::{MetaEngine, MetaError};
use crate::paths::PathStore;
use crate::route::RouteError;
use crate::tree::{FileTree, FileTreeNode, NodeId};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    TreeShaping,
    TreeWalk,
    ContentGeneration,
    GeneratedTreeWalk,
}

impl Stage {
    /// Every stage in execution order.
    pub const ALL: [Stage; 4] = [
        Stage::TreeShaping,
        Stage::TreeWalk,
        Stage::ContentGeneration,
        Stage::GeneratedTreeWalk,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::TreeShaping => "tree-shaping",
            Stage::TreeWalk => "tree-walk",
            Stage::ContentGeneration => "content-generation",
            Stage::GeneratedTreeWalk => "generated-tree-walk",
        }
    }

    /// Whether this stage runs walkers (otherwise modifiers).
    pub fn runs_walkers(self) -> bool {
        self != Stage::ContentGeneration
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A plugin's failure on one node (walkers) or one run (modifiers).
#[derive(Error, Debug)]
pub enum PluginError {
    #[error(transparent)]
    Meta(#[from] MetaError),
    #[error(transparent)]
    Io(#[from] IoError),
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error("Cannot render header: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("{0}")]
    Failed(String),
}

#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("Plugin {plugin:?} is a {kind} and cannot run in the {stage} stage")]
    KindMismatch {
        plugin: String,
        kind: &'static str,
        stage: Stage,
    },
    #[error("Plugin {plugin:?} has an invalid exclude pattern {pattern:?}: {source}")]
    Pattern {
        plugin: String,
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

/// Everything a plugin may use during a run.
#[derive(Clone, Copy)]
pub struct BuildTools<'a> {
    pub io: &'a dyn Io,
    pub logger: &'a dyn Logger,
    pub paths: &'a PathStore,
    pub vault_root: &'a Path,
    pub output_root: &'a Path,
}

impl<'a> BuildTools<'a> {
    /// Metadata engine over this run's IO.
    pub fn meta(&self) -> MetaEngine<'a> {
        MetaEngine::new(self.io)
    }
}

/// One node handed to a [`Walker`].
pub struct Visit<'t> {
    pub node: &'t FileTreeNode,
    pub id: NodeId,
    /// Position of `node` within `siblings`.
    pub index: usize,
    pub siblings: &'t [NodeId],
    pub tree: &'t FileTree,
}

impl<'t> Visit<'t> {
    pub fn sibling_nodes(&self) -> impl Iterator<Item = &'t FileTreeNode> + '_ {
        self.siblings.iter().map(|id| self.tree.get(*id))
    }

    pub fn parent(&self) -> Option<&'t FileTreeNode> {
        self.tree.parent(self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOutcome {
    Continue,
    /// Drop the node from the build (tree-shaping only).
    Exclude,
}

/// A document produced by a [`Modifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedDocument {
    pub write_path: PathBuf,
    pub content: String,
}

pub trait Walker: Send + Sync {
    fn walk(&self, visit: &Visit<'_>, tools: &BuildTools<'_>) -> Result<WalkOutcome, PluginError>;
}

pub trait Modifier: Send + Sync {
    fn modify(&self, tools: &BuildTools<'_>) -> Result<Vec<GeneratedDocument>, PluginError>;
}

struct FnWalker<F>(F);

impl<F> Walker for FnWalker<F>
where
    F: Fn(&Visit<'_>, &BuildTools<'_>) -> Result<WalkOutcome, PluginError> + Send + Sync,
{
    fn walk(&self, visit: &Visit<'_>, tools: &BuildTools<'_>) -> Result<WalkOutcome, PluginError> {
        (self.0)(visit, tools)
    }
}

struct FnModifier<F>(F);

impl<F> Modifier for FnModifier<F>
where
    F: Fn(&BuildTools<'_>) -> Result<Vec<GeneratedDocument>, PluginError> + Send + Sync,
{
    fn modify(&self, tools: &BuildTools<'_>) -> Result<Vec<GeneratedDocument>, PluginError> {
        (self.0)(tools)
    }
}

pub enum PluginKind {
    Walker(Box<dyn Walker>),
    Modifier(Box<dyn Modifier>),
}

impl PluginKind {
    pub fn label(&self) -> &'static str {
        match self {
            PluginKind::Walker(_) => "walker",
            PluginKind::Modifier(_) => "modifier",
        }
    }
}

impl fmt::Debug for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A named plugin plus the options the builder applies around it.
#[derive(Debug)]
pub struct PluginDescriptor {
    pub name: String,
    /// Globs matched against node file names and ids; matching nodes are
    /// not visited.
    pub exclude_patterns: Vec<String>,
    /// Walkers skip folder nodes unless this is cleared.
    pub skip_folder_nodes: bool,
    /// Always run, even when the cache says nothing changed.
    pub disable_cache: bool,
    /// Options that feed the cache fingerprint.
    pub config: serde_json::Value,
    pub kind: PluginKind,
}

impl PluginDescriptor {
    pub fn new(name: &str, kind: PluginKind) -> Self {
        Self {
            name: name.to_string(),
            exclude_patterns: Vec::new(),
            skip_folder_nodes: true,
            disable_cache: false,
            config: serde_json::Value::Null,
            kind,
        }
    }

    pub fn walker(name: &str, walker: impl Walker + 'static) -> Self {
        Self::new(name, PluginKind::Walker(Box::new(walker)))
    }

    pub fn walker_fn<F>(name: &str, f: F) -> Self
    where
        F: Fn(&Visit<'_>, &BuildTools<'_>) -> Result<WalkOutcome, PluginError>
            + Send
            + Sync
            + 'static,
    {
        Self::walker(name, FnWalker(f))
    }

    pub fn modifier(name: &str, modifier: impl Modifier + 'static) -> Self {
        Self::new(name, PluginKind::Modifier(Box::new(modifier)))
    }

    pub fn modifier_fn<F>(name: &str, f: F) -> Self
    where
        F: Fn(&BuildTools<'_>) -> Result<Vec<GeneratedDocument>, PluginError>
            + Send
            + Sync
            + 'static,
    {
        Self::modifier(name, FnModifier(f))
    }

    pub fn with_exclude(mut self, patterns: Vec<String>) -> Self {
        self.exclude_patterns = patterns;
        self
    }

    pub fn include_folders(mut self) -> Self {
        self.skip_folder_nodes = false;
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.disable_cache = true;
        self
    }

    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }
}

/// A descriptor accepted into a stage, exclude globs compiled.
#[derive(Debug, Clone)]
pub struct RegisteredPlugin {
    pub descriptor: Arc<PluginDescriptor>,
    exclude: Vec<glob::Pattern>,
}

impl RegisteredPlugin {
    /// Whether an exclude glob matches the node's file name or its id.
    pub fn excludes(&self, node: &FileTreeNode) -> bool {
        self.exclude
            .iter()
            .any(|p| p.matches(&node.file_name) || p.matches(&node.id))
    }
}

/// Plugins per stage, in registration order.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    stages: BTreeMap<Stage, Vec<RegisteredPlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `descriptor` to `stage`. Returns `false` if that exact descriptor
    /// is already registered there.
    pub fn register(
        &mut self,
        stage: Stage,
        descriptor: Arc<PluginDescriptor>,
    ) -> Result<bool, RegistrationError> {
        let fits = match descriptor.kind {
            PluginKind::Walker(_) => stage.runs_walkers(),
            PluginKind::Modifier(_) => !stage.runs_walkers(),
        };
        if !fits {
            return Err(RegistrationError::KindMismatch {
                plugin: descriptor.name.clone(),
                kind: descriptor.kind.label(),
                stage,
            });
        }

        let exclude = descriptor
            .exclude_patterns
            .iter()
            .map(|p| {
                glob::Pattern::new(p).map_err(|source| RegistrationError::Pattern {
                    plugin: descriptor.name.clone(),
                    pattern: p.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let plugins = self.stages.entry(stage).or_default();
        if plugins
            .iter()
            .any(|p| Arc::ptr_eq(&p.descriptor, &descriptor))
        {
            return Ok(false);
        }
        plugins.push(RegisteredPlugin {
            descriptor,
            exclude,
        });
        Ok(true)
    }

    pub fn plugins(&self, stage: Stage) -> &[RegisteredPlugin] {
        self.stages.get(&stage).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.stages.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
