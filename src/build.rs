//! The build pipeline: vault in, published tree out.
//!
//! ```text
//! 1. Scan           vault_root → FileTree
//! 2. tree-shaping   walkers may exclude nodes
//! 3. Assign paths   PathGenerator per document / media file → PathStore
//! 4. Publish        copy origin → destination (skipped when unchanged)
//! 5. tree-walk      walkers over the origin tree, documents at destination
//! 6. content-gen    modifiers return documents; the builder writes them
//! 7. Re-scan        output_root → generated FileTree
//! 8. gen-tree-walk  walkers over the generated tree
//! 9. Save cache     fingerprints for the next build
//! ```
//!
//! ## Failure isolation
//!
//! A walker failing on one node is logged; the walk continues with the next
//! node and the next plugin. The plugin's job record ends up `failed` with
//! a summary of which nodes failed. Only configuration problems and an
//! unreadable vault root abort a build, and both surface before anything
//! is written.
//!
//! ## Caching
//!
//! See [`crate::cache`]. Tree-shaping walkers always run: they decide what
//! gets published, so they run before there is a published tree to
//! fingerprint.
//!
//! A build either replays the last one or republishes. It replays when
//! every document copy is current and every later plugin would be skipped;
//! the output tree is then left exactly as the last build wrote it.
//! Otherwise every document is copied afresh from the vault and every
//! plugin reruns on top of it.

use crate::cache::{
    CacheManifest, CacheStats, PluginInputs, PublishedFile, chain_fingerprint, hash_file,
    plugin_fingerprint, plugin_key, tree_fingerprint,
};
use crate::config::{BuildConfig, ConfigError};
use crate::io::{Io, IoError};
use crate::jobs::{JobRecord, JobStatus, JobTracker, Queue};
use crate::logger::Logger;
use crate::metadata::MetaEngine;
use crate::paths::{
    PathGenerator, PathStore, default_path_generator, normalize_path, relative_slash_path,
};
use crate::plugin::{
    BuildTools, Modifier, PluginDescriptor, PluginKind, PluginRegistry, RegisteredPlugin,
    RegistrationError, Stage, Visit, WalkOutcome, Walker,
};
use crate::plugins::standard_plugins;
use crate::scan::{self, ParseOutcome, ScanError, ScanOptions};
use crate::tree::{BuildInfo, FileTree, FileTreeNode, NodeCategory, NodeId};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Response recorded for a plugin the cache let us skip.
pub const SKIPPED_RESPONSE: &str = "skipped (fingerprint unchanged)";

const RECENT_WRITES: usize = 32;
const DEFAULT_HISTORY: usize = 64;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error("Vault root {} lies inside output root {}", .vault.display(), .output.display())]
    Overlap { vault: PathBuf, output: PathBuf },
}

/// Per-stage counters.
#[derive(Debug, Clone, Serialize)]
pub struct StageSummary {
    pub stage: Stage,
    pub plugins_run: usize,
    pub plugins_skipped: usize,
    pub plugins_failed: usize,
    /// Nodes removed by tree-shaping walkers.
    pub excluded: usize,
    /// Documents written by content-generation modifiers.
    pub generated: usize,
}

impl StageSummary {
    fn new(stage: Stage) -> Self {
        Self {
            stage,
            plugins_run: 0,
            plugins_skipped: 0,
            plugins_failed: 0,
            excluded: 0,
            generated: 0,
        }
    }
}

/// What a build did.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub vault_root: PathBuf,
    pub output_root: PathBuf,
    /// Nodes found by the scan.
    pub scanned: usize,
    /// Documents and media files published.
    pub published: usize,
    /// Nodes in the tree re-read from the output root.
    pub generated_tree: usize,
    pub stages: Vec<StageSummary>,
    /// Scan, path and publish failures.
    pub failures: Vec<String>,
    pub jobs: Vec<JobRecord>,
    /// Most recent documents written by modifiers, oldest first.
    pub recent_writes: Vec<PathBuf>,
    pub cache: CacheStats,
}

impl BuildReport {
    pub fn failed_jobs(&self) -> impl Iterator<Item = &JobRecord> {
        self.jobs.iter().filter(|j| j.status == JobStatus::Failed)
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageSummary> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.stages.iter().all(|s| s.plugins_failed == 0)
    }
}

/// Runs registered plugins over a vault.
pub struct Builder {
    io: Arc<dyn Io>,
    logger: Arc<dyn Logger>,
    vault_root: PathBuf,
    output_root: PathBuf,
    scan_options: ScanOptions,
    path_generator: PathGenerator,
    registry: PluginRegistry,
    jobs: JobTracker,
    use_cache: bool,
}

impl Builder {
    pub fn new(
        vault_root: impl Into<PathBuf>,
        output_root: impl Into<PathBuf>,
        io: Arc<dyn Io>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            io,
            logger,
            vault_root: normalize_path(&vault_root.into()),
            output_root: normalize_path(&output_root.into()),
            scan_options: ScanOptions::default(),
            path_generator: Box::new(default_path_generator),
            registry: PluginRegistry::new(),
            jobs: JobTracker::new(DEFAULT_HISTORY),
            use_cache: true,
        }
    }

    /// A builder with the roots, scan rules, history, cache setting and
    /// built-in plugins described by `config`. Relative roots resolve
    /// against `base`.
    pub fn from_config(
        config: &BuildConfig,
        base: &Path,
        io: Arc<dyn Io>,
        logger: Arc<dyn Logger>,
    ) -> Result<Self, BuildError> {
        config.validate()?;
        let (vault_root, output_root) = config.resolve_roots(base);
        let scan_options = scan_options(config)?;

        let mut builder = Builder::new(vault_root, output_root, io, logger)
            .with_scan_options(scan_options)
            .with_history(config.history.capacity)
            .with_cache(config.cache.enabled);
        for (stage, plugin) in standard_plugins(config)? {
            builder.register(stage, plugin)?;
        }
        Ok(builder)
    }

    pub fn with_scan_options(mut self, options: ScanOptions) -> Self {
        self.scan_options = options;
        self
    }

    pub fn with_path_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn(&FileTreeNode, &BuildTools<'_>) -> PathBuf + Send + Sync + 'static,
    {
        self.path_generator = Box::new(generator);
        self
    }

    pub fn with_history(mut self, capacity: usize) -> Self {
        self.jobs = JobTracker::new(capacity);
        self
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.use_cache = enabled;
        self
    }

    pub fn set_cache(&mut self, enabled: bool) {
        self.use_cache = enabled;
    }

    /// Add a plugin to `stage`. Registering the same descriptor twice into
    /// one stage has no effect.
    pub fn register(
        &mut self,
        stage: Stage,
        plugin: Arc<PluginDescriptor>,
    ) -> Result<&mut Self, BuildError> {
        let name = plugin.name.clone();
        if !self.registry.register(stage, plugin)? {
            self.logger
                .warn(&format!("Plugin {name:?} is already registered in {stage}"));
        }
        Ok(self)
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn jobs(&self) -> &JobTracker {
        &self.jobs
    }

    pub fn vault_root(&self) -> &Path {
        &self.vault_root
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Run every stage once.
    pub fn build(&mut self) -> Result<BuildReport, BuildError> {
        let Builder {
            io,
            logger,
            vault_root,
            output_root,
            scan_options,
            path_generator,
            registry,
            jobs,
            use_cache,
        } = self;

        if vault_root.starts_with(&*output_root) {
            return Err(BuildError::Overlap {
                vault: vault_root.clone(),
                output: output_root.clone(),
            });
        }

        let io: &dyn Io = io.as_ref();
        let logger: &dyn Logger = logger.as_ref();

        logger.info(&format!("Scanning {}", vault_root.display()));
        let ParseOutcome {
            mut tree,
            failures: scan_failures,
        } = scan::parse(vault_root, io, scan_options)?;
        let nested_output = tree
            .iter()
            .find(|id| tree.get(*id).absolute_path == *output_root);
        if let Some(id) = nested_output {
            tree.detach(id);
        }
        let scanned = tree.len();

        let previous = CacheManifest::load(io, output_root);

        let mut pipeline = Pipeline {
            io,
            logger,
            vault_root: vault_root.as_path(),
            output_root: output_root.as_path(),
            registry: &*registry,
            jobs,
            use_cache: *use_cache,
            replay: false,
            previous,
            next: CacheManifest::empty(),
            stats: CacheStats::default(),
            paths: PathStore::new(),
            chain: String::new(),
            stages: Vec::new(),
            writes: Queue::new(RECENT_WRITES),
            failures: Vec::new(),
        };
        for failure in scan_failures {
            pipeline.fail(format!(
                "Cannot read {}: {}",
                failure.path.display(),
                failure.error
            ));
        }

        pipeline.run_walkers(Stage::TreeShaping, &mut tree);
        pipeline.assign_paths(&mut tree, path_generator);
        let published = pipeline.publish(&tree);
        pipeline.run_walkers(Stage::TreeWalk, &mut tree);
        pipeline.run_modifiers();

        let mut generated = pipeline.scan_output(scan_options)?;
        let generated_tree = generated.len();
        pipeline.run_walkers(Stage::GeneratedTreeWalk, &mut generated);

        if let Err(e) = pipeline.next.save(io, output_root) {
            logger.warn(&format!("Cannot save cache manifest: {e}"));
        }

        let report = BuildReport {
            vault_root: vault_root.clone(),
            output_root: output_root.clone(),
            scanned,
            published,
            generated_tree,
            stages: pipeline.stages,
            failures: pipeline.failures,
            jobs: pipeline.jobs.history().cloned().collect(),
            recent_writes: pipeline.writes.iter().cloned().collect(),
            cache: pipeline.stats,
        };
        if report.is_clean() {
            logger.success(&format!(
                "Built {} documents into {}",
                report.published,
                output_root.display()
            ));
        } else {
            logger.warn(&format!(
                "Built {} documents into {} with failures",
                report.published,
                output_root.display()
            ));
        }
        Ok(report)
    }
}

fn scan_options(config: &BuildConfig) -> Result<ScanOptions, BuildError> {
    Ok(ScanOptions::ignoring(&config.scan.ignore)?
        .with_extensions(&config.scan.text_extensions, &config.scan.media_extensions))
}

fn fingerprint_at(chain: &str, stage: Stage, descriptor: &PluginDescriptor) -> String {
    plugin_fingerprint(&PluginInputs {
        stage: stage.name(),
        name: &descriptor.name,
        config: &descriptor.config,
        exclude_patterns: &descriptor.exclude_patterns,
        skip_folder_nodes: descriptor.skip_folder_nodes,
        tree: chain,
    })
}

/// A file about to be published.
struct PlannedCopy {
    id: String,
    origin: PathBuf,
    destination: PathBuf,
    rel: String,
    hash: String,
    /// The destination already holds this content.
    current: bool,
    document: bool,
}

/// A document whose header would not validate.
#[derive(Debug, Clone, Serialize)]
pub struct InvalidDocument {
    pub id: String,
    pub reason: String,
}

/// What [`check`] found in a vault.
#[derive(Debug, Serialize)]
pub struct CheckReport {
    pub vault_root: PathBuf,
    pub tree: FileTree,
    pub scan_failures: Vec<String>,
    pub documents: usize,
    pub media: usize,
    pub invalid: Vec<InvalidDocument>,
}

impl CheckReport {
    pub fn is_clean(&self) -> bool {
        self.scan_failures.is_empty() && self.invalid.is_empty()
    }
}

/// Validate `config`, scan the vault and validate every document header,
/// without writing anything.
pub fn check(config: &BuildConfig, base: &Path, io: &dyn Io) -> Result<CheckReport, BuildError> {
    config.validate()?;
    let (vault_root, _) = config.resolve_roots(base);
    let vault_root = normalize_path(&vault_root);
    let ParseOutcome { tree, failures } = scan::parse(&vault_root, io, &scan_options(config)?)?;

    let meta = MetaEngine::new(io);
    let mut documents = 0;
    let mut media = 0;
    let mut invalid = Vec::new();
    for id in tree.iter() {
        let node = tree.get(id);
        match node.category() {
            NodeCategory::TextDocument => {
                documents += 1;
                if let Err(e) = meta.extract_from_file(&node.absolute_path) {
                    invalid.push(InvalidDocument {
                        id: node.id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
            NodeCategory::MediaFile => media += 1,
            NodeCategory::Folder | NodeCategory::Unknown => {}
        }
    }

    Ok(CheckReport {
        vault_root,
        tree,
        scan_failures: failures
            .iter()
            .map(|f| format!("{}: {}", f.path.display(), f.error))
            .collect(),
        documents,
        media,
        invalid,
    })
}

/// State of one build run.
struct Pipeline<'b> {
    io: &'b dyn Io,
    logger: &'b dyn Logger,
    vault_root: &'b Path,
    output_root: &'b Path,
    registry: &'b PluginRegistry,
    jobs: &'b mut JobTracker,
    use_cache: bool,
    /// Everything after tree-shaping is unchanged since the last build,
    /// so its output tree is kept as it is.
    replay: bool,
    previous: CacheManifest,
    next: CacheManifest,
    stats: CacheStats,
    paths: PathStore,
    /// Tree fingerprint folded with every cacheable plugin so far.
    chain: String,
    stages: Vec<StageSummary>,
    writes: Queue<PathBuf>,
    failures: Vec<String>,
}

impl Pipeline<'_> {
    fn fail(&mut self, message: String) {
        self.logger.error(&message);
        self.failures.push(message);
    }

    fn fingerprint(&self, stage: Stage, descriptor: &PluginDescriptor) -> String {
        fingerprint_at(&self.chain, stage, descriptor)
    }

    fn can_skip(&self, key: &str, fingerprint: &str, descriptor: &PluginDescriptor) -> bool {
        self.replay && !descriptor.disable_cache && self.previous.plugin_unchanged(key, fingerprint)
    }

    /// Whether every plugin after tree-shaping would be skipped on top of
    /// the current chain, and every document it wrote last time is still
    /// there.
    fn plugins_current(&self) -> bool {
        let mut chain = self.chain.clone();
        for stage in [
            Stage::TreeWalk,
            Stage::ContentGeneration,
            Stage::GeneratedTreeWalk,
        ] {
            for (position, plugin) in self.registry.plugins(stage).iter().enumerate() {
                let descriptor = &plugin.descriptor;
                if descriptor.disable_cache {
                    return false;
                }
                let key = plugin_key(stage.name(), position, &descriptor.name);
                let fingerprint = fingerprint_at(&chain, stage, descriptor);
                if !self.previous.plugin_unchanged(&key, &fingerprint) {
                    return false;
                }
                let missing_output = self
                    .previous
                    .outputs(&key)
                    .iter()
                    .any(|rel| !self.io.exists(&self.output_root.join(rel)));
                if missing_output {
                    return false;
                }
                chain = chain_fingerprint(&chain, &fingerprint);
            }
        }
        true
    }

    fn record_skip(&mut self, label: &str, key: String, fingerprint: String, summary: &mut StageSummary) {
        let logger = self.logger;
        self.jobs.run_phased(
            label,
            || (),
            |()| Ok(SKIPPED_RESPONSE.to_string()),
            |record| log_record(logger, record),
        );
        self.chain = chain_fingerprint(&self.chain, &fingerprint);
        self.next.record_plugin(key, fingerprint);
        self.stats.skipped();
        summary.plugins_skipped += 1;
    }

    fn record_run(
        &mut self,
        record: &JobRecord,
        key: String,
        fingerprint: String,
        descriptor: &PluginDescriptor,
        summary: &mut StageSummary,
    ) {
        if descriptor.disable_cache {
            // Its output is new every run, so nothing after it may be skipped.
            let nonce = Uuid::new_v4().to_string();
            self.chain = chain_fingerprint(&self.chain, &nonce);
        } else {
            self.chain = chain_fingerprint(&self.chain, &fingerprint);
        }
        self.stats.ran();
        if record.status == JobStatus::Success {
            summary.plugins_run += 1;
            if !descriptor.disable_cache {
                self.next.record_plugin(key, fingerprint);
            }
        } else {
            summary.plugins_failed += 1;
        }
    }

    fn run_walkers(&mut self, stage: Stage, tree: &mut FileTree) {
        let mut summary = StageSummary::new(stage);
        let cacheable = stage != Stage::TreeShaping;
        let registry = self.registry;

        for (position, plugin) in registry.plugins(stage).iter().enumerate() {
            let descriptor = &plugin.descriptor;
            let PluginKind::Walker(walker) = &descriptor.kind else {
                continue;
            };
            let key = plugin_key(stage.name(), position, &descriptor.name);
            let label = format!("{stage}:{}", descriptor.name);
            let fingerprint = self.fingerprint(stage, descriptor);

            if cacheable && self.can_skip(&key, &fingerprint, descriptor) {
                self.record_skip(&label, key, fingerprint, &mut summary);
                continue;
            }

            let tools = BuildTools {
                io: self.io,
                logger: self.logger,
                paths: &self.paths,
                vault_root: self.vault_root,
                output_root: self.output_root,
            };
            let logger = self.logger;
            let mut excluded = Vec::new();
            let walked: &FileTree = tree;
            let record = self.jobs.run_phased(
                &label,
                || logger.info(&format!("Running {label}")),
                |()| walk_nodes(walked, plugin, walker.as_ref(), &tools, &mut excluded),
                |record| log_record(logger, record),
            );

            if cacheable {
                self.record_run(&record, key, fingerprint, descriptor, &mut summary);
            } else if record.status == JobStatus::Success {
                summary.plugins_run += 1;
            } else {
                summary.plugins_failed += 1;
            }

            if stage == Stage::TreeShaping {
                summary.excluded += excluded.len();
                for id in excluded {
                    tree.detach(id);
                }
            } else if !excluded.is_empty() {
                self.logger.warn(&format!(
                    "{label} asked to exclude {} nodes; exclusion only applies in tree-shaping",
                    excluded.len()
                ));
            }
        }
        self.stages.push(summary);
    }

    fn run_modifiers(&mut self) {
        let stage = Stage::ContentGeneration;
        let mut summary = StageSummary::new(stage);
        let registry = self.registry;

        for (position, plugin) in registry.plugins(stage).iter().enumerate() {
            let descriptor = &plugin.descriptor;
            let PluginKind::Modifier(modifier) = &descriptor.kind else {
                continue;
            };
            let key = plugin_key(stage.name(), position, &descriptor.name);
            let label = format!("{stage}:{}", descriptor.name);
            let fingerprint = self.fingerprint(stage, descriptor);
            let previous_outputs = self.previous.outputs(&key).to_vec();

            if self.can_skip(&key, &fingerprint, descriptor) {
                for rel in &previous_outputs {
                    let path = self.output_root.join(rel);
                    if self.io.exists(&path) {
                        self.paths.insert_generated(path);
                    }
                }
                self.next.record_outputs(key.clone(), previous_outputs);
                self.record_skip(&label, key, fingerprint, &mut summary);
                continue;
            }

            let tools = BuildTools {
                io: self.io,
                logger: self.logger,
                paths: &self.paths,
                vault_root: self.vault_root,
                output_root: self.output_root,
            };
            let logger = self.logger;
            let mut written = Vec::new();
            let record = self.jobs.run_phased(
                &label,
                || logger.info(&format!("Running {label}")),
                |()| write_generated(modifier.as_ref(), &tools, &mut written),
                |record| log_record(logger, record),
            );

            let produced: Vec<String> = written
                .iter()
                .filter_map(|p| relative_slash_path(self.output_root, p))
                .collect();
            for path in written {
                self.paths.insert_generated(path.clone());
                self.writes.enqueue(path);
            }
            summary.generated += produced.len();

            if record.status == JobStatus::Success {
                for old in previous_outputs.iter().filter(|o| !produced.contains(*o)) {
                    self.remove_output(old);
                }
            }
            self.next.record_outputs(key.clone(), produced);
            self.record_run(&record, key, fingerprint, descriptor, &mut summary);
        }
        self.stages.push(summary);
    }

    /// Give every document and media file a destination.
    fn assign_paths(&mut self, tree: &mut FileTree, generator: &PathGenerator) {
        let tools = BuildTools {
            io: self.io,
            logger: self.logger,
            paths: &self.paths,
            vault_root: self.vault_root,
            output_root: self.output_root,
        };
        let planned: Vec<(NodeId, PathBuf)> = tree
            .iter()
            .filter(|id| {
                matches!(
                    tree.get(*id).category(),
                    NodeCategory::TextDocument | NodeCategory::MediaFile
                )
            })
            .map(|id| (id, generator(tree.get(id), &tools)))
            .collect();

        let mut taken: HashMap<PathBuf, String> = HashMap::new();
        for (id, destination) in planned {
            let node = tree.get(id);
            let destination = normalize_path(&destination);
            if !destination.starts_with(self.output_root) {
                self.fail(format!(
                    "{}: destination {} is outside the output root",
                    node.id,
                    destination.display()
                ));
                continue;
            }
            if let Some(other) = taken.get(&destination) {
                self.fail(format!(
                    "{}: destination {} already taken by {other}",
                    node.id,
                    destination.display()
                ));
                continue;
            }
            taken.insert(destination.clone(), node.id.clone());

            let origin = node.absolute_path.clone();
            self.paths.insert(origin.clone(), destination.clone());
            tree.get_mut(id).build_info = Some(BuildInfo {
                origin_path: origin,
                destination_path: destination,
            });
        }
    }

    /// Copy every node with a destination, then drop stale destinations.
    /// Returns the number of published files.
    ///
    /// Unless the whole build replays the last one, documents are copied
    /// afresh so no plugin sees its own or a later plugin's edits from a
    /// previous run. Media copies are reused whenever their hash matches.
    fn publish(&mut self, tree: &FileTree) -> usize {
        let mut planned: Vec<PlannedCopy> = Vec::new();

        for id in tree.iter() {
            let node = tree.get(id);
            let Some(info) = &node.build_info else {
                continue;
            };
            let Some(rel) = relative_slash_path(self.output_root, &info.destination_path) else {
                continue;
            };
            match hash_file(self.io, &info.origin_path) {
                Ok(hash) => planned.push(PlannedCopy {
                    id: node.id.clone(),
                    origin: info.origin_path.clone(),
                    destination: info.destination_path.clone(),
                    current: self.previous.copy_is_current(
                        &rel,
                        &hash,
                        self.io.exists(&info.destination_path),
                    ),
                    document: node.category() == NodeCategory::TextDocument,
                    rel,
                    hash,
                }),
                Err(e) => self.fail(format!("{}: {e}", node.id)),
            }
        }

        self.chain = tree_fingerprint(planned.iter().map(|copy| PublishedFile {
            origin: &copy.origin,
            destination: &copy.destination,
            content_hash: &copy.hash,
        }));
        self.replay = self.use_cache
            && planned.iter().all(|copy| copy.current)
            && self.plugins_current();
        if self.use_cache && !self.replay {
            self.logger
                .info("Vault or plugins changed since the last build; republishing documents");
        }

        let mut published = 0;
        for copy in planned {
            let reuse = self.use_cache && copy.current && (self.replay || !copy.document);
            if reuse {
                self.stats.reused();
            } else {
                if let Err(e) = self.io.copy_file(&copy.origin, &copy.destination) {
                    self.fail(format!("{}: {e}", copy.id));
                    continue;
                }
                self.stats.written();
            }
            self.next.record_copy(copy.rel, copy.hash);
            published += 1;
        }

        let stale: Vec<String> = self
            .previous
            .stale_copies(&self.next)
            .map(String::from)
            .collect();
        for rel in &stale {
            self.remove_output(rel);
        }
        published
    }

    fn remove_output(&mut self, rel: &str) {
        let path = self.output_root.join(rel);
        match self.io.delete_file(&path) {
            Ok(()) | Err(IoError::NotFound(_)) => self.stats.removed(),
            Err(e) => self
                .logger
                .warn(&format!("Cannot remove stale output {}: {e}", path.display())),
        }
    }

    /// Re-read the output root as a tree of its own.
    fn scan_output(&mut self, scan_options: &ScanOptions) -> Result<FileTree, BuildError> {
        if !self.io.exists(self.output_root) {
            return Ok(FileTree::new(self.output_root.to_path_buf()));
        }
        let options = ScanOptions::ignoring(&[".*".to_string()])?.with_extensions(
            &scan_options.text_extensions,
            &scan_options.media_extensions,
        );
        let ParseOutcome { mut tree, failures } = scan::parse(self.output_root, self.io, &options)?;
        for failure in failures {
            self.fail(format!(
                "Cannot read {}: {}",
                failure.path.display(),
                failure.error
            ));
        }

        let ids: Vec<NodeId> = tree.iter().collect();
        for id in ids {
            let node = tree.get_mut(id);
            if !node.is_folder() {
                node.build_info = Some(BuildInfo {
                    origin_path: node.absolute_path.clone(),
                    destination_path: node.absolute_path.clone(),
                });
            }
        }
        Ok(tree)
    }
}

/// Visit every eligible node with `walker`; one failing node never stops
/// the walk.
fn walk_nodes(
    tree: &FileTree,
    plugin: &RegisteredPlugin,
    walker: &dyn Walker,
    tools: &BuildTools<'_>,
    excluded: &mut Vec<NodeId>,
) -> Result<String, String> {
    let name = &plugin.descriptor.name;
    let mut visited = 0usize;
    let mut failed = Vec::new();

    let _ = tree.walk_all(
        !plugin.descriptor.skip_folder_nodes,
        &mut |node, index, siblings| {
            if plugin.excludes(node) {
                return Ok::<(), std::convert::Infallible>(());
            }
            visited += 1;
            let visit = Visit {
                node,
                id: siblings[index],
                index,
                siblings,
                tree,
            };
            match walker.walk(&visit, tools) {
                Ok(WalkOutcome::Continue) => {}
                Ok(WalkOutcome::Exclude) => excluded.push(visit.id),
                Err(e) => {
                    tools.logger.error(&format!("{name}: {}: {e}", node.id));
                    failed.push(format!("{}: {e}", node.id));
                }
            }
            Ok(())
        },
    );

    summarize(visited, "nodes", failed)
}

/// Run `modifier` and write what it returns inside the output root.
fn write_generated(
    modifier: &dyn Modifier,
    tools: &BuildTools<'_>,
    written: &mut Vec<PathBuf>,
) -> Result<String, String> {
    let documents = modifier.modify(tools).map_err(|e| e.to_string())?;
    let total = documents.len();
    let mut failed = Vec::new();

    for doc in documents {
        let write_path = normalize_path(&doc.write_path);
        if !write_path.starts_with(tools.output_root) {
            failed.push(format!(
                "{}: outside the output root",
                doc.write_path.display()
            ));
            continue;
        }
        match tools.io.write(&write_path, &doc.content) {
            Ok(()) => written.push(write_path),
            Err(e) => {
                tools.logger.error(&e.to_string());
                failed.push(e.to_string());
            }
        }
    }

    summarize(total, "documents", failed)
}

fn summarize(total: usize, unit: &str, failed: Vec<String>) -> Result<String, String> {
    if failed.is_empty() {
        Ok(format!("{total} {unit}"))
    } else {
        Err(format!(
            "{} of {total} {unit} failed: {}",
            failed.len(),
            failed.join("; ")
        ))
    }
}

fn log_record(logger: &dyn Logger, record: &JobRecord) {
    let elapsed = record.exec_time_ms.unwrap_or_default();
    match record.status {
        JobStatus::Success => logger.success(&format!(
            "{}: {} ({elapsed} ms)",
            record.label,
            record.response.as_deref().unwrap_or_default()
        )),
        _ => logger.error(&format!(
            "{} failed: {}",
            record.label,
            record.failure_reason.as_deref().unwrap_or_default()
        )),
    }
}
