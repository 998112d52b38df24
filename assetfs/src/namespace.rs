//! The namespace tree and the live-directory resolution algorithm.
//!
//! Every node of the tree owns an ordered stack of root directories and a
//! map of named child namespaces. Nodes live in one arena shared by the
//! whole tree; an [`AssetFs`] is a cheap handle (arena + index) to one node,
//! so children refer to their parent by index and never own it.
//!
//! Lookup precedence for a path requested on a node:
//!
//! 1. local sources named by the [`LookupContext`], in order
//! 2. the child namespace named by the first path segment, if any
//! 3. the node's own roots, in registration order
//! 4. the parent node, with the path re-prefixed by this node's name
//! 5. the node's providers, in registration order
//!
//! Tree construction (registration, namespace creation) is expected to
//! finish before concurrent reads begin; the arena lock is never held
//! while user code (visitors, callbacks, plugins) runs.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::entry::Entry;
use crate::error::{is_absent, AssetError, AssetResult};
use crate::local::{LocalSources, LookupContext};
use crate::path::{self, ROOT};
use crate::source::AssetSource;
use crate::walk::{self, EntryVisitor, Flow, Visit, WalkMode};

/// Called after a new root is registered on a node.
pub type PathRegisterCallback = Arc<dyn Fn(&AssetFs, &Path) + Send + Sync>;

/// Extension hook attached to a namespace and inherited by namespaces
/// created below it afterwards.
pub trait Plugin: Send + Sync {
    /// Called once for each namespace the plugin becomes attached to.
    fn init(&self, _fs: &AssetFs) {}

    /// Called for every root registered on an attached namespace.
    fn path_registered(&self, _fs: &AssetFs, _root: &Path) {}
}

/// Options for [`AssetFs::register_path_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterOptions {
    /// Put the root ahead of the existing ones.
    pub prepend: bool,
    /// Accept a directory that does not exist (yet).
    pub allow_missing: bool,
}

impl RegisterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prepend(mut self, prepend: bool) -> Self {
        self.prepend = prepend;
        self
    }

    pub fn with_allow_missing(mut self, allow_missing: bool) -> Self {
        self.allow_missing = allow_missing;
        self
    }
}

struct NodeData {
    name: String,
    prefix: String,
    parent: Option<usize>,
    roots: Vec<PathBuf>,
    children: BTreeMap<String, usize>,
    callbacks: Vec<PathRegisterCallback>,
    plugins: Vec<Arc<dyn Plugin>>,
    providers: Vec<Arc<dyn AssetSource>>,
}

impl NodeData {
    fn new(
        name: &str,
        prefix: String,
        parent: Option<usize>,
        plugins: Vec<Arc<dyn Plugin>>,
    ) -> Self {
        Self {
            name: name.to_string(),
            prefix,
            parent,
            roots: Vec::new(),
            children: BTreeMap::new(),
            callbacks: Vec::new(),
            plugins,
            providers: Vec::new(),
        }
    }
}

struct Tree {
    nodes: RwLock<Vec<NodeData>>,
    local_sources: Arc<LocalSources>,
}

/// Snapshot of one node, taken so no lock is held during traversal.
struct NodeView {
    name: String,
    parent: Option<usize>,
    roots: Vec<PathBuf>,
    children: Vec<(String, usize)>,
}

impl NodeView {
    fn child(&self, name: &str) -> Option<usize> {
        self.children
            .iter()
            .find(|(child, _)| child == name)
            .map(|(_, id)| *id)
    }
}

/// Handle to one node of a namespace tree.
#[derive(Clone)]
pub struct AssetFs {
    tree: Arc<Tree>,
    id: usize,
}

impl AssetFs {
    /// Empty root namespace with its own local-source registry.
    pub fn new() -> Self {
        Self::with_local_sources(Arc::new(LocalSources::new()))
    }

    /// Empty root namespace sharing an existing local-source registry.
    pub fn with_local_sources(local_sources: Arc<LocalSources>) -> Self {
        let root = NodeData::new("", ROOT.to_string(), None, Vec::new());
        AssetFs {
            tree: Arc::new(Tree {
                nodes: RwLock::new(vec![root]),
                local_sources,
            }),
            id: 0,
        }
    }

    fn node(&self, id: usize) -> AssetFs {
        AssetFs {
            tree: self.tree.clone(),
            id,
        }
    }

    fn view(&self) -> NodeView {
        let nodes = self.tree.nodes.read();
        let node = &nodes[self.id];
        NodeView {
            name: node.name.clone(),
            parent: node.parent,
            roots: node.roots.clone(),
            children: node
                .children
                .iter()
                .map(|(name, id)| (name.clone(), *id))
                .collect(),
        }
    }

    /// Registry of local sources shared by every node of this tree.
    pub fn local_sources(&self) -> &Arc<LocalSources> {
        &self.tree.local_sources
    }

    /// Namespace name; empty for the tree root.
    pub fn name(&self) -> String {
        self.tree.nodes.read()[self.id].name.clone()
    }

    /// Location of this namespace from the tree root, `"."` for the root.
    pub fn prefix(&self) -> String {
        self.tree.nodes.read()[self.id].prefix.clone()
    }

    pub fn is_root(&self) -> bool {
        self.tree.nodes.read()[self.id].parent.is_none()
    }

    pub fn parent(&self) -> Option<AssetFs> {
        let parent = self.tree.nodes.read()[self.id].parent;
        parent.map(|id| self.node(id))
    }

    /// Registered roots, in precedence order.
    pub fn roots(&self) -> Vec<PathBuf> {
        self.tree.nodes.read()[self.id].roots.clone()
    }

    /// Child namespace for a `/`- or `.`-separated name, created on demand.
    ///
    /// Repeated calls with the same name return the same node. An empty
    /// name returns this node.
    pub fn namespace(&self, name: &str) -> AssetFs {
        let mut current = self.clone();
        for segment in name.split(['/', '.']).filter(|s| !s.is_empty()) {
            current = current.child_or_create(segment);
        }
        current
    }

    fn child_or_create(&self, name: &str) -> AssetFs {
        let created = {
            let mut nodes = self.tree.nodes.write();
            if let Some(&id) = nodes[self.id].children.get(name) {
                return self.node(id);
            }
            let prefix = path::join(&nodes[self.id].prefix, name);
            let plugins = nodes[self.id].plugins.clone();
            let id = nodes.len();
            nodes.push(NodeData::new(name, prefix, Some(self.id), plugins.clone()));
            nodes[self.id].children.insert(name.to_string(), id);
            (id, plugins)
        };
        let (id, plugins) = created;
        let child = self.node(id);
        tracing::debug!(namespace = %child.prefix(), "Created namespace");
        for plugin in plugins {
            plugin.init(&child);
        }
        child
    }

    /// Existing child namespace, without creating anything.
    pub fn get_namespace(&self, name: &str) -> Option<AssetFs> {
        let nodes = self.tree.nodes.read();
        let mut id = self.id;
        for segment in name.split(['/', '.']).filter(|s| !s.is_empty()) {
            id = *nodes[id].children.get(segment)?;
        }
        Some(self.node(id))
    }

    /// Direct child namespaces, sorted by name.
    pub fn namespaces(&self) -> Vec<AssetFs> {
        self.view()
            .children
            .into_iter()
            .map(|(_, id)| self.node(id))
            .collect()
    }

    /// Append a root directory. Returns `false` if it was already registered.
    pub fn register_path(&self, dir: impl AsRef<Path>) -> AssetResult<bool> {
        self.register_path_with(dir, RegisterOptions::default())
    }

    /// Put a root directory ahead of the existing ones.
    pub fn prepend_path(&self, dir: impl AsRef<Path>) -> AssetResult<bool> {
        self.register_path_with(dir, RegisterOptions::default().with_prepend(true))
    }

    pub fn register_path_with(
        &self,
        dir: impl AsRef<Path>,
        options: RegisterOptions,
    ) -> AssetResult<bool> {
        let root = path::clean_physical(dir.as_ref());
        if !options.allow_missing && !walk::is_existing_dir(&root)? {
            return Err(AssetError::RootMissing(root));
        }

        let (callbacks, plugins) = {
            let mut nodes = self.tree.nodes.write();
            let node = &mut nodes[self.id];
            if node.roots.contains(&root) {
                tracing::debug!(root = %root.display(), "Root already registered");
                return Ok(false);
            }
            if options.prepend {
                node.roots.insert(0, root.clone());
            } else {
                node.roots.push(root.clone());
            }
            (node.callbacks.clone(), node.plugins.clone())
        };

        tracing::info!(
            namespace = %self.prefix(),
            root = %root.display(),
            prepend = options.prepend,
            "Registered asset root"
        );
        for callback in callbacks {
            callback(self, &root);
        }
        for plugin in plugins {
            plugin.path_registered(self, &root);
        }
        Ok(true)
    }

    /// Run `callback` for every root registered on this node from now on.
    pub fn on_path_register<F>(&self, callback: F)
    where
        F: Fn(&AssetFs, &Path) + Send + Sync + 'static,
    {
        self.tree.nodes.write()[self.id]
            .callbacks
            .push(Arc::new(callback));
    }

    /// Attach a plugin: `init` runs now, then every existing root is replayed.
    pub fn register_plugin(&self, plugin: Arc<dyn Plugin>) {
        let roots = {
            let mut nodes = self.tree.nodes.write();
            let node = &mut nodes[self.id];
            node.plugins.push(plugin.clone());
            node.roots.clone()
        };
        plugin.init(self);
        for root in roots {
            plugin.path_registered(self, &root);
        }
    }

    /// Chain an external source consulted after everything else fails.
    pub fn add_provider(&self, provider: Arc<dyn AssetSource>) {
        self.tree.nodes.write()[self.id].providers.push(provider);
    }

    pub fn providers(&self) -> Vec<Arc<dyn AssetSource>> {
        self.tree.nodes.read()[self.id].providers.clone()
    }

    /// Namespace and roots resolution, without local sources or providers.
    fn resolve(&self, path: &str, descend: bool) -> AssetResult<Option<Entry>> {
        let view = self.view();
        if descend {
            if path::is_root(path) {
                return Ok(Some(Entry::namespace(ROOT.to_string(), self.clone())));
            }
            let (head, rest) = path::split_first(path);
            if let Some(id) = view.child(head) {
                let child = self.node(id);
                return match rest {
                    Some(rest) => child.resolve(rest, true),
                    None => Ok(Some(Entry::namespace(head.to_string(), child))),
                };
            }
        }

        for root in &view.roots {
            let real_path = path::to_physical(root, path);
            match fs::metadata(&real_path) {
                Ok(metadata) => {
                    return Ok(Some(Entry::real(path.to_string(), real_path, &metadata)))
                }
                Err(e) if is_absent(&e) => {}
                Err(e) => return Err(AssetError::io(real_path, e)),
            }
        }

        match view.parent {
            Some(parent) => self
                .node(parent)
                .resolve(&path::join(&view.name, path), false),
            None => Ok(None),
        }
    }

    pub(crate) fn read_dir_node(
        &self,
        dir: &str,
        skip_dir: bool,
        descend: bool,
        parent_lookup: bool,
        visit: &mut EntryVisitor<'_>,
    ) -> AssetResult<Flow> {
        let view = self.view();
        if descend {
            if path::is_root(dir) {
                if !skip_dir {
                    for (name, id) in &view.children {
                        let entry = Entry::namespace(name.clone(), self.node(*id));
                        if visit(entry)? == Visit::Stop {
                            return Ok(Flow::Stop);
                        }
                    }
                }
            } else {
                let (head, rest) = path::split_first(dir);
                if let Some(id) = view.child(head) {
                    let flow = self.node(id).read_dir_node(
                        rest.unwrap_or(ROOT),
                        skip_dir,
                        true,
                        false,
                        &mut |entry: Entry| {
                            let joined = path::join(head, entry.path());
                            visit(entry.with_path(joined))
                        },
                    )?;
                    if flow.is_stop() {
                        return Ok(Flow::Stop);
                    }
                }
            }
        }

        for root in &view.roots {
            let real_dir = path::to_physical(root, dir);
            if !walk::is_existing_dir(&real_dir)? {
                continue;
            }
            for item in walk::list_dir_sorted(&real_dir)? {
                if skip_dir && item.metadata.is_dir() {
                    continue;
                }
                let entry =
                    Entry::real(path::join(dir, &item.name), item.real_path, &item.metadata);
                if visit(entry)? == Visit::Stop {
                    return Ok(Flow::Stop);
                }
            }
        }

        if parent_lookup {
            if let Some(parent) = view.parent {
                let name = view.name;
                return self.node(parent).read_dir_node(
                    &path::join(&name, dir),
                    skip_dir,
                    false,
                    true,
                    &mut |entry: Entry| match path::strip_prefix(entry.path(), &name) {
                        Some(stripped) => visit(entry.with_path(stripped)),
                        None => Ok(Visit::Continue),
                    },
                );
            }
        }
        Ok(Flow::Continue)
    }

    pub(crate) fn walk_node(
        &self,
        dir: &str,
        mode: WalkMode,
        visit: &mut EntryVisitor<'_>,
    ) -> AssetResult<Flow> {
        let view = self.view();
        let child_mode = mode
            .with(WalkMode::NAMESPACES_LOOKUP)
            .without(WalkMode::PARENT_LOOKUP);

        if path::is_root(dir) {
            if mode.namespaces_lookup() {
                for (name, id) in &view.children {
                    let child = self.node(*id);
                    if mode.namespaces() {
                        match visit(Entry::namespace(name.clone(), child.clone()))? {
                            Visit::Stop => return Ok(Flow::Stop),
                            Visit::SkipDir => continue,
                            Visit::Continue => {}
                        }
                    }
                    let flow = child.walk_node(ROOT, child_mode, &mut |entry: Entry| {
                        let joined = path::join(name, entry.path());
                        visit(entry.with_path(joined))
                    })?;
                    if flow.is_stop() {
                        return Ok(Flow::Stop);
                    }
                }
            }

            let mut roots = view.roots.clone();
            if mode.reverse() {
                roots.reverse();
            }
            for root in &roots {
                if walk::walk_physical(root, ROOT, mode, visit)?.is_stop() {
                    return Ok(Flow::Stop);
                }
            }
        } else {
            if mode.namespaces_lookup() {
                let (head, rest) = path::split_first(dir);
                if let Some(id) = view.child(head) {
                    let flow = self.node(id).walk_node(
                        rest.unwrap_or(ROOT),
                        child_mode,
                        &mut |entry: Entry| {
                            let joined = path::join(head, entry.path());
                            visit(entry.with_path(joined))
                        },
                    )?;
                    if flow.is_stop() {
                        return Ok(Flow::Stop);
                    }
                }
            }

            let mut roots = view.roots.clone();
            if mode.reverse() {
                roots.reverse();
            }
            for root in &roots {
                let real_dir = path::to_physical(root, dir);
                if walk::is_existing_dir(&real_dir)?
                    && walk::walk_physical(&real_dir, dir, mode, visit)?.is_stop()
                {
                    return Ok(Flow::Stop);
                }
            }
        }

        if mode.parent_lookup() {
            if let Some(parent) = view.parent {
                let name = view.name;
                return self.node(parent).walk_node(
                    &path::join(&name, dir),
                    mode.without(WalkMode::NAMESPACES_LOOKUP),
                    &mut |entry: Entry| match path::strip_prefix(entry.path(), &name) {
                        Some(stripped) => visit(entry.with_path(stripped)),
                        None => Ok(Visit::Continue),
                    },
                );
            }
        }
        Ok(Flow::Continue)
    }
}

impl Default for AssetFs {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for AssetFs {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.tree, &other.tree) && self.id == other.id
    }
}

impl Eq for AssetFs {}

impl fmt::Debug for AssetFs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nodes = self.tree.nodes.read();
        let node = &nodes[self.id];
        f.debug_struct("AssetFs")
            .field("prefix", &node.prefix)
            .field("roots", &node.roots)
            .field("namespaces", &node.children.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl AssetSource for AssetFs {
    fn asset_info_in(&self, ctx: &LookupContext, path: &str) -> AssetResult<Entry> {
        let path = path::normalize(path);

        if !ctx.is_empty() {
            let full_path = path::join(&self.prefix(), &path);
            if let Some(hit) = ctx.lookup(Some(&self.tree.local_sources), &full_path)? {
                tracing::debug!(
                    path = %path,
                    real_path = %hit.real_path.display(),
                    "Resolved from local source"
                );
                return Ok(Entry::real(path, hit.real_path, &hit.metadata));
            }
        }

        if let Some(entry) = self.resolve(&path, true)? {
            return Ok(entry.with_path(path));
        }

        for provider in self.providers() {
            match provider.asset_info_in(ctx, &path) {
                Ok(entry) => return Ok(entry),
                Err(e) if e.is_not_found() => {
                    tracing::debug!(path = %path, "Provider does not have asset, trying next");
                }
                Err(e) => return Err(e),
            }
        }
        Err(AssetError::NotFound(path))
    }

    fn walk_info(
        &self,
        dir: &str,
        mode: WalkMode,
        visit: &mut EntryVisitor<'_>,
    ) -> AssetResult<()> {
        self.walk_node(&path::normalize(dir), mode, visit)?;
        Ok(())
    }

    fn read_dir(
        &self,
        dir: &str,
        skip_dir: bool,
        visit: &mut EntryVisitor<'_>,
    ) -> AssetResult<()> {
        self.read_dir_node(&path::normalize(dir), skip_dir, true, false, visit)?;
        Ok(())
    }

    fn glob_read_dir(
        &self,
        dir: &str,
        skip_dir: bool,
        visit: &mut EntryVisitor<'_>,
    ) -> AssetResult<()> {
        self.read_dir_node(&path::normalize(dir), skip_dir, true, true, visit)?;
        Ok(())
    }
}
