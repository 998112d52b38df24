//! Embedded backend: an in-memory tree compiled from a live namespace.
//!
//! [`EmbeddedTree::compile`] flattens a live [`AssetFs`] (namespaces, root
//! stacks, parent fallthrough and local overrides already merged) into one
//! directory tree. [`EmbeddedFs`] serves that tree through the same
//! [`AssetSource`] contract as the live backend, so callers cannot tell the
//! two apart except through [`Entry::real_path`], which for embedded entries
//! names the file the content was compiled from.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::entry::Entry;
use crate::error::{AssetError, AssetResult};
use crate::local::{LocalSources, LookupContext};
use crate::namespace::AssetFs;
use crate::path;
use crate::source::AssetSource;
use crate::walk::{EntryVisitor, Flow, Visit, WalkMode};

const FORMAT_VERSION: u32 = 2;

/// One node of an embedded tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbeddedNode {
    File {
        data: Vec<u8>,
        modified_secs: u64,
        source: Option<PathBuf>,
    },
    Dir {
        children: BTreeMap<String, EmbeddedNode>,
        source: Option<PathBuf>,
        /// Compiled from a child namespace rather than a real directory.
        namespace: bool,
    },
}

impl EmbeddedNode {
    fn empty_dir(source: Option<PathBuf>, namespace: bool) -> Self {
        EmbeddedNode::Dir {
            children: BTreeMap::new(),
            source,
            namespace,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, EmbeddedNode::Dir { .. })
    }

    pub fn is_namespace(&self) -> bool {
        matches!(self, EmbeddedNode::Dir { namespace: true, .. })
    }

    /// Place `leaf` at `segments`. The first node at a path keeps its kind:
    /// nothing is inserted below a file, a directory never replaces a file
    /// and a file only replaces a directory that is still empty.
    fn insert(&mut self, segments: &[&str], leaf: EmbeddedNode) {
        let Some((head, rest)) = segments.split_first() else {
            match (self, leaf) {
                (
                    EmbeddedNode::Dir {
                        source, namespace, ..
                    },
                    EmbeddedNode::Dir {
                        source: new,
                        namespace: new_namespace,
                        ..
                    },
                ) => {
                    if new.is_some() {
                        *source = new;
                    }
                    *namespace |= new_namespace;
                }
                (EmbeddedNode::File { .. }, EmbeddedNode::Dir { .. }) => {}
                (EmbeddedNode::Dir { children, .. }, _) if !children.is_empty() => {}
                (node, leaf) => *node = leaf,
            }
            return;
        };
        if let EmbeddedNode::Dir { children, .. } = self {
            children
                .entry((*head).to_string())
                .or_insert_with(|| EmbeddedNode::empty_dir(None, false))
                .insert(rest, leaf);
        }
    }

    fn count(&self) -> (usize, usize) {
        match self {
            EmbeddedNode::File { .. } => (1, 0),
            EmbeddedNode::Dir { children, .. } => {
                children.values().fold((0, 1), |(files, dirs), child| {
                    let (f, d) = child.count();
                    (files + f, dirs + d)
                })
            }
        }
    }
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/')
        .filter(|s| !s.is_empty() && *s != path::ROOT)
        .collect()
}

fn unix_secs(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Serializable directory tree with file contents inline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedTree {
    format_version: u32,
    created_at_secs: u64,
    root: EmbeddedNode,
}

impl EmbeddedTree {
    pub fn new() -> Self {
        Self {
            format_version: FORMAT_VERSION,
            created_at_secs: unix_secs(SystemTime::now()),
            root: EmbeddedNode::empty_dir(None, false),
        }
    }

    /// When the tree was built; also the mtime reported for directories.
    pub fn created_at(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(self.created_at_secs)
    }

    /// Node at a logical path; `"."` is the root directory.
    pub fn get(&self, path: &str) -> Option<&EmbeddedNode> {
        let mut node = &self.root;
        for segment in segments(path) {
            match node {
                EmbeddedNode::Dir { children, .. } => node = children.get(segment)?,
                EmbeddedNode::File { .. } => return None,
            }
        }
        Some(node)
    }

    /// Add a directory, creating missing parents.
    pub fn insert_dir(&mut self, path: &str, source: Option<PathBuf>) {
        self.root
            .insert(&segments(path), EmbeddedNode::empty_dir(source, false));
    }

    /// Add a namespace pseudo-directory, creating missing parents.
    pub fn insert_namespace(&mut self, path: &str) {
        self.root
            .insert(&segments(path), EmbeddedNode::empty_dir(None, true));
    }

    /// Add a file, creating missing parents. An existing file at `path` is
    /// replaced; paths below a file are ignored.
    pub fn insert_file(
        &mut self,
        path: &str,
        data: Vec<u8>,
        modified: SystemTime,
        source: Option<PathBuf>,
    ) {
        let segments = segments(path);
        if segments.is_empty() {
            return;
        }
        let leaf = EmbeddedNode::File {
            data,
            modified_secs: unix_secs(modified),
            source,
        };
        self.root.insert(&segments, leaf);
    }

    pub fn file_count(&self) -> usize {
        self.root.count().0
    }

    /// Directories, not counting the root.
    pub fn dir_count(&self) -> usize {
        self.root.count().1.saturating_sub(1)
    }

    /// Flatten a live namespace into an embedded tree.
    ///
    /// Content comes from [`AssetFs::tree_names`], so overrides active in
    /// `ctx` are compiled in and paths matched by `ignore` are left out.
    pub fn compile(
        fs: &AssetFs,
        ctx: &LookupContext,
        ignore: Option<&dyn Fn(&str) -> bool>,
    ) -> AssetResult<Self> {
        let mut tree = EmbeddedTree::new();
        for entry in fs.tree_names(ctx, false, ignore)? {
            let source = entry.real_path().map(Path::to_path_buf);
            if entry.is_namespace() {
                tree.insert_namespace(entry.path());
            } else if entry.is_dir() {
                tree.insert_dir(entry.path(), source);
            } else {
                tree.insert_file(entry.path(), entry.data()?, entry.modified(), source);
            }
        }
        tracing::info!(
            namespace = %fs.prefix(),
            files = tree.file_count(),
            dirs = tree.dir_count(),
            "Compiled embedded tree"
        );
        Ok(tree)
    }

    pub fn to_bytes(&self) -> AssetResult<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| AssetError::Codec(format!("Failed to serialize embedded tree: {}", e)))
    }

    /// Decode a tree, e.g. one compiled in with `include_bytes!`.
    pub fn from_bytes(bytes: &[u8]) -> AssetResult<Self> {
        let tree: EmbeddedTree = bincode::deserialize(bytes).map_err(|e| {
            AssetError::Codec(format!("Failed to deserialize embedded tree: {}", e))
        })?;
        tree.check_version()
    }

    fn check_version(self) -> AssetResult<Self> {
        if self.format_version != FORMAT_VERSION {
            return Err(AssetError::Codec(format!(
                "Unsupported embedded tree format {} (expected {})",
                self.format_version, FORMAT_VERSION
            )));
        }
        Ok(self)
    }

    pub fn load(path: &Path) -> AssetResult<Self> {
        let file = File::open(path).map_err(|e| AssetError::io(path, e))?;
        let tree: EmbeddedTree = bincode::deserialize_from(BufReader::new(file)).map_err(|e| {
            AssetError::Codec(format!("Failed to deserialize embedded tree: {}", e))
        })?;
        let tree = tree.check_version()?;
        tracing::info!(
            path = %path.display(),
            files = tree.file_count(),
            "Loaded embedded tree"
        );
        Ok(tree)
    }

    /// Write to `path` through a temporary file and a rename.
    pub fn save(&self, path: &Path) -> AssetResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| AssetError::io(parent, e))?;
        }

        let temp_path = path.with_extension("tmp");
        let file = File::create(&temp_path).map_err(|e| AssetError::io(&temp_path, e))?;
        let mut writer = BufWriter::new(file);
        bincode::serialize_into(&mut writer, self)
            .map_err(|e| AssetError::Codec(format!("Failed to serialize embedded tree: {}", e)))?;
        writer.flush().map_err(|e| AssetError::io(&temp_path, e))?;
        fs::rename(&temp_path, path).map_err(|e| AssetError::io(path, e))?;

        tracing::info!(
            path = %path.display(),
            files = self.file_count(),
            dirs = self.dir_count(),
            "Saved embedded tree"
        );
        Ok(())
    }
}

impl Default for EmbeddedTree {
    fn default() -> Self {
        Self::new()
    }
}

/// List the direct children of the directory at `key`, reported under
/// `logical`.
pub(crate) fn read_dir_node(
    tree: &Arc<EmbeddedTree>,
    key: &str,
    logical: &str,
    skip_dir: bool,
    visit: &mut EntryVisitor<'_>,
) -> AssetResult<Flow> {
    let Some(EmbeddedNode::Dir { children, .. }) = tree.get(key) else {
        return Ok(Flow::Continue);
    };
    for (name, child) in children {
        if skip_dir && child.is_dir() {
            continue;
        }
        let child_key = path::join(key, name);
        if let Some(entry) = Entry::embedded(path::join(logical, name), tree.clone(), child_key) {
            if visit(entry)? == Visit::Stop {
                return Ok(Flow::Stop);
            }
        }
    }
    Ok(Flow::Continue)
}

/// Pre-order walk below `key`. Namespace nodes are entered only with
/// `NAMESPACES_LOOKUP` and reported only when `mode.namespaces()`.
fn walk_node(
    tree: &Arc<EmbeddedTree>,
    key: &str,
    logical: &str,
    mode: WalkMode,
    visit: &mut EntryVisitor<'_>,
) -> AssetResult<Flow> {
    let Some(EmbeddedNode::Dir { children, .. }) = tree.get(key) else {
        return Ok(Flow::Continue);
    };
    for (name, child) in children {
        let child_key = path::join(key, name);
        let child_path = path::join(logical, name);
        if child.is_dir() {
            let emit = if child.is_namespace() {
                if !mode.namespaces_lookup() {
                    continue;
                }
                mode.namespaces()
            } else {
                mode.dirs()
            };
            let mut descend = true;
            if emit {
                let entry = Entry::embedded(child_path.clone(), tree.clone(), child_key.clone());
                if let Some(entry) = entry {
                    match visit(entry)? {
                        Visit::Stop => return Ok(Flow::Stop),
                        Visit::SkipDir => descend = false,
                        Visit::Continue => {}
                    }
                }
            }
            if descend && walk_node(tree, &child_key, &child_path, mode, visit)?.is_stop() {
                return Ok(Flow::Stop);
            }
        } else if mode.files() {
            if let Some(entry) = Entry::embedded(child_path, tree.clone(), child_key) {
                if visit(entry)? == Visit::Stop {
                    return Ok(Flow::Stop);
                }
            }
        }
    }
    Ok(Flow::Continue)
}

/// [`AssetSource`] over an [`EmbeddedTree`], optionally scoped to a
/// namespace prefix.
///
/// `PARENT_LOOKUP` has no effect: the compiled tree is already merged.
/// `REVERSE` has none either, since there is one root.
#[derive(Clone)]
pub struct EmbeddedFs {
    tree: Arc<EmbeddedTree>,
    prefix: String,
    local_sources: Option<Arc<LocalSources>>,
}

impl EmbeddedFs {
    pub fn new(tree: EmbeddedTree) -> Self {
        Self::from_arc(Arc::new(tree))
    }

    pub fn from_arc(tree: Arc<EmbeddedTree>) -> Self {
        Self {
            tree,
            prefix: path::ROOT.to_string(),
            local_sources: None,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> AssetResult<Self> {
        Ok(Self::new(EmbeddedTree::from_bytes(bytes)?))
    }

    pub fn load(path: &Path) -> AssetResult<Self> {
        Ok(Self::new(EmbeddedTree::load(path)?))
    }

    /// Consult this registry for names given in a [`LookupContext`].
    pub fn with_local_sources(mut self, local_sources: Arc<LocalSources>) -> Self {
        self.local_sources = Some(local_sources);
        self
    }

    /// View scoped to a `/`- or `.`-separated child namespace.
    pub fn namespace(&self, name: &str) -> EmbeddedFs {
        let mut prefix = self.prefix.clone();
        for segment in name.split(['/', '.']).filter(|s| !s.is_empty()) {
            prefix = path::join(&prefix, segment);
        }
        Self {
            prefix,
            ..self.clone()
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn tree(&self) -> &Arc<EmbeddedTree> {
        &self.tree
    }

    fn key(&self, path: &str) -> String {
        path::join(&self.prefix, path)
    }
}

impl fmt::Debug for EmbeddedFs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddedFs")
            .field("prefix", &self.prefix)
            .field("files", &self.tree.file_count())
            .finish()
    }
}

impl AssetSource for EmbeddedFs {
    fn asset_info_in(&self, ctx: &LookupContext, path: &str) -> AssetResult<Entry> {
        let path = path::normalize(path);
        let key = self.key(&path);
        if !ctx.is_empty() {
            if let Some(hit) = ctx.lookup(self.local_sources.as_deref(), &key)? {
                return Ok(Entry::real(path, hit.real_path, &hit.metadata));
            }
        }
        Entry::embedded(path.clone(), self.tree.clone(), key).ok_or(AssetError::NotFound(path))
    }

    fn walk_info(
        &self,
        dir: &str,
        mode: WalkMode,
        visit: &mut EntryVisitor<'_>,
    ) -> AssetResult<()> {
        let dir = path::normalize(dir);
        if !mode.namespaces_lookup() {
            let mut key = self.prefix.clone();
            for segment in segments(&dir) {
                key = path::join(&key, segment);
                if self.tree.get(&key).is_some_and(EmbeddedNode::is_namespace) {
                    return Ok(());
                }
            }
        }
        walk_node(&self.tree, &self.key(&dir), &dir, mode, visit)?;
        Ok(())
    }

    fn read_dir(
        &self,
        dir: &str,
        skip_dir: bool,
        visit: &mut EntryVisitor<'_>,
    ) -> AssetResult<()> {
        let dir = path::normalize(dir);
        read_dir_node(&self.tree, &self.key(&dir), &dir, skip_dir, visit)?;
        Ok(())
    }
}
