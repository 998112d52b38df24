//! Named local override directories and per-lookup context.
//!
//! A local source is a plain directory consulted before any namespace
//! root when a lookup's context names it. Sources are registered once per
//! tree and selected per request, so one process can serve different
//! overrides to different callers.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{is_absent, AssetError, AssetResult};
use crate::path;

/// A file found in a local source.
#[derive(Debug)]
pub struct LocalHit {
    pub real_path: PathBuf,
    pub metadata: fs::Metadata,
}

/// A directory that can shadow namespace content.
pub trait LocalSource: Send + Sync + fmt::Debug {
    /// Directory the source reads from.
    fn dir(&self) -> &Path;

    /// Look up a logical path; `Ok(None)` when absent.
    fn get(&self, path: &str) -> AssetResult<Option<LocalHit>>;
}

/// Local source backed by a physical directory.
#[derive(Debug, Clone)]
pub struct SourceDir {
    root: PathBuf,
}

impl SourceDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: path::clean_physical(&root.into()),
        }
    }

    /// Physical directory for `path`, only if it exists and is a directory.
    pub fn get_dir(&self, path: &str) -> AssetResult<Option<PathBuf>> {
        Ok(self
            .get(path)?
            .filter(|hit| hit.metadata.is_dir())
            .map(|hit| hit.real_path))
    }
}

impl LocalSource for SourceDir {
    fn dir(&self) -> &Path {
        &self.root
    }

    fn get(&self, path: &str) -> AssetResult<Option<LocalHit>> {
        let real_path = path::to_physical(&self.root, &path::normalize(path));
        match fs::metadata(&real_path) {
            Ok(metadata) => Ok(Some(LocalHit {
                real_path,
                metadata,
            })),
            Err(e) if is_absent(&e) => Ok(None),
            Err(e) => Err(AssetError::io(real_path, e)),
        }
    }
}

/// Registry of named local sources shared by a whole namespace tree.
#[derive(Default)]
pub struct LocalSources {
    by_name: RwLock<HashMap<String, Arc<dyn LocalSource>>>,
}

impl LocalSources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a source under `name`.
    pub fn register(&self, name: impl Into<String>, source: impl LocalSource + 'static) {
        self.register_arc(name, Arc::new(source));
    }

    pub fn register_arc(&self, name: impl Into<String>, source: Arc<dyn LocalSource>) {
        let name = name.into();
        tracing::debug!(name = %name, dir = %source.dir().display(), "Registered local source");
        self.by_name.write().insert(name, source);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn LocalSource>> {
        self.by_name.read().get(name).cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.by_name.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.by_name.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.read().is_empty()
    }
}

impl fmt::Debug for LocalSources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSources")
            .field("names", &self.names())
            .finish()
    }
}

/// Per-lookup options: which local sources to consult, in order.
#[derive(Debug, Clone, Default)]
pub struct LookupContext {
    local_names: Vec<String>,
    sources: Vec<Arc<dyn LocalSource>>,
}

impl LookupContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consult the named registry sources, in this order.
    pub fn with_local_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.local_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Put `names` ahead of the names already selected.
    pub fn unshift<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut front: Vec<String> = names.into_iter().map(Into::into).collect();
        front.append(&mut self.local_names);
        self.local_names = front;
        self
    }

    /// Add an unregistered source; these are consulted before named ones.
    pub fn with_source(mut self, source: Arc<dyn LocalSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn local_names(&self) -> &[String] {
        &self.local_names
    }

    pub fn is_empty(&self) -> bool {
        self.local_names.is_empty() && self.sources.is_empty()
    }

    /// First hit for `full_path` among the context's sources.
    ///
    /// Names missing from `registry` are skipped.
    pub(crate) fn lookup(
        &self,
        registry: Option<&LocalSources>,
        full_path: &str,
    ) -> AssetResult<Option<LocalHit>> {
        for source in &self.sources {
            if let Some(hit) = source.get(full_path)? {
                return Ok(Some(hit));
            }
        }
        let Some(registry) = registry else {
            return Ok(None);
        };
        for name in &self.local_names {
            if let Some(source) = registry.get(name) {
                if let Some(hit) = source.get(full_path)? {
                    tracing::trace!(source = %name, path = %full_path, "Local source override");
                    return Ok(Some(hit));
                }
            }
        }
        Ok(None)
    }
}
