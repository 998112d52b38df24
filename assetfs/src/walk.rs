//! Traversal flags, visitor control and physical directory walking.

use std::fmt;
use std::fs;
use std::ops::BitOr;
use std::path::{Path, PathBuf};

use crate::entry::Entry;
use crate::error::{is_absent, AssetError, AssetResult};
use crate::path;

/// What a visitor wants the traversal to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    /// Keep going.
    Continue,
    /// Do not descend into the directory just visited. Same as
    /// `Continue` when returned for a file.
    SkipDir,
    /// End the whole traversal. The traversal still returns `Ok(())`.
    Stop,
}

/// Visitor over resolved entries.
pub type EntryVisitor<'a> = dyn FnMut(Entry) -> AssetResult<Visit> + 'a;

/// Internal traversal outcome; `Stop` unwinds every nested traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Stop,
}

impl Flow {
    pub(crate) fn is_stop(self) -> bool {
        self == Flow::Stop
    }
}

/// Bit set controlling a walk.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct WalkMode(u8);

impl WalkMode {
    pub const DIRS: WalkMode = WalkMode(1 << 0);
    pub const FILES: WalkMode = WalkMode(1 << 1);
    /// Emit namespace pseudo-directories.
    pub const NAMESPACES: WalkMode = WalkMode(1 << 2);
    /// Descend into child namespaces.
    pub const NAMESPACES_LOOKUP: WalkMode = WalkMode(1 << 3);
    /// Fall through to the parent namespace.
    pub const PARENT_LOOKUP: WalkMode = WalkMode(1 << 4);
    /// Visit roots last-registered first.
    pub const REVERSE: WalkMode = WalkMode(1 << 5);

    pub const NONE: WalkMode = WalkMode(0);
    pub const ALL: WalkMode = WalkMode(
        Self::FILES.0
            | Self::DIRS.0
            | Self::NAMESPACES.0
            | Self::NAMESPACES_LOOKUP.0
            | Self::PARENT_LOOKUP.0,
    );

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: WalkMode) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn with(self, other: WalkMode) -> WalkMode {
        WalkMode(self.0 | other.0)
    }

    pub const fn without(self, other: WalkMode) -> WalkMode {
        WalkMode(self.0 & !other.0)
    }

    pub fn dirs(self) -> bool {
        self.contains(Self::DIRS)
    }

    pub fn files(self) -> bool {
        self.contains(Self::FILES)
    }

    /// Namespace pseudo-directories are emitted only when directories are.
    pub fn namespaces(self) -> bool {
        self.contains(Self::NAMESPACES) && self.dirs()
    }

    pub fn namespaces_lookup(self) -> bool {
        self.contains(Self::NAMESPACES_LOOKUP)
    }

    pub fn parent_lookup(self) -> bool {
        self.contains(Self::PARENT_LOOKUP)
    }

    pub fn reverse(self) -> bool {
        self.contains(Self::REVERSE)
    }
}

impl Default for WalkMode {
    fn default() -> Self {
        WalkMode::ALL
    }
}

impl BitOr for WalkMode {
    type Output = WalkMode;

    fn bitor(self, rhs: WalkMode) -> WalkMode {
        self.with(rhs)
    }
}

impl fmt::Debug for WalkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(WalkMode, &str); 6] = [
            (WalkMode::DIRS, "DIRS"),
            (WalkMode::FILES, "FILES"),
            (WalkMode::NAMESPACES, "NAMESPACES"),
            (WalkMode::NAMESPACES_LOOKUP, "NAMESPACES_LOOKUP"),
            (WalkMode::PARENT_LOOKUP, "PARENT_LOOKUP"),
            (WalkMode::REVERSE, "REVERSE"),
        ];
        let set: Vec<&str> = NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "WalkMode({})", set.join(" | "))
    }
}

/// One physical directory entry.
pub(crate) struct PhysicalEntry {
    pub name: String,
    pub real_path: PathBuf,
    pub metadata: fs::Metadata,
}

/// Read a physical directory, sorted by name.
///
/// Entries whose metadata vanished between listing and stat (broken
/// symlinks, concurrent deletes) are skipped.
pub(crate) fn list_dir_sorted(dir: &Path) -> AssetResult<Vec<PhysicalEntry>> {
    let reader = fs::read_dir(dir).map_err(|e| AssetError::io(dir, e))?;
    let mut out = Vec::new();
    for item in reader {
        let item = item.map_err(|e| AssetError::io(dir, e))?;
        let real_path = item.path();
        let metadata = match fs::metadata(&real_path) {
            Ok(md) => md,
            Err(e) if is_absent(&e) => continue,
            Err(e) => return Err(AssetError::io(real_path, e)),
        };
        out.push(PhysicalEntry {
            name: item.file_name().to_string_lossy().into_owned(),
            real_path,
            metadata,
        });
    }
    out.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(out)
}

/// True when `dir` exists and is a directory; absent paths are `false`.
pub(crate) fn is_existing_dir(dir: &Path) -> AssetResult<bool> {
    match fs::metadata(dir) {
        Ok(md) => Ok(md.is_dir()),
        Err(e) if is_absent(&e) => Ok(false),
        Err(e) => Err(AssetError::io(dir, e)),
    }
}

/// Recursive pre-order walk of a physical directory.
///
/// Emitted paths are `logical` joined with the relative path below `dir`.
/// The directory itself is not emitted.
pub(crate) fn walk_physical(
    dir: &Path,
    logical: &str,
    mode: WalkMode,
    visit: &mut EntryVisitor<'_>,
) -> AssetResult<Flow> {
    for item in list_dir_sorted(dir)? {
        let logical_path = path::join(logical, &item.name);
        if item.metadata.is_dir() {
            let mut descend = true;
            if mode.dirs() {
                let entry =
                    Entry::real(logical_path.clone(), item.real_path.clone(), &item.metadata);
                match visit(entry)? {
                    Visit::Stop => return Ok(Flow::Stop),
                    Visit::SkipDir => descend = false,
                    Visit::Continue => {}
                }
            }
            if descend && walk_physical(&item.real_path, &logical_path, mode, visit)?.is_stop() {
                return Ok(Flow::Stop);
            }
        } else if mode.files() {
            let entry = Entry::real(logical_path, item.real_path, &item.metadata);
            if visit(entry)? == Visit::Stop {
                return Ok(Flow::Stop);
            }
        }
    }
    Ok(Flow::Continue)
}
