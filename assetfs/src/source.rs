//! The capability set shared by live namespaces, embedded trees and
//! user-supplied providers.

use crate::entry::Entry;
use crate::error::AssetResult;
use crate::local::LookupContext;
use crate::pattern::{self, GlobPattern};
use crate::walk::{EntryVisitor, Visit, WalkMode};

/// Anything that can resolve, list and walk logical asset paths.
///
/// Implementors provide the four primitive operations; everything else,
/// including globbing, is derived from them so every backend behaves the
/// same way.
pub trait AssetSource: Send + Sync {
    /// Resolve `path` to an entry, consulting `ctx` for local overrides.
    fn asset_info_in(&self, ctx: &LookupContext, path: &str) -> AssetResult<Entry>;

    /// Recursive pre-order traversal of `dir`.
    fn walk_info(&self, dir: &str, mode: WalkMode, visit: &mut EntryVisitor<'_>)
        -> AssetResult<()>;

    /// Direct children of `dir`. With `skip_dir`, directories are omitted.
    fn read_dir(&self, dir: &str, skip_dir: bool, visit: &mut EntryVisitor<'_>)
        -> AssetResult<()>;

    /// Listing used by non-recursive globs. Sources with a parent chain
    /// override this to include inherited content.
    fn glob_read_dir(
        &self,
        dir: &str,
        skip_dir: bool,
        visit: &mut EntryVisitor<'_>,
    ) -> AssetResult<()> {
        self.read_dir(dir, skip_dir, visit)
    }

    fn asset_info(&self, path: &str) -> AssetResult<Entry> {
        self.asset_info_in(&LookupContext::default(), path)
    }

    /// Full content of the asset at `path`.
    fn asset(&self, path: &str) -> AssetResult<Vec<u8>> {
        self.asset_info(path)?.data()
    }

    fn asset_in(&self, ctx: &LookupContext, path: &str) -> AssetResult<Vec<u8>> {
        self.asset_info_in(ctx, path)?.data()
    }

    /// Like [`walk_info`](Self::walk_info) but reports only path and kind.
    fn walk(
        &self,
        dir: &str,
        mode: WalkMode,
        visit: &mut dyn FnMut(&str, bool) -> AssetResult<Visit>,
    ) -> AssetResult<()> {
        self.walk_info(dir, mode, &mut |entry: Entry| {
            visit(entry.path(), entry.is_dir())
        })
    }

    fn glob_info(&self, pattern: &GlobPattern, visit: &mut EntryVisitor<'_>) -> AssetResult<()> {
        pattern::run(self, pattern, visit)
    }

    fn glob(
        &self,
        pattern: &GlobPattern,
        visit: &mut dyn FnMut(&str, bool) -> AssetResult<Visit>,
    ) -> AssetResult<()> {
        pattern::run(self, pattern, &mut |entry: Entry| {
            visit(entry.path(), entry.is_dir())
        })
    }

    /// Matched paths, in traversal order.
    fn glob_names(&self, pattern: &GlobPattern) -> AssetResult<Vec<String>> {
        let mut names = Vec::new();
        pattern::run(self, pattern, &mut |entry: Entry| {
            names.push(entry.path().to_string());
            Ok(Visit::Continue)
        })?;
        Ok(names)
    }

    /// Matched entries, in traversal order.
    fn glob_entries(&self, pattern: &GlobPattern) -> AssetResult<Vec<Entry>> {
        let mut entries = Vec::new();
        pattern::run(self, pattern, &mut |entry: Entry| {
            entries.push(entry);
            Ok(Visit::Continue)
        })?;
        Ok(entries)
    }
}
