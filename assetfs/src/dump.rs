//! Flattened enumeration of everything a namespace can see.

use std::collections::BTreeMap;

use crate::entry::Entry;
use crate::error::AssetResult;
use crate::local::LookupContext;
use crate::namespace::AssetFs;
use crate::path;
use crate::source::AssetSource;
use crate::walk::{EntryVisitor, Visit, WalkMode};

impl AssetFs {
    /// Every entry visible from this namespace, one per logical path,
    /// sorted by path.
    ///
    /// Child namespaces, every root and parent fallthrough all contribute;
    /// for a path seen more than once the first occurrence in walk order
    /// wins. Files shadowed by a local source active in `ctx` are replaced
    /// by the override. Directories matched by `ignore` are pruned.
    pub fn tree_names(
        &self,
        ctx: &LookupContext,
        only_files: bool,
        ignore: Option<&dyn Fn(&str) -> bool>,
    ) -> AssetResult<Vec<Entry>> {
        let prefix = self.prefix();
        let mut found: BTreeMap<String, Entry> = BTreeMap::new();

        self.walk_info(path::ROOT, WalkMode::ALL, &mut |entry: Entry| {
            let logical = entry.path().to_string();
            if path::is_root(&logical) {
                return Ok(Visit::Continue);
            }
            if ignore.is_some_and(|ignored| ignored(&logical)) {
                return Ok(if entry.is_dir() {
                    Visit::SkipDir
                } else {
                    Visit::Continue
                });
            }
            if (only_files && entry.is_dir()) || found.contains_key(&logical) {
                return Ok(Visit::Continue);
            }

            let entry = if !entry.is_dir() && !ctx.is_empty() {
                let full_path = path::join(&prefix, &logical);
                match ctx.lookup(Some(self.local_sources()), &full_path)? {
                    Some(hit) => Entry::real(logical.clone(), hit.real_path, &hit.metadata),
                    None => entry,
                }
            } else {
                entry
            };
            found.insert(logical, entry);
            Ok(Visit::Continue)
        })?;

        Ok(found.into_values().collect())
    }

    /// Stream [`tree_names`](Self::tree_names) to `visit`.
    pub fn dump(
        &self,
        ctx: &LookupContext,
        ignore: Option<&dyn Fn(&str) -> bool>,
        visit: &mut EntryVisitor<'_>,
    ) -> AssetResult<()> {
        for entry in self.tree_names(ctx, false, ignore)? {
            if visit(entry)? == Visit::Stop {
                break;
            }
        }
        Ok(())
    }

    /// Like [`dump`](Self::dump), files only.
    pub fn dump_files(
        &self,
        ctx: &LookupContext,
        visit: &mut EntryVisitor<'_>,
    ) -> AssetResult<()> {
        for entry in self.tree_names(ctx, true, None)? {
            if visit(entry)? == Visit::Stop {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::SourceDir;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let target = root.join(rel);
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(target, content).unwrap();
    }

    fn paths(entries: &[Entry]) -> Vec<&str> {
        entries.iter().map(Entry::path).collect()
    }

    #[test]
    fn test_tree_names_merges_and_sorts() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        let ns = TempDir::new().unwrap();
        write(a.path(), "x.txt", "A");
        write(b.path(), "x.txt", "B");
        write(b.path(), "only_b.txt", "B");
        write(ns.path(), "inner.txt", "N");

        let assets = AssetFs::new();
        assets.register_path(a.path()).unwrap();
        assets.register_path(b.path()).unwrap();
        assets.namespace("z").register_path(ns.path()).unwrap();

        let names = assets.tree_names(&LookupContext::new(), false, None).unwrap();
        assert_eq!(paths(&names), vec!["only_b.txt", "x.txt", "z", "z/inner.txt"]);
        let x = names.iter().find(|e| e.path() == "x.txt").unwrap();
        assert_eq!(x.data().unwrap(), b"A");

        let files = assets.tree_names(&LookupContext::new(), true, None).unwrap();
        assert_eq!(paths(&files), vec!["only_b.txt", "x.txt", "z/inner.txt"]);
    }

    #[test]
    fn test_tree_names_ignore_prunes() {
        let a = TempDir::new().unwrap();
        write(a.path(), "keep/a.txt", "k");
        write(a.path(), "skip/b.txt", "s");

        let assets = AssetFs::new();
        assets.register_path(a.path()).unwrap();
        let ignore = |p: &str| p == "skip";

        let names = assets
            .tree_names(&LookupContext::new(), false, Some(&ignore))
            .unwrap();
        assert_eq!(paths(&names), vec!["keep", "keep/a.txt"]);
    }

    #[test]
    fn test_tree_names_applies_local_override() {
        let a = TempDir::new().unwrap();
        let local = TempDir::new().unwrap();
        write(a.path(), "x.txt", "root");
        write(local.path(), "x.txt", "local");

        let assets = AssetFs::new();
        assets.register_path(a.path()).unwrap();
        assets
            .local_sources()
            .register("mine", SourceDir::new(local.path()));

        let ctx = LookupContext::new().with_local_names(["mine"]);
        let names = assets.tree_names(&ctx, true, None).unwrap();
        assert_eq!(names.len(), 1);
        assert_eq!(names[0].data().unwrap(), b"local");
        assert_eq!(names[0].real_path(), Some(local.path().join("x.txt").as_path()));
    }

    #[test]
    fn test_dump_stops_early() {
        let a = TempDir::new().unwrap();
        write(a.path(), "1.txt", "1");
        write(a.path(), "2.txt", "2");

        let assets = AssetFs::new();
        assets.register_path(a.path()).unwrap();

        let mut seen = Vec::new();
        assets
            .dump_files(&LookupContext::new(), &mut |e: Entry| {
                seen.push(e.path().to_string());
                Ok(Visit::Stop)
            })
            .unwrap();
        assert_eq!(seen, vec!["1.txt"]);
    }
}
