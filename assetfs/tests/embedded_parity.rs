//! Integration tests for the embedded backend.
//!
//! A live namespace tree is compiled into an embedded tree, written to disk
//! and loaded back; both backends must then answer lookups, walks, listings
//! and globs with the same logical paths and content.
//!
//! Run with: `cargo test --test embedded_parity`

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use assetfs::{
    AssetError, AssetFs, AssetSource, EmbeddedFs, EmbeddedTree, Entry, GlobPattern, LocalSources,
    LookupContext, SourceDir, UnsupportedReason, Visit, WalkMode,
};

// ============================================================================
// Fixture
// ============================================================================

fn write(root: &Path, rel: &str, content: &str) {
    let target = root.join(rel);
    fs::create_dir_all(target.parent().unwrap()).unwrap();
    fs::write(target, content).unwrap();
}

struct Fixture {
    temp: TempDir,
    live: AssetFs,
    embedded: EmbeddedFs,
}

impl Fixture {
    fn root(&self) -> PathBuf {
        self.temp.path().join("t")
    }
}

fn fixture() -> Fixture {
    let temp = TempDir::new().unwrap();
    let t = temp.path().join("t");
    write(&t.join("data"), "a.txt", "data a");
    write(&t.join("data"), "css/site.css", "body {}");
    write(&t.join("data2"), "a.txt", "data2 a");
    write(&t.join("data2"), "css/print.css", "@media print {}");
    write(&t.join("data2"), "js/app.js", "run()");
    write(&t.join("ns"), "sub-ns/nsf.txt", "from ns");
    write(&t.join("ns"), "ns.txt", "ns");

    let live = AssetFs::new();
    live.register_path(t.join("data")).unwrap();
    live.register_path(t.join("data2")).unwrap();
    live.namespace("z").register_path(t.join("ns")).unwrap();

    let tree = EmbeddedTree::compile(&live, &LookupContext::new(), None).unwrap();
    let file = temp.path().join("assets.bin");
    tree.save(&file).unwrap();
    let embedded = EmbeddedFs::load(&file).unwrap();

    Fixture {
        temp,
        live,
        embedded,
    }
}

fn walk_set(source: &dyn AssetSource, dir: &str, mode: WalkMode) -> BTreeSet<(String, bool)> {
    let mut out = BTreeSet::new();
    source
        .walk_info(dir, mode, &mut |e: Entry| {
            out.insert((e.path().to_string(), e.is_dir()));
            Ok(Visit::Continue)
        })
        .unwrap();
    out
}

fn read_dir_set(source: &dyn AssetSource, dir: &str, skip_dir: bool) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    source
        .read_dir(dir, skip_dir, &mut |e: Entry| {
            out.insert(e.path().to_string());
            Ok(Visit::Continue)
        })
        .unwrap();
    out
}

fn glob_set(source: &dyn AssetSource, text: &str) -> BTreeSet<String> {
    let pattern = GlobPattern::new(text).unwrap();
    source.glob_names(&pattern).unwrap().into_iter().collect()
}

// ============================================================================
// Parity
// ============================================================================

#[test]
fn test_walk_parity() {
    let f = fixture();
    for mode in [
        WalkMode::ALL,
        WalkMode::FILES,
        WalkMode::DIRS | WalkMode::FILES,
        WalkMode::DIRS | WalkMode::FILES | WalkMode::NAMESPACES,
        WalkMode::DIRS | WalkMode::FILES | WalkMode::NAMESPACES_LOOKUP,
        WalkMode::FILES | WalkMode::NAMESPACES_LOOKUP,
    ] {
        assert_eq!(
            walk_set(&f.live, ".", mode),
            walk_set(&f.embedded, ".", mode),
            "mode {:?}",
            mode
        );
    }
    for mode in [WalkMode::ALL, WalkMode::FILES] {
        assert_eq!(
            walk_set(&f.live, "z", mode),
            walk_set(&f.embedded, "z", mode),
            "mode {:?}",
            mode
        );
    }
}

#[test]
fn test_namespace_content_needs_lookup() {
    let f = fixture();
    let nested = ("z/sub-ns/nsf.txt".to_string(), false);
    for source in [&f.live as &dyn AssetSource, &f.embedded] {
        let files = walk_set(source, ".", WalkMode::FILES);
        assert!(files.contains(&("a.txt".to_string(), false)));
        assert!(!files.contains(&nested));

        let without_entries = walk_set(source, ".", WalkMode::ALL.without(WalkMode::NAMESPACES));
        assert!(without_entries.contains(&nested));
        assert!(!without_entries.contains(&("z".to_string(), true)));
    }
}

#[test]
fn test_asset_info_parity() {
    let f = fixture();
    let files = [
        "a.txt",
        "css/site.css",
        "css/print.css",
        "js/app.js",
        "z/ns.txt",
        "z/sub-ns/nsf.txt",
    ];
    for path in files {
        let live = f.live.asset_info(path).unwrap();
        let embedded = f.embedded.asset_info(path).unwrap();
        assert_eq!(live.path(), embedded.path());
        assert_eq!(live.is_dir(), embedded.is_dir());
        assert_eq!(live.size(), embedded.size());
        assert_eq!(live.data().unwrap(), embedded.data().unwrap(), "content of {}", path);
        // Embedded entries remember where they were compiled from.
        assert_eq!(live.real_path(), embedded.real_path());
        assert!(embedded.file_type().is_embedded());
    }

    for dir in ["css", "z", "z/sub-ns"] {
        let live = f.live.asset_info(dir).unwrap();
        let embedded = f.embedded.asset_info(dir).unwrap();
        assert!(live.is_dir() && embedded.is_dir());
        assert_eq!(live.is_namespace(), embedded.is_namespace(), "namespace flag of {}", dir);
    }

    let z = f.embedded.asset_info("z").unwrap();
    assert!(z.is_namespace());
    assert!(z.file_type().is_namespace() && z.file_type().is_embedded());
    assert_eq!(z.to_string(), "ne://z");
    assert!(!f.embedded.asset_info("css").unwrap().is_namespace());
    assert!(f.embedded.asset("missing.txt").unwrap_err().is_not_found());
}

#[test]
fn test_read_dir_parity() {
    let f = fixture();
    for (dir, skip_dir) in [(".", false), (".", true), ("css", false), ("z", false)] {
        assert_eq!(
            read_dir_set(&f.live, dir, skip_dir),
            read_dir_set(&f.embedded, dir, skip_dir),
            "read_dir({:?}, {})",
            dir,
            skip_dir
        );
    }
}

#[test]
fn test_glob_parity() {
    let f = fixture();
    for text in ["*.txt", "css/*.css", ">*.css", ">\x0c*", ">\rs*", "z/*"] {
        assert_eq!(glob_set(&f.live, text), glob_set(&f.embedded, text), "pattern {:?}", text);
    }
}

#[test]
fn test_namespace_scope_parity() {
    let f = fixture();
    let live = f.live.namespace("z");
    let embedded = f.embedded.namespace("z");
    assert_eq!(
        walk_set(&live, ".", WalkMode::ALL),
        walk_set(&embedded, ".", WalkMode::ALL)
    );
    assert_eq!(live.asset("sub-ns/nsf.txt").unwrap(), embedded.asset("sub-ns/nsf.txt").unwrap());
}

// ============================================================================
// Local Sources over Embedded Data
// ============================================================================

#[test]
fn test_local_source_overrides_embedded() {
    let f = fixture();
    let user = f.root().join("user_dir");
    write(&user, "z/sub-ns/nsf.txt", "from user");

    let registry = Arc::new(LocalSources::new());
    registry.register("my_dir", SourceDir::new(&user));
    let embedded = f.embedded.clone().with_local_sources(registry);
    let ctx = LookupContext::new().with_local_names(["my_dir"]);

    assert_eq!(embedded.asset_in(&ctx, "z/sub-ns/nsf.txt").unwrap(), b"from user");
    assert_eq!(
        embedded.namespace("z").asset_in(&ctx, "sub-ns/nsf.txt").unwrap(),
        b"from user"
    );
    assert_eq!(embedded.asset("z/sub-ns/nsf.txt").unwrap(), b"from ns");
}

#[test]
fn test_embedded_is_read_only() {
    let f = fixture();
    let entry = f.embedded.asset_info("a.txt").unwrap();
    assert!(entry.writer().is_err());
    assert!(entry.appender().is_err());
}

#[test]
fn test_embedded_namespace_refuses_content() {
    let f = fixture();
    for source in [&f.live as &dyn AssetSource, &f.embedded] {
        let z = source.asset_info("z").unwrap();
        for result in [z.data().map(|_| ()), z.writer().map(|_| ())] {
            assert!(matches!(
                result,
                Err(AssetError::Unsupported {
                    reason: UnsupportedReason::IsNamespace,
                    ..
                })
            ));
        }
    }
}
