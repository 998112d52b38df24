//! Logical path helpers.
//!
//! Logical paths are namespace-relative, slash separated and never absolute.
//! The namespace root is spelled `"."`.

use std::path::{Component, Path, PathBuf};

/// The logical path of a namespace root.
pub const ROOT: &str = ".";

/// Normalize a logical path: strip leading/trailing slashes, drop `.` and
/// empty segments, resolve `..` without escaping the root.
pub fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    if parts.is_empty() {
        ROOT.to_string()
    } else {
        parts.join("/")
    }
}

/// True for the namespace root.
pub fn is_root(path: &str) -> bool {
    path.is_empty() || path == ROOT
}

/// Join two logical paths, treating `"."` as the identity.
pub fn join(base: &str, rest: &str) -> String {
    match (is_root(base), is_root(rest)) {
        (true, true) => ROOT.to_string(),
        (true, false) => rest.to_string(),
        (false, true) => base.to_string(),
        (false, false) => format!("{}/{}", base, rest),
    }
}

/// Split off the leading segment: `"a/b/c"` -> `("a", Some("b/c"))`.
pub fn split_first(path: &str) -> (&str, Option<&str>) {
    match path.split_once('/') {
        Some((head, tail)) => (head, Some(tail)),
        None => (path, None),
    }
}

/// Split into directory and base name: `"a/b/c"` -> `("a/b", "c")`.
pub fn split_dir_base(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some((dir, base)) => (dir, base),
        None => (ROOT, path),
    }
}

/// Last segment of a logical path.
pub fn base_name(path: &str) -> &str {
    split_dir_base(path).1
}

/// Remove `prefix` from `path` on a segment boundary.
///
/// `strip_prefix("z/a", "z")` is `Some("a")`, `strip_prefix("z", "z")` is
/// `Some(".")` and `strip_prefix("zz/a", "z")` is `None`.
pub fn strip_prefix(path: &str, prefix: &str) -> Option<String> {
    if is_root(prefix) {
        return Some(path.to_string());
    }
    if path == prefix {
        return Some(ROOT.to_string());
    }
    path.strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('/'))
        .map(str::to_string)
}

/// Compose a physical path from a root directory and a logical path.
pub fn to_physical(root: &Path, path: &str) -> PathBuf {
    let mut out = root.to_path_buf();
    if !is_root(path) {
        for segment in path.split('/') {
            out.push(segment);
        }
    }
    out
}

/// Lexically clean a physical path (no filesystem access).
pub fn clean_physical(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(""), ".");
        assert_eq!(normalize("/"), ".");
        assert_eq!(normalize("./a//b/"), "a/b");
        assert_eq!(normalize("a/../b"), "b");
        assert_eq!(normalize("../../a"), "a");
        assert_eq!(normalize("a\\b"), "a/b");
    }

    #[test]
    fn test_join() {
        assert_eq!(join(".", "a"), "a");
        assert_eq!(join("a", "."), "a");
        assert_eq!(join(".", "."), ".");
        assert_eq!(join("a", "b/c"), "a/b/c");
    }

    #[test]
    fn test_split_first() {
        assert_eq!(split_first("z/sub/x"), ("z", Some("sub/x")));
        assert_eq!(split_first("z"), ("z", None));
    }

    #[test]
    fn test_split_dir_base() {
        assert_eq!(split_dir_base("a/b/c.txt"), ("a/b", "c.txt"));
        assert_eq!(split_dir_base("c.txt"), (".", "c.txt"));
        assert_eq!(base_name("a/b"), "b");
    }

    #[test]
    fn test_strip_prefix() {
        assert_eq!(strip_prefix("z/a", "z").as_deref(), Some("a"));
        assert_eq!(strip_prefix("z", "z").as_deref(), Some("."));
        assert_eq!(strip_prefix("zz/a", "z"), None);
        assert_eq!(strip_prefix("a", ".").as_deref(), Some("a"));
    }

    #[test]
    fn test_to_physical() {
        let root = Path::new("/srv/assets");
        assert_eq!(to_physical(root, "."), PathBuf::from("/srv/assets"));
        assert_eq!(
            to_physical(root, "a/b.txt"),
            PathBuf::from("/srv/assets/a/b.txt")
        );
    }

    #[test]
    fn test_clean_physical() {
        assert_eq!(clean_physical(Path::new("t/./data/")), PathBuf::from("t/data"));
        assert_eq!(clean_physical(Path::new("t/x/../data")), PathBuf::from("t/data"));
        assert_eq!(clean_physical(Path::new("./")), PathBuf::from("."));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_normalize_is_idempotent(path in "[a-c./]{0,16}") {
                let once = normalize(&path);
                prop_assert_eq!(normalize(&once), once.clone());
                prop_assert!(!once.starts_with('/'));
                prop_assert!(!once.ends_with('/'));
            }

            #[test]
            fn test_join_then_strip(
                prefix in "[a-c]{1,3}(/[a-c]{1,3}){0,2}",
                rest in "[a-c]{1,3}(/[a-c]{1,3}){0,2}",
            ) {
                let joined = join(&prefix, &rest);
                prop_assert_eq!(strip_prefix(&joined, &prefix), Some(rest));
            }
        }
    }
}
