//! Glob patterns and the shared glob algorithm.
//!
//! Pattern syntax: an optional `>` prefix makes the pattern recursive,
//! then an optional `\r` (directories only) or `\f` (files only) marker,
//! then `dir/base`. Only the base is a shell-style pattern; it is matched
//! against entry names, never against whole paths.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::entry::Entry;
use crate::error::{AssetError, AssetResult};
use crate::path;
use crate::source::AssetSource;
use crate::walk::{EntryVisitor, Visit, WalkMode};

/// Rewrites a matched path before it is reported.
pub type PathFormatter = Arc<dyn Fn(&str) -> String + Send + Sync>;

const SPECIAL: &[char] = &['*', '?', '[', ']'];

#[derive(Clone)]
enum Matcher {
    Literal(String),
    Glob(::glob::Pattern),
}

impl Matcher {
    fn matches(&self, name: &str) -> bool {
        match self {
            Matcher::Literal(literal) => literal == name,
            Matcher::Glob(pattern) => pattern.matches(name),
        }
    }
}

/// A parsed, immutable glob pattern.
#[derive(Clone)]
pub struct GlobPattern {
    source: String,
    dir: String,
    base: String,
    recursive: bool,
    files: bool,
    dirs: bool,
    matcher: Matcher,
    formatter: Option<PathFormatter>,
}

impl GlobPattern {
    pub fn new(text: &str) -> AssetResult<Self> {
        let mut rest = text;
        let mut recursive = false;
        if let Some(stripped) = rest.strip_prefix('>') {
            recursive = true;
            rest = stripped;
        }
        let (mut files, mut dirs) = (true, true);
        if let Some(stripped) = rest.strip_prefix('\r') {
            files = false;
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix('\x0c') {
            dirs = false;
            rest = stripped;
        }

        let trimmed = rest.trim_matches('/');
        let (dir, base) = path::split_dir_base(trimmed);
        if base.is_empty() || base == path::ROOT {
            return Err(AssetError::BadPattern {
                pattern: text.to_string(),
                source: ::glob::PatternError {
                    pos: 0,
                    msg: "empty name pattern",
                },
            });
        }

        let matcher = if base.contains(SPECIAL) {
            let compiled =
                ::glob::Pattern::new(base).map_err(|source| AssetError::BadPattern {
                    pattern: text.to_string(),
                    source,
                })?;
            Matcher::Glob(compiled)
        } else {
            Matcher::Literal(base.to_string())
        };

        Ok(Self {
            source: text.to_string(),
            dir: path::normalize(dir),
            base: base.to_string(),
            recursive,
            files,
            dirs,
            matcher,
            formatter: None,
        })
    }

    /// Directory the pattern searches, `"."` for the namespace root.
    pub fn dir(&self) -> &str {
        &self.dir
    }

    /// The name pattern.
    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn is_recursive(&self) -> bool {
        self.recursive
    }

    pub fn allow_files(&self) -> bool {
        self.files
    }

    pub fn allow_dirs(&self) -> bool {
        self.dirs
    }

    /// True when the name contains no wildcard.
    pub fn is_literal(&self) -> bool {
        matches!(self.matcher, Matcher::Literal(_))
    }

    pub fn matches(&self, name: &str) -> bool {
        self.matcher.matches(name)
    }

    pub fn recursive(&self) -> Self {
        Self {
            recursive: true,
            ..self.clone()
        }
    }

    pub fn files_only(&self) -> Self {
        Self {
            files: true,
            dirs: false,
            ..self.clone()
        }
    }

    pub fn dirs_only(&self) -> Self {
        Self {
            files: false,
            dirs: true,
            ..self.clone()
        }
    }

    /// Search under `prefix` but report paths without it.
    ///
    /// The prefix is stripped before any formatter already installed runs.
    pub fn wrap(&self, prefix: &str) -> Self {
        let prefix = path::normalize(prefix);
        if path::is_root(&prefix) {
            return self.clone();
        }
        let previous = self.formatter.clone();
        let strip = prefix.clone();
        let formatter: PathFormatter = Arc::new(move |p: &str| {
            let stripped = path::strip_prefix(p, &strip).unwrap_or_else(|| p.to_string());
            match &previous {
                Some(f) => f(&stripped),
                None => stripped,
            }
        });
        Self {
            dir: path::join(&prefix, &self.dir),
            formatter: Some(formatter),
            ..self.clone()
        }
    }

    /// Replace the path formatter.
    pub fn with_path_formatter(&self, formatter: PathFormatter) -> Self {
        Self {
            formatter: Some(formatter),
            ..self.clone()
        }
    }

    /// Apply the formatter, if any.
    pub fn format_path(&self, path: &str) -> String {
        match &self.formatter {
            Some(f) => f(path),
            None => path.to_string(),
        }
    }

    fn walk_mode(&self) -> WalkMode {
        let mut mode = WalkMode::NAMESPACES_LOOKUP | WalkMode::PARENT_LOOKUP;
        if self.files {
            mode = mode | WalkMode::FILES;
        }
        if self.dirs {
            mode = mode | WalkMode::DIRS | WalkMode::NAMESPACES;
        }
        mode
    }
}

impl FromStr for GlobPattern {
    type Err = AssetError;

    fn from_str(s: &str) -> AssetResult<Self> {
        GlobPattern::new(s)
    }
}

impl fmt::Debug for GlobPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobPattern")
            .field("source", &self.source)
            .field("dir", &self.dir)
            .field("base", &self.base)
            .field("recursive", &self.recursive)
            .field("files", &self.files)
            .field("dirs", &self.dirs)
            .field("formatted", &self.formatter.is_some())
            .finish()
    }
}

/// Run `pattern` against `source`.
///
/// Results are filtered by type and name, formatted, then deduplicated by
/// final path with the first occurrence winning.
pub(crate) fn run<S: AssetSource + ?Sized>(
    source: &S,
    pattern: &GlobPattern,
    visit: &mut EntryVisitor<'_>,
) -> AssetResult<()> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut filter = |entry: Entry| -> AssetResult<Visit> {
        let allowed = if entry.is_dir() {
            pattern.allow_dirs()
        } else {
            pattern.allow_files()
        };
        if !allowed || !pattern.matches(entry.name()) {
            return Ok(Visit::Continue);
        }
        let path = pattern.format_path(entry.path());
        if !seen.insert(path.clone()) {
            return Ok(Visit::Continue);
        }
        visit(entry.with_path(path))
    };

    if pattern.is_recursive() {
        source.walk_info(pattern.dir(), pattern.walk_mode(), &mut filter)
    } else {
        source.glob_read_dir(pattern.dir(), !pattern.allow_dirs(), &mut filter)
    }
}
