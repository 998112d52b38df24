//! AssetFS - Layered virtual filesystem for named assets
//!
//! This library resolves logical asset paths against a tree of namespaces,
//! each backed by an ordered stack of directories, with per-request local
//! override directories and an embedded (compiled-in) backend that answers
//! exactly like the live one.
//!
//! ```no_run
//! use assetfs::{AssetFs, AssetSource, LookupContext, SourceDir};
//!
//! # fn main() -> assetfs::AssetResult<()> {
//! let fs = AssetFs::new();
//! fs.register_path("t/data")?;
//! fs.register_path("t/data2")?;
//! fs.namespace("z").register_path("t/ns")?;
//! fs.local_sources().register("my_dir", SourceDir::new("t/user_dir"));
//!
//! let ctx = LookupContext::new().with_local_names(["my_dir"]);
//! let bytes = fs.asset_in(&ctx, "z/sub-ns/nsf.txt")?;
//! # let _ = bytes;
//! # Ok(())
//! # }
//! ```

pub mod config;
mod dump;
pub mod embedded;
pub mod entry;
pub mod error;
pub mod export;
pub mod http;
pub mod local;
pub mod logging;
pub mod namespace;
pub mod path;
pub mod pattern;
pub mod source;
pub mod walk;

pub use embedded::{EmbeddedFs, EmbeddedNode, EmbeddedTree};
pub use entry::{Entry, FileType};
pub use error::{AssetError, AssetResult, UnsupportedReason};
pub use local::{LocalHit, LocalSource, LocalSources, LookupContext, SourceDir};
pub use namespace::{AssetFs, PathRegisterCallback, Plugin, RegisterOptions};
pub use pattern::{GlobPattern, PathFormatter};
pub use source::AssetSource;
pub use walk::{EntryVisitor, Visit, WalkMode};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
