//! Error types for asset resolution.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for asset operations.
pub type AssetResult<T> = Result<T, AssetError>;

/// Why an operation is not supported on an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsupportedReason {
    /// The entry is a directory.
    IsDirectory,
    /// The entry is a namespace pseudo-directory.
    IsNamespace,
    /// The entry is a file where a directory was required.
    NotDirectory,
    /// The entry lives in a read-only embedded tree.
    Embedded,
}

impl fmt::Display for UnsupportedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnsupportedReason::IsDirectory => write!(f, "is a directory"),
            UnsupportedReason::IsNamespace => write!(f, "is a namespace"),
            UnsupportedReason::NotDirectory => write!(f, "is not a directory"),
            UnsupportedReason::Embedded => write!(f, "embedded assets are read-only"),
        }
    }
}

/// Errors that can occur while resolving or reading assets.
#[derive(Debug, Error)]
pub enum AssetError {
    /// The path is absent in every consulted source.
    #[error("asset not found: {0}")]
    NotFound(String),

    /// The operation cannot be performed on this kind of entry.
    #[error("{path}: {reason}")]
    Unsupported {
        path: String,
        reason: UnsupportedReason,
    },

    /// Underlying filesystem failure other than "absent".
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Malformed glob syntax.
    #[error("bad glob pattern {pattern:?}: {source}")]
    BadPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    /// A root directory passed to registration does not exist.
    #[error("root directory not found: {}", .0.display())]
    RootMissing(PathBuf),

    /// Embedded tree could not be encoded or decoded.
    #[error("embedded tree codec error: {0}")]
    Codec(String),
}

impl AssetError {
    /// Build an I/O error bound to a physical path.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        AssetError::Io {
            path: path.into(),
            source,
        }
    }

    /// Build an unsupported-operation error.
    pub fn unsupported(path: impl Into<String>, reason: UnsupportedReason) -> Self {
        AssetError::Unsupported {
            path: path.into(),
            reason,
        }
    }

    /// True for [`AssetError::NotFound`], the only error provider chaining skips over.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AssetError::NotFound(_))
    }
}

/// True when a stat/open error means "nothing there" rather than a failure.
pub(crate) fn is_absent(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = AssetError::NotFound("z/a.txt".to_string());
        assert_eq!(err.to_string(), "asset not found: z/a.txt");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_unsupported_display() {
        let err = AssetError::unsupported("z", UnsupportedReason::IsNamespace);
        assert_eq!(err.to_string(), "z: is a namespace");
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_io_error_keeps_source() {
        use std::error::Error;

        let err = AssetError::io(
            "/tmp/x",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("/tmp/x"));
        assert!(err.source().is_some());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_is_absent() {
        assert!(is_absent(&io::Error::from(io::ErrorKind::NotFound)));
        assert!(!is_absent(&io::Error::from(io::ErrorKind::PermissionDenied)));
    }
}
