//! Resolved asset descriptors.
//!
//! An [`Entry`] is what every lookup and traversal hands back: a logical
//! path plus enough backing information to read the asset, list it when it
//! is a directory, or point at the physical file behind it.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Cursor, Read, Write};
use std::ops::BitOr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::embedded::{self, EmbeddedNode, EmbeddedTree};
use crate::error::{AssetError, AssetResult, UnsupportedReason};
use crate::namespace::AssetFs;
use crate::path;
use crate::walk::{self, EntryVisitor, Visit};

/// Bit set describing what kind of asset an entry is.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FileType(u8);

impl FileType {
    pub const NAMESPACE: FileType = FileType(1 << 0);
    pub const NORMAL: FileType = FileType(1 << 1);
    pub const DIR: FileType = FileType(1 << 2);
    pub const REAL: FileType = FileType(1 << 3);
    pub const EMBEDDED: FileType = FileType(1 << 4);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: FileType) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_namespace(self) -> bool {
        self.contains(Self::NAMESPACE)
    }

    pub fn is_dir(self) -> bool {
        self.contains(Self::DIR) || self.is_namespace()
    }

    pub fn is_real(self) -> bool {
        self.contains(Self::REAL)
    }

    pub fn is_embedded(self) -> bool {
        self.contains(Self::EMBEDDED)
    }

    /// Two-letter code: kind (`n`, `d`, `f`) then backing (`r`, `e`).
    /// Unknown positions print as `o`.
    pub fn code(self) -> [char; 2] {
        let kind = if self.is_namespace() {
            'n'
        } else if self.contains(Self::DIR) {
            'd'
        } else if self.contains(Self::NORMAL) {
            'f'
        } else {
            'o'
        };
        let backing = if self.is_real() {
            'r'
        } else if self.is_embedded() {
            'e'
        } else {
            'o'
        };
        [kind, backing]
    }

    /// Parse the textual form `"fr://path"` back into a type and a path.
    pub fn parse(text: &str) -> Option<(FileType, &str)> {
        let (code, rest) = text.split_once("://")?;
        let mut chars = code.chars();
        let kind = match chars.next()? {
            'n' => FileType::NAMESPACE,
            'd' => FileType::DIR,
            'f' => FileType::NORMAL,
            'o' => FileType::default(),
            _ => return None,
        };
        let backing = match chars.next()? {
            'r' => FileType::REAL,
            'e' => FileType::EMBEDDED,
            'o' => FileType::default(),
            _ => return None,
        };
        if chars.next().is_some() {
            return None;
        }
        Some((kind | backing, rest))
    }
}

impl BitOr for FileType {
    type Output = FileType;

    fn bitor(self, rhs: FileType) -> FileType {
        FileType(self.0 | rhs.0)
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [kind, backing] = self.code();
        write!(f, "{}{}", kind, backing)
    }
}

impl fmt::Debug for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileType({})", self)
    }
}

#[derive(Clone)]
pub(crate) enum Backing {
    RealFile {
        real_path: PathBuf,
    },
    RealDir {
        real_path: PathBuf,
    },
    Namespace {
        fs: AssetFs,
    },
    EmbeddedFile {
        tree: Arc<EmbeddedTree>,
        key: String,
        source: Option<PathBuf>,
    },
    EmbeddedDir {
        tree: Arc<EmbeddedTree>,
        key: String,
        source: Option<PathBuf>,
        namespace: bool,
    },
}

/// A resolved asset: file, directory or namespace.
#[derive(Clone)]
pub struct Entry {
    path: String,
    size: u64,
    modified: SystemTime,
    backing: Backing,
}

/// Modification time reported for namespace pseudo-directories.
fn process_start() -> SystemTime {
    static START: OnceLock<SystemTime> = OnceLock::new();
    *START.get_or_init(SystemTime::now)
}

impl Entry {
    pub(crate) fn real(path: String, real_path: PathBuf, metadata: &fs::Metadata) -> Self {
        let modified = metadata.modified().unwrap_or(UNIX_EPOCH);
        let backing = if metadata.is_dir() {
            Backing::RealDir { real_path }
        } else {
            Backing::RealFile { real_path }
        };
        Entry {
            path,
            size: if metadata.is_dir() { 0 } else { metadata.len() },
            modified,
            backing,
        }
    }

    pub(crate) fn namespace(path: String, fs: AssetFs) -> Self {
        Entry {
            path,
            size: 0,
            modified: process_start(),
            backing: Backing::Namespace { fs },
        }
    }

    pub(crate) fn embedded(path: String, tree: Arc<EmbeddedTree>, key: String) -> Option<Self> {
        let (size, modified, backing) = match tree.get(&key)? {
            EmbeddedNode::File {
                data,
                modified_secs,
                source,
            } => (
                data.len() as u64,
                UNIX_EPOCH + Duration::from_secs(*modified_secs),
                Backing::EmbeddedFile {
                    source: source.clone(),
                    tree: tree.clone(),
                    key,
                },
            ),
            EmbeddedNode::Dir {
                source, namespace, ..
            } => (
                0,
                tree.created_at(),
                Backing::EmbeddedDir {
                    source: source.clone(),
                    tree: tree.clone(),
                    key,
                    namespace: *namespace,
                },
            ),
        };
        Some(Entry {
            path,
            size,
            modified,
            backing,
        })
    }

    /// Same entry under another logical path.
    pub(crate) fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Logical path relative to the namespace that produced the entry.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last path segment.
    pub fn name(&self) -> &str {
        path::base_name(&self.path)
    }

    /// Size in bytes; zero for directories.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn modified(&self) -> SystemTime {
        self.modified
    }

    pub fn is_dir(&self) -> bool {
        !matches!(
            self.backing,
            Backing::RealFile { .. } | Backing::EmbeddedFile { .. }
        )
    }

    pub fn is_namespace(&self) -> bool {
        matches!(
            self.backing,
            Backing::Namespace { .. } | Backing::EmbeddedDir { namespace: true, .. }
        )
    }

    pub fn file_type(&self) -> FileType {
        match &self.backing {
            Backing::RealFile { .. } => FileType::NORMAL | FileType::REAL,
            Backing::RealDir { .. } => FileType::DIR | FileType::REAL,
            Backing::Namespace { .. } => FileType::NAMESPACE,
            Backing::EmbeddedFile { .. } => FileType::NORMAL | FileType::EMBEDDED,
            Backing::EmbeddedDir {
                namespace: true, ..
            } => FileType::NAMESPACE | FileType::EMBEDDED,
            Backing::EmbeddedDir { .. } => FileType::DIR | FileType::EMBEDDED,
        }
    }

    /// Physical path behind the entry.
    ///
    /// Embedded entries report the path they were compiled from; namespaces
    /// have none.
    pub fn real_path(&self) -> Option<&Path> {
        match &self.backing {
            Backing::RealFile { real_path } | Backing::RealDir { real_path } => Some(real_path),
            Backing::EmbeddedFile { source, .. } | Backing::EmbeddedDir { source, .. } => {
                source.as_deref()
            }
            Backing::Namespace { .. } => None,
        }
    }

    /// The namespace behind a namespace entry.
    pub fn as_namespace(&self) -> Option<&AssetFs> {
        match &self.backing {
            Backing::Namespace { fs } => Some(fs),
            _ => None,
        }
    }

    fn not_a_file(&self) -> AssetError {
        let reason = if self.is_namespace() {
            UnsupportedReason::IsNamespace
        } else {
            UnsupportedReason::IsDirectory
        };
        AssetError::unsupported(self.path.clone(), reason)
    }

    /// Open the content for reading.
    pub fn reader(&self) -> AssetResult<Box<dyn Read + Send>> {
        match &self.backing {
            Backing::RealFile { real_path } => {
                let file = fs::File::open(real_path).map_err(|e| AssetError::io(real_path, e))?;
                Ok(Box::new(file))
            }
            Backing::EmbeddedFile { tree, key, .. } => match tree.get(key) {
                Some(EmbeddedNode::File { data, .. }) => Ok(Box::new(Cursor::new(data.clone()))),
                _ => Err(AssetError::NotFound(self.path.clone())),
            },
            _ => Err(self.not_a_file()),
        }
    }

    /// Full content.
    pub fn data(&self) -> AssetResult<Vec<u8>> {
        match &self.backing {
            Backing::RealFile { real_path } => {
                fs::read(real_path).map_err(|e| AssetError::io(real_path, e))
            }
            Backing::EmbeddedFile { tree, key, .. } => match tree.get(key) {
                Some(EmbeddedNode::File { data, .. }) => Ok(data.clone()),
                _ => Err(AssetError::NotFound(self.path.clone())),
            },
            _ => Err(self.not_a_file()),
        }
    }

    /// Full content as UTF-8 text.
    pub fn data_string(&self) -> AssetResult<String> {
        let data = self.data()?;
        String::from_utf8(data).map_err(|e| {
            AssetError::io(
                self.real_path().unwrap_or(Path::new(&self.path)),
                io::Error::new(io::ErrorKind::InvalidData, e),
            )
        })
    }

    fn open_for_write(&self, append: bool) -> AssetResult<Box<dyn Write + Send>> {
        match &self.backing {
            Backing::RealFile { real_path } => {
                let mut options = OpenOptions::new();
                if append {
                    options.append(true);
                } else {
                    options.write(true).truncate(true);
                }
                let file = options
                    .open(real_path)
                    .map_err(|e| AssetError::io(real_path, e))?;
                Ok(Box::new(file))
            }
            Backing::EmbeddedFile { .. }
            | Backing::EmbeddedDir {
                namespace: false, ..
            } => Err(AssetError::unsupported(
                self.path.clone(),
                UnsupportedReason::Embedded,
            )),
            _ => Err(self.not_a_file()),
        }
    }

    /// Truncate and open the physical file for writing.
    pub fn writer(&self) -> AssetResult<Box<dyn Write + Send>> {
        self.open_for_write(false)
    }

    /// Open the physical file for appending.
    pub fn appender(&self) -> AssetResult<Box<dyn Write + Send>> {
        self.open_for_write(true)
    }

    /// List the direct children of a directory entry.
    ///
    /// Child paths are this entry's path joined with the child name.
    pub fn read_dir(&self, visit: &mut EntryVisitor<'_>) -> AssetResult<()> {
        match &self.backing {
            Backing::RealDir { real_path } => {
                for item in walk::list_dir_sorted(real_path)? {
                    let entry = Entry::real(
                        path::join(&self.path, &item.name),
                        item.real_path,
                        &item.metadata,
                    );
                    if visit(entry)? == Visit::Stop {
                        break;
                    }
                }
                Ok(())
            }
            Backing::Namespace { fs } => {
                let prefix = self.path.as_str();
                // Listed through the owning node so that parent roots filing
                // content under the namespace name are included.
                match fs.parent().filter(|_| !path::is_root(prefix)) {
                    Some(owner) => {
                        let name = fs.name();
                        owner.read_dir_node(&name, false, true, false, &mut |entry: Entry| {
                            match path::strip_prefix(entry.path(), &name) {
                                Some(rel) => visit(entry.with_path(path::join(prefix, &rel))),
                                None => Ok(Visit::Continue),
                            }
                        })?;
                    }
                    None => {
                        fs.read_dir_node(path::ROOT, false, true, false, &mut |entry: Entry| {
                            let joined = path::join(prefix, entry.path());
                            visit(entry.with_path(joined))
                        })?;
                    }
                }
                Ok(())
            }
            Backing::EmbeddedDir { tree, key, .. } => {
                embedded::read_dir_node(tree, key, &self.path, false, visit)?;
                Ok(())
            }
            Backing::RealFile { .. } | Backing::EmbeddedFile { .. } => Err(
                AssetError::unsupported(self.path.clone(), UnsupportedReason::NotDirectory),
            ),
        }
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.file_type(), self.path)
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("path", &self.path)
            .field("type", &self.file_type())
            .field("size", &self.size)
            .field("real_path", &self.real_path())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn real_entry(temp: &TempDir, rel: &str) -> Entry {
        let real = temp.path().join(rel);
        let md = fs::metadata(&real).unwrap();
        Entry::real(rel.to_string(), real, &md)
    }

    #[test]
    fn test_file_type_codes() {
        assert_eq!((FileType::NORMAL | FileType::REAL).to_string(), "fr");
        assert_eq!((FileType::DIR | FileType::EMBEDDED).to_string(), "de");
        assert_eq!(FileType::NAMESPACE.to_string(), "no");
        assert_eq!(FileType::default().to_string(), "oo");
    }

    #[test]
    fn test_file_type_parse() {
        let (ft, path) = FileType::parse("fr://a/b.txt").unwrap();
        assert_eq!(ft, FileType::NORMAL | FileType::REAL);
        assert_eq!(path, "a/b.txt");
        assert!(FileType::parse("xx://a").is_none());
        assert!(FileType::parse("no-scheme").is_none());
    }

    #[test]
    fn test_real_file_entry() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "hello").unwrap();

        let entry = real_entry(&temp, "a.txt");
        assert!(!entry.is_dir());
        assert_eq!(entry.size(), 5);
        assert_eq!(entry.name(), "a.txt");
        assert_eq!(entry.data_string().unwrap(), "hello");
        assert_eq!(entry.to_string(), "fr://a.txt");
        assert_eq!(entry.real_path(), Some(temp.path().join("a.txt").as_path()));

        let mut content = String::new();
        entry.reader().unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "hello");
    }

    #[test]
    fn test_writer_and_appender() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "old content").unwrap();
        let entry = real_entry(&temp, "a.txt");

        entry.writer().unwrap().write_all(b"new").unwrap();
        entry.appender().unwrap().write_all(b"+tail").unwrap();

        assert_eq!(fs::read_to_string(temp.path().join("a.txt")).unwrap(), "new+tail");
    }

    #[test]
    fn test_directory_refuses_content() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("d")).unwrap();
        let entry = real_entry(&temp, "d");

        assert!(entry.is_dir());
        assert_eq!(entry.size(), 0);
        assert!(matches!(
            entry.data(),
            Err(AssetError::Unsupported {
                reason: UnsupportedReason::IsDirectory,
                ..
            })
        ));
        assert!(entry.reader().is_err());
        assert!(entry.writer().is_err());
    }

    #[test]
    fn test_real_dir_read_dir() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("d/sub")).unwrap();
        fs::write(temp.path().join("d/b.txt"), "b").unwrap();
        fs::write(temp.path().join("d/a.txt"), "a").unwrap();
        let entry = real_entry(&temp, "d");

        let mut names = Vec::new();
        entry
            .read_dir(&mut |e: Entry| {
                names.push(e.path().to_string());
                Ok(Visit::Continue)
            })
            .unwrap();
        assert_eq!(names, vec!["d/a.txt", "d/b.txt", "d/sub"]);
    }

    #[test]
    fn test_file_read_dir_is_unsupported() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "a").unwrap();
        let entry = real_entry(&temp, "a.txt");
        let err = entry.read_dir(&mut |_| Ok(Visit::Continue)).unwrap_err();
        assert!(matches!(
            err,
            AssetError::Unsupported {
                reason: UnsupportedReason::NotDirectory,
                ..
            }
        ));
    }
}
