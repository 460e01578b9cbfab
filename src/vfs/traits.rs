//! Core AFC traits and types.

use crate::error::FsError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

pub type Result<T> = std::result::Result<T, FsError>;

/// Type of directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryType {
    File,
    Directory,
    Symlink,
}

/// Metadata about a file or directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub entry_type: EntryType,
    /// Size in bytes (0 for directories).
    pub size: u64,
    pub modified: Option<SystemTime>,
    /// Permission bits, passed through untouched.
    pub mode: u32,
}

impl Metadata {
    pub fn file(size: u64) -> Self {
        Self {
            entry_type: EntryType::File,
            size,
            modified: None,
            mode: 0o644,
        }
    }

    pub fn directory() -> Self {
        Self {
            entry_type: EntryType::Directory,
            size: 0,
            modified: None,
            mode: 0o755,
        }
    }

    pub fn with_modified(mut self, modified: SystemTime) -> Self {
        self.modified = Some(modified);
        self
    }

    pub fn is_dir(&self) -> bool {
        self.entry_type == EntryType::Directory
    }

    pub fn is_file(&self) -> bool {
        self.entry_type == EntryType::File
    }

    pub fn is_symlink(&self) -> bool {
        self.entry_type == EntryType::Symlink
    }
}

/// A directory entry returned by `read_dir`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Name of the entry (not full path).
    pub name: String,
    pub entry_type: EntryType,
    pub size: u64,
}

impl DirEntry {
    pub fn new(name: impl Into<String>, metadata: &Metadata) -> Self {
        Self {
            name: name.into(),
            entry_type: metadata.entry_type,
            size: metadata.size,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.entry_type == EntryType::Directory
    }
}

/// Flags for [`FileSystem::open_file`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenOptions {
    read: bool,
    write: bool,
    append: bool,
    truncate: bool,
    create: bool,
    create_new: bool,
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options used by [`FileSystem::open`].
    pub fn read_only() -> Self {
        Self::new().read(true)
    }

    /// Options used by [`FileSystem::create`].
    pub fn create_truncate() -> Self {
        Self::new().read(true).write(true).create(true).truncate(true)
    }

    pub fn read(mut self, read: bool) -> Self {
        self.read = read;
        self
    }

    pub fn write(mut self, write: bool) -> Self {
        self.write = write;
        self
    }

    pub fn append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    pub fn truncate(mut self, truncate: bool) -> Self {
        self.truncate = truncate;
        self
    }

    pub fn create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    pub fn create_new(mut self, create_new: bool) -> Self {
        self.create_new = create_new;
        self
    }

    pub fn is_read(&self) -> bool {
        self.read
    }

    pub fn is_append(&self) -> bool {
        self.append
    }

    pub fn is_truncate(&self) -> bool {
        self.truncate
    }

    pub fn is_create(&self) -> bool {
        self.create
    }

    pub fn is_create_new(&self) -> bool {
        self.create_new
    }

    /// True when the handle may modify the file. Append, truncate and creation all imply it.
    pub fn is_write(&self) -> bool {
        self.write || self.append || self.truncate || self.create || self.create_new
    }
}

/// An open file or directory handle.
///
/// Handles own their position. Dropping a handle releases it; `close` exists so callers
/// can observe errors from a final flush.
#[async_trait]
pub trait VirtualFile: fmt::Debug + Send + Sync {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    async fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Positional read; leaves the handle position untouched.
    async fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize>;

    /// Positional write; leaves the handle position untouched.
    async fn write_at(&mut self, buf: &[u8], offset: u64) -> Result<usize>;

    async fn seek(&mut self, pos: SeekFrom) -> Result<u64>;

    async fn stat(&self) -> Result<Metadata>;

    async fn set_len(&mut self, size: u64) -> Result<()>;

    /// List a directory handle. File handles answer `NotADirectory`.
    async fn read_dir(&mut self) -> Result<Vec<DirEntry>> {
        Err(FsError::NotADirectory("handle is not a directory".to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Abstract filesystem contract.
///
/// All operations use paths relative to the filesystem root; see [`super::path`] for the
/// normalization rules. Implementations are shared as `Arc<dyn FileSystem>` and composed
/// at runtime.
#[async_trait]
pub trait FileSystem: fmt::Debug + Send + Sync {
    async fn open_file(&self, path: &Path, options: &OpenOptions) -> Result<Box<dyn VirtualFile>>;

    async fn stat(&self, path: &Path) -> Result<Metadata>;

    /// List entries in a directory, sorted by name.
    async fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>>;

    /// Create a single directory. The parent must exist.
    async fn mkdir(&self, path: &Path) -> Result<()>;

    /// Remove a file or empty directory.
    async fn remove(&self, path: &Path) -> Result<()>;

    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Open for reading.
    async fn open(&self, path: &Path) -> Result<Box<dyn VirtualFile>> {
        self.open_file(path, &OpenOptions::read_only()).await
    }

    /// Create or truncate a file for writing.
    async fn create(&self, path: &Path) -> Result<Box<dyn VirtualFile>> {
        self.open_file(path, &OpenOptions::create_truncate()).await
    }

    /// Metadata without following a final symlink.
    async fn lstat(&self, path: &Path) -> Result<Metadata> {
        self.stat(path).await
    }

    /// Create a directory along with any missing ancestors.
    async fn mkdir_all(&self, path: &Path) -> Result<()> {
        let mut current = PathBuf::new();
        for segment in super::path::segments(path)? {
            current.push(segment);
            match self.mkdir(&current).await {
                Ok(()) => {}
                Err(FsError::AlreadyExists(_)) => {
                    if !self.stat(&current).await?.is_dir() {
                        return Err(FsError::NotADirectory(current.display().to_string()));
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Remove a path and everything below it. A missing path is not an error.
    async fn remove_all(&self, path: &Path) -> Result<()> {
        let metadata = match self.lstat(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        };
        if metadata.is_dir() {
            for entry in self.read_dir(path).await? {
                self.remove_all(&path.join(&entry.name)).await?;
            }
        }
        if super::path::is_root(path) {
            return Ok(());
        }
        self.remove(path).await
    }

    async fn symlink(&self, _target: &Path, _link: &Path) -> Result<()> {
        Err(FsError::Unsupported("symlink"))
    }

    async fn read_link(&self, _path: &Path) -> Result<PathBuf> {
        Err(FsError::Unsupported("readlink"))
    }

    async fn temp_file(&self, _dir: &Path, _prefix: &str) -> Result<(PathBuf, Box<dyn VirtualFile>)> {
        Err(FsError::Unsupported("temp file"))
    }

    /// Returns true if every mutation on this filesystem fails with `ReadOnly`.
    fn read_only(&self) -> bool {
        false
    }
}
