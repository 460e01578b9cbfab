//! Local filesystem backend.
//!
//! Provides access to a host directory, with optional read-only mode.

use super::path;
use super::traits::{DirEntry, EntryType, FileSystem, Metadata, OpenOptions, Result, VirtualFile};
use crate::error::FsError;
use async_trait::async_trait;
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

/// Local filesystem backend.
///
/// All operations are relative to `root`. For example, if `root` is
/// `/home/amy/project`, then `open("src/main.rs")` opens
/// `/home/amy/project/src/main.rs`.
#[derive(Debug, Clone)]
pub struct LocalFs {
    root: PathBuf,
    read_only: bool,
}

impl LocalFs {
    /// Create a local filesystem rooted at an existing directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = dunce::canonicalize(root.as_ref())?;
        if !root.is_dir() {
            return Err(FsError::NotADirectory(root.display().to_string()));
        }
        Ok(Self {
            root,
            read_only: false,
        })
    }

    /// Create a read-only local filesystem.
    pub fn read_only(root: impl AsRef<Path>) -> Result<Self> {
        let mut fs = Self::new(root)?;
        fs.read_only = true;
        Ok(fs)
    }

    /// Get the canonical root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative path to a host path under the root.
    fn resolve(&self, path: &Path) -> Result<(PathBuf, PathBuf)> {
        let normalized = path::normalize(path)?;
        let full = self.root.join(&normalized);
        Ok((normalized, full))
    }

    fn check_writable(&self, normalized: &Path) -> Result<()> {
        if self.read_only {
            Err(FsError::ReadOnly(path::display(normalized)))
        } else {
            Ok(())
        }
    }
}

/// Attach the relative path to a host error before classifying it.
fn host_error(normalized: &Path) -> impl Fn(io::Error) -> FsError + '_ {
    move |e| FsError::from(io::Error::new(e.kind(), format!("{}: {}", path::display(normalized), e)))
}

fn convert_metadata(meta: &std::fs::Metadata) -> Metadata {
    let entry_type = if meta.file_type().is_symlink() {
        EntryType::Symlink
    } else if meta.is_dir() {
        EntryType::Directory
    } else {
        EntryType::File
    };

    #[cfg(unix)]
    let mode = {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & 0o7777
    };
    #[cfg(not(unix))]
    let mode = if meta.is_dir() { 0o755 } else { 0o644 };

    Metadata {
        entry_type,
        size: if meta.is_dir() { 0 } else { meta.len() },
        modified: meta.modified().ok(),
        mode,
    }
}

#[async_trait]
impl FileSystem for LocalFs {
    async fn open_file(&self, path: &Path, options: &OpenOptions) -> Result<Box<dyn VirtualFile>> {
        let (normalized, full) = self.resolve(path)?;
        if options.is_write() {
            self.check_writable(&normalized)?;
        }

        if let Ok(meta) = fs::metadata(&full).await {
            if meta.is_dir() {
                if options.is_create_new() {
                    return Err(FsError::AlreadyExists(path::display(&normalized)));
                }
                if options.is_write() {
                    return Err(FsError::NotAFile(path::display(&normalized)));
                }
                return Ok(Box::new(LocalDir {
                    fs: self.clone(),
                    path: normalized,
                }));
            }
        }

        let file = fs::OpenOptions::new()
            .read(options.is_read() || !options.is_write())
            .write(options.is_write() && !options.is_append())
            .append(options.is_append())
            .truncate(options.is_truncate())
            .create(options.is_create())
            .create_new(options.is_create_new())
            .open(&full)
            .await
            .map_err(host_error(&normalized))?;

        Ok(Box::new(LocalFile {
            path: normalized,
            file,
        }))
    }

    async fn stat(&self, path: &Path) -> Result<Metadata> {
        let (normalized, full) = self.resolve(path)?;
        let meta = fs::metadata(&full).await.map_err(host_error(&normalized))?;
        Ok(convert_metadata(&meta))
    }

    async fn lstat(&self, path: &Path) -> Result<Metadata> {
        let (normalized, full) = self.resolve(path)?;
        let meta = fs::symlink_metadata(&full)
            .await
            .map_err(host_error(&normalized))?;
        Ok(convert_metadata(&meta))
    }

    async fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let (normalized, full) = self.resolve(path)?;
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&full).await.map_err(host_error(&normalized))?;

        while let Some(entry) = dir.next_entry().await.map_err(host_error(&normalized))? {
            let meta = entry.metadata().await.map_err(host_error(&normalized))?;
            entries.push(DirEntry::new(
                entry.file_name().to_string_lossy().into_owned(),
                &convert_metadata(&meta),
            ));
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn mkdir(&self, path: &Path) -> Result<()> {
        let (normalized, full) = self.resolve(path)?;
        self.check_writable(&normalized)?;
        fs::create_dir(&full).await.map_err(host_error(&normalized))
    }

    async fn remove(&self, path: &Path) -> Result<()> {
        let (normalized, full) = self.resolve(path)?;
        self.check_writable(&normalized)?;
        if normalized.as_os_str().is_empty() {
            return Err(FsError::Conflict("cannot remove the root directory".to_string()));
        }

        let meta = fs::symlink_metadata(&full)
            .await
            .map_err(host_error(&normalized))?;
        if meta.is_dir() {
            fs::remove_dir(&full).await.map_err(host_error(&normalized))
        } else {
            fs::remove_file(&full).await.map_err(host_error(&normalized))
        }
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let (from_rel, from_full) = self.resolve(from)?;
        let (to_rel, to_full) = self.resolve(to)?;
        self.check_writable(&from_rel)?;
        if from_rel.as_os_str().is_empty() || to_rel.as_os_str().is_empty() {
            return Err(FsError::Conflict("cannot rename the root directory".to_string()));
        }
        fs::rename(&from_full, &to_full)
            .await
            .map_err(host_error(&from_rel))
    }

    #[cfg(unix)]
    async fn symlink(&self, target: &Path, link: &Path) -> Result<()> {
        let (normalized, full) = self.resolve(link)?;
        self.check_writable(&normalized)?;
        fs::symlink(target, &full).await.map_err(host_error(&normalized))
    }

    async fn read_link(&self, path: &Path) -> Result<PathBuf> {
        let (normalized, full) = self.resolve(path)?;
        fs::read_link(&full).await.map_err(host_error(&normalized))
    }

    fn read_only(&self) -> bool {
        self.read_only
    }
}

/// Open host file.
#[derive(Debug)]
pub struct LocalFile {
    path: PathBuf,
    file: fs::File,
}

impl LocalFile {
    fn err(&self) -> impl Fn(io::Error) -> FsError + '_ {
        host_error(&self.path)
    }
}

#[async_trait]
impl VirtualFile for LocalFile {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.file.read(buf).await.map_err(host_error(&self.path))?;
        Ok(n)
    }

    async fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let n = self.file.write(buf).await.map_err(host_error(&self.path))?;
        Ok(n)
    }

    async fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let saved = self.file.stream_position().await.map_err(self.err())?;
        self.file.seek(SeekFrom::Start(offset)).await.map_err(self.err())?;
        let result = self.file.read(buf).await.map_err(self.err());
        self.file.seek(SeekFrom::Start(saved)).await.map_err(self.err())?;
        result
    }

    async fn write_at(&mut self, buf: &[u8], offset: u64) -> Result<usize> {
        let saved = self.file.stream_position().await.map_err(self.err())?;
        self.file.seek(SeekFrom::Start(offset)).await.map_err(self.err())?;
        let result = self.file.write(buf).await.map_err(self.err());
        self.file.seek(SeekFrom::Start(saved)).await.map_err(self.err())?;
        result
    }

    async fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.file.seek(pos).await.map_err(self.err())
    }

    async fn stat(&self) -> Result<Metadata> {
        let meta = self.file.metadata().await.map_err(self.err())?;
        Ok(convert_metadata(&meta))
    }

    async fn set_len(&mut self, size: u64) -> Result<()> {
        self.file.set_len(size).await.map_err(self.err())
    }

    async fn close(&mut self) -> Result<()> {
        self.file.flush().await.map_err(self.err())
    }
}

/// Directory handle on a [`LocalFs`].
#[derive(Debug)]
pub struct LocalDir {
    fs: LocalFs,
    path: PathBuf,
}

impl LocalDir {
    fn not_a_file<T>(&self) -> Result<T> {
        Err(FsError::NotAFile(path::display(&self.path)))
    }
}

#[async_trait]
impl VirtualFile for LocalDir {
    async fn read(&mut self, _buf: &mut [u8]) -> Result<usize> {
        self.not_a_file()
    }

    async fn write(&mut self, _buf: &[u8]) -> Result<usize> {
        self.not_a_file()
    }

    async fn read_at(&mut self, _buf: &mut [u8], _offset: u64) -> Result<usize> {
        self.not_a_file()
    }

    async fn write_at(&mut self, _buf: &[u8], _offset: u64) -> Result<usize> {
        self.not_a_file()
    }

    async fn seek(&mut self, _pos: SeekFrom) -> Result<u64> {
        self.not_a_file()
    }

    async fn stat(&self) -> Result<Metadata> {
        self.fs.stat(&self.path).await
    }

    async fn set_len(&mut self, _size: u64) -> Result<()> {
        self.not_a_file()
    }

    async fn read_dir(&mut self) -> Result<Vec<DirEntry>> {
        self.fs.read_dir(&self.path).await
    }
}
