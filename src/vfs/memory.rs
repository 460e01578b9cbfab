//! In-memory filesystem implementation.
//!
//! Used as the scratch upper layer of overlays and throughout the tests. All data is
//! ephemeral. Cloning a `MemoryFs` shares the underlying tree.

use super::path;
use super::traits::{DirEntry, FileSystem, Metadata, OpenOptions, Result, VirtualFile};
use crate::error::FsError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

#[derive(Debug)]
struct FileData {
    bytes: Vec<u8>,
    modified: SystemTime,
}

impl FileData {
    fn metadata(&self) -> Metadata {
        Metadata::file(self.bytes.len() as u64).with_modified(self.modified)
    }
}

/// Entry in the memory filesystem.
#[derive(Debug, Clone)]
enum Entry {
    File(Arc<RwLock<FileData>>),
    Directory { modified: SystemTime },
}

impl Entry {
    fn new_directory() -> Self {
        Entry::Directory {
            modified: SystemTime::now(),
        }
    }

    fn metadata(&self) -> Metadata {
        match self {
            Entry::File(data) => data.read().metadata(),
            Entry::Directory { modified } => Metadata::directory().with_modified(*modified),
        }
    }
}

type Entries = BTreeMap<PathBuf, Entry>;

/// In-memory filesystem.
///
/// Thread-safe via an internal `RwLock`. Parents are never created implicitly.
#[derive(Debug, Clone)]
pub struct MemoryFs {
    entries: Arc<RwLock<Entries>>,
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFs {
    /// Create a new empty in-memory filesystem.
    pub fn new() -> Self {
        let mut entries = BTreeMap::new();
        // Root directory always exists
        entries.insert(PathBuf::new(), Entry::new_directory());
        Self {
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    /// Number of entries, root included.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    fn children<'a>(entries: &'a Entries, dir: &'a Path) -> impl Iterator<Item = (&'a PathBuf, &'a Entry)> + 'a {
        entries
            .iter()
            .filter(move |(p, _)| !p.as_os_str().is_empty() && p.parent() == Some(dir))
    }

    /// Error for a path with no entry: `NotADirectory` when the walk runs through a file.
    fn missing(entries: &Entries, normalized: &Path) -> FsError {
        for ancestor in normalized.ancestors().skip(1) {
            if let Some(Entry::File(_)) = entries.get(ancestor) {
                return FsError::NotADirectory(path::display(ancestor));
            }
        }
        FsError::not_found(path::display(normalized))
    }

    /// The parent of `normalized` must exist and be a directory.
    fn check_parent(entries: &Entries, normalized: &Path) -> Result<()> {
        let Some(parent) = path::parent(normalized) else {
            return Ok(());
        };
        match entries.get(parent) {
            Some(Entry::Directory { .. }) => Ok(()),
            Some(Entry::File(_)) => Err(FsError::NotADirectory(path::display(parent))),
            None => Err(Self::missing(entries, parent)),
        }
    }
}

#[async_trait]
impl FileSystem for MemoryFs {
    async fn open_file(&self, path: &Path, options: &OpenOptions) -> Result<Box<dyn VirtualFile>> {
        let normalized = path::normalize(path)?;
        let mut entries = self.entries.write();

        let data = match entries.get(&normalized) {
            Some(Entry::Directory { .. }) => {
                if options.is_create_new() {
                    return Err(FsError::AlreadyExists(path::display(&normalized)));
                }
                if options.is_write() {
                    return Err(FsError::NotAFile(path::display(&normalized)));
                }
                return Ok(Box::new(MemoryDir {
                    fs: self.clone(),
                    path: normalized,
                }));
            }
            Some(Entry::File(data)) => {
                if options.is_create_new() {
                    return Err(FsError::AlreadyExists(path::display(&normalized)));
                }
                if options.is_truncate() {
                    let mut file = data.write();
                    file.bytes.clear();
                    file.modified = SystemTime::now();
                }
                data.clone()
            }
            None => {
                if !options.is_create() && !options.is_create_new() {
                    return Err(Self::missing(&entries, &normalized));
                }
                Self::check_parent(&entries, &normalized)?;
                let data = Arc::new(RwLock::new(FileData {
                    bytes: Vec::new(),
                    modified: SystemTime::now(),
                }));
                entries.insert(normalized.clone(), Entry::File(data.clone()));
                data
            }
        };

        Ok(Box::new(MemoryFile {
            path: normalized,
            data,
            pos: 0,
            readable: options.is_read() || !options.is_write(),
            writable: options.is_write(),
            append: options.is_append(),
        }))
    }

    async fn stat(&self, path: &Path) -> Result<Metadata> {
        let normalized = path::normalize(path)?;
        let entries = self.entries.read();
        entries
            .get(&normalized)
            .map(Entry::metadata)
            .ok_or_else(|| Self::missing(&entries, &normalized))
    }

    async fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let normalized = path::normalize(path)?;
        let entries = self.entries.read();

        match entries.get(&normalized) {
            Some(Entry::Directory { .. }) => {}
            Some(Entry::File(_)) => return Err(FsError::NotADirectory(path::display(&normalized))),
            None => return Err(Self::missing(&entries, &normalized)),
        }

        // BTreeMap iteration is already sorted by path, so siblings come out in name order
        let result = Self::children(&entries, &normalized)
            .map(|(p, entry)| DirEntry::new(path::file_name(p), &entry.metadata()))
            .collect();
        Ok(result)
    }

    async fn mkdir(&self, path: &Path) -> Result<()> {
        let normalized = path::normalize(path)?;
        let mut entries = self.entries.write();

        if entries.contains_key(&normalized) {
            return Err(FsError::AlreadyExists(path::display(&normalized)));
        }
        Self::check_parent(&entries, &normalized)?;
        entries.insert(normalized, Entry::new_directory());
        Ok(())
    }

    async fn remove(&self, path: &Path) -> Result<()> {
        let normalized = path::normalize(path)?;
        if normalized.as_os_str().is_empty() {
            return Err(FsError::Conflict("cannot remove the root directory".to_string()));
        }

        let mut entries = self.entries.write();
        match entries.get(&normalized) {
            None => return Err(Self::missing(&entries, &normalized)),
            Some(Entry::Directory { .. }) => {
                if Self::children(&entries, &normalized).next().is_some() {
                    return Err(FsError::Conflict(format!(
                        "directory not empty: {}",
                        normalized.display()
                    )));
                }
            }
            Some(Entry::File(_)) => {}
        }
        entries.remove(&normalized);
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let from = path::normalize(from)?;
        let to = path::normalize(to)?;
        if from.as_os_str().is_empty() || to.as_os_str().is_empty() {
            return Err(FsError::Conflict("cannot rename the root directory".to_string()));
        }
        if from == to {
            return Ok(());
        }
        if to.starts_with(&from) {
            return Err(FsError::InvalidPath(format!(
                "cannot move {} inside itself",
                from.display()
            )));
        }

        let mut entries = self.entries.write();
        let source_is_dir = match entries.get(&from) {
            Some(entry) => matches!(entry, Entry::Directory { .. }),
            None => return Err(Self::missing(&entries, &from)),
        };
        Self::check_parent(&entries, &to)?;

        match entries.get(&to) {
            Some(Entry::Directory { .. }) => {
                if !source_is_dir {
                    return Err(FsError::NotAFile(to.display().to_string()));
                }
                if Self::children(&entries, &to).next().is_some() {
                    return Err(FsError::Conflict(format!(
                        "directory not empty: {}",
                        to.display()
                    )));
                }
            }
            Some(Entry::File(_)) if source_is_dir => {
                return Err(FsError::NotADirectory(to.display().to_string()));
            }
            _ => {}
        }

        let moved: Vec<PathBuf> = entries
            .keys()
            .filter(|p| p.starts_with(&from))
            .cloned()
            .collect();
        for old in moved {
            if let Some(entry) = entries.remove(&old) {
                let suffix = old.strip_prefix(&from).unwrap_or(Path::new(""));
                entries.insert(to.join(suffix), entry);
            }
        }
        Ok(())
    }

    async fn temp_file(&self, dir: &Path, prefix: &str) -> Result<(PathBuf, Box<dyn VirtualFile>)> {
        let dir = path::normalize(dir)?;
        for attempt in 0u32.. {
            let candidate = dir.join(format!("{}{:08x}", prefix, attempt));
            match self
                .open_file(&candidate, &OpenOptions::new().read(true).write(true).create_new(true))
                .await
            {
                Ok(file) => return Ok((candidate, file)),
                Err(FsError::AlreadyExists(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(FsError::Conflict("temporary names exhausted".to_string()))
    }
}

/// Open file handle on a [`MemoryFs`].
///
/// Holds the file's storage directly, so it stays usable after a rename or remove.
#[derive(Debug)]
pub struct MemoryFile {
    path: PathBuf,
    data: Arc<RwLock<FileData>>,
    pos: u64,
    readable: bool,
    writable: bool,
    append: bool,
}

impl MemoryFile {
    fn check_readable(&self) -> Result<()> {
        if self.readable {
            Ok(())
        } else {
            Err(FsError::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{} not opened for reading", self.path.display()),
            )))
        }
    }

    fn check_writable(&self) -> Result<()> {
        if self.writable {
            Ok(())
        } else {
            Err(FsError::ReadOnly(format!(
                "{} not opened for writing",
                self.path.display()
            )))
        }
    }

    fn copy_out(bytes: &[u8], buf: &mut [u8], offset: u64) -> usize {
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(bytes.len());
        let n = buf.len().min(bytes.len() - start);
        buf[..n].copy_from_slice(&bytes[start..start + n]);
        n
    }

    fn copy_in(&self, file: &mut FileData, buf: &[u8], offset: u64) -> Result<()> {
        let end = usize::try_from(offset)
            .ok()
            .and_then(|start| start.checked_add(buf.len()))
            .ok_or_else(|| self.too_large(offset.saturating_add(buf.len() as u64)))?;
        self.grow(file, end)?;
        file.bytes[end - buf.len()..end].copy_from_slice(buf);
        file.modified = SystemTime::now();
        Ok(())
    }

    /// Extend `file` with zeroes up to `len`, failing instead of aborting on allocation.
    fn grow(&self, file: &mut FileData, len: usize) -> Result<()> {
        if let Some(additional) = len.checked_sub(file.bytes.len()) {
            file.bytes
                .try_reserve(additional)
                .map_err(|_| self.too_large(len as u64))?;
            file.bytes.resize(len, 0);
        }
        Ok(())
    }

    fn too_large(&self, len: u64) -> FsError {
        FsError::Io(io::Error::new(
            io::ErrorKind::OutOfMemory,
            format!("{} cannot grow to {} bytes", self.path.display(), len),
        ))
    }
}

#[async_trait]
impl VirtualFile for MemoryFile {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.check_readable()?;
        let n = Self::copy_out(&self.data.read().bytes, buf, self.pos);
        self.pos += n as u64;
        Ok(n)
    }

    async fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.check_writable()?;
        let data = self.data.clone();
        let mut file = data.write();
        if self.append {
            self.pos = file.bytes.len() as u64;
        }
        self.copy_in(&mut file, buf, self.pos)?;
        self.pos += buf.len() as u64;
        Ok(buf.len())
    }

    async fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize> {
        self.check_readable()?;
        Ok(Self::copy_out(&self.data.read().bytes, buf, offset))
    }

    async fn write_at(&mut self, buf: &[u8], offset: u64) -> Result<usize> {
        self.check_writable()?;
        self.copy_in(&mut self.data.write(), buf, offset)?;
        Ok(buf.len())
    }

    async fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let len = self.data.read().bytes.len() as u64;
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => len.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };
        let Some(target) = target else {
            return Err(FsError::InvalidPath(format!(
                "seek out of range in {}",
                self.path.display()
            )));
        };
        self.pos = target;
        Ok(self.pos)
    }

    async fn stat(&self) -> Result<Metadata> {
        Ok(self.data.read().metadata())
    }

    async fn set_len(&mut self, size: u64) -> Result<()> {
        self.check_writable()?;
        let len = usize::try_from(size).map_err(|_| self.too_large(size))?;
        let data = self.data.clone();
        let mut file = data.write();
        if len < file.bytes.len() {
            file.bytes.truncate(len);
        } else {
            self.grow(&mut file, len)?;
        }
        file.modified = SystemTime::now();
        Ok(())
    }
}

/// Directory handle on a [`MemoryFs`]; lists live contents on every call.
#[derive(Debug)]
pub struct MemoryDir {
    fs: MemoryFs,
    path: PathBuf,
}

#[async_trait]
impl VirtualFile for MemoryDir {
    async fn read(&mut self, _buf: &mut [u8]) -> Result<usize> {
        Err(FsError::NotAFile(path::display(&self.path)))
    }

    async fn write(&mut self, _buf: &[u8]) -> Result<usize> {
        Err(FsError::NotAFile(path::display(&self.path)))
    }

    async fn read_at(&mut self, _buf: &mut [u8], _offset: u64) -> Result<usize> {
        Err(FsError::NotAFile(path::display(&self.path)))
    }

    async fn write_at(&mut self, _buf: &[u8], _offset: u64) -> Result<usize> {
        Err(FsError::NotAFile(path::display(&self.path)))
    }

    async fn seek(&mut self, _pos: SeekFrom) -> Result<u64> {
        Err(FsError::NotAFile(path::display(&self.path)))
    }

    async fn stat(&self) -> Result<Metadata> {
        self.fs.stat(&self.path).await
    }

    async fn set_len(&mut self, _size: u64) -> Result<()> {
        Err(FsError::NotAFile(path::display(&self.path)))
    }

    async fn read_dir(&mut self) -> Result<Vec<DirEntry>> {
        self.fs.read_dir(&self.path).await
    }
}
