//! Read-only filesystem view of a content-addressed tree

use crate::error::FsError;
use crate::store::{load_required, ContentNode, ObjectStore};
use crate::types::ContentAddress;
use crate::vfs::path;
use crate::vfs::traits::{DirEntry, FileSystem, Metadata, OpenOptions, Result, VirtualFile};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Filesystem whose contents are the tree rooted at one address.
///
/// Nodes are loaded from the store on demand for every call. Every mutation answers
/// `ReadOnly`.
#[derive(Debug, Clone)]
pub struct ContentFs {
    store: Arc<dyn ObjectStore>,
    root: ContentAddress,
}

impl ContentFs {
    /// Open a view, failing with `NotFound` if the root object is missing.
    pub async fn open(store: Arc<dyn ObjectStore>, root: ContentAddress) -> Result<Self> {
        if !store.contains(&root).await? {
            return Err(FsError::NotFound(format!("object {}", root)));
        }
        Ok(Self { store, root })
    }

    pub fn root(&self) -> ContentAddress {
        self.root
    }

    /// Walk from the root to the node at `path`.
    async fn lookup(&self, path: &Path) -> Result<(PathBuf, ContentNode)> {
        let normalized = path::normalize(path)?;
        let mut node = load_required(self.store.as_ref(), &self.root).await?;
        let mut walked = PathBuf::new();

        for component in normalized.iter() {
            let name = component.to_string_lossy();
            let child = match &node {
                ContentNode::Directory { entries } => entries
                    .get(&*name)
                    .copied()
                    .ok_or_else(|| FsError::not_found(path::display(&normalized)))?,
                ContentNode::Leaf { .. } => {
                    return Err(FsError::NotADirectory(path::display(&walked)));
                }
            };
            walked.push(component);
            node = load_required(self.store.as_ref(), &child).await?;
        }
        Ok((normalized, node))
    }

    fn metadata_of(node: &ContentNode) -> Metadata {
        match node {
            ContentNode::Leaf { data } => sealed(Metadata::file(data.len() as u64)),
            ContentNode::Directory { .. } => sealed(Metadata::directory()),
        }
    }

    fn read_only_error(path: &Path) -> FsError {
        FsError::ReadOnly(path::display(path))
    }
}

/// Sealed content is never writable through the view.
fn sealed(mut meta: Metadata) -> Metadata {
    meta.mode &= !0o222;
    meta
}

#[async_trait]
impl FileSystem for ContentFs {
    async fn open_file(&self, path: &Path, options: &OpenOptions) -> Result<Box<dyn VirtualFile>> {
        if options.is_write() {
            return Err(Self::read_only_error(path));
        }
        let (normalized, node) = self.lookup(path).await?;
        match node {
            ContentNode::Leaf { data } => Ok(Box::new(ContentFile {
                path: normalized,
                data: Arc::new(data),
                pos: 0,
            })),
            ContentNode::Directory { entries } => Ok(Box::new(ContentDir {
                fs: self.clone(),
                path: normalized,
                entries,
            })),
        }
    }

    async fn stat(&self, path: &Path) -> Result<Metadata> {
        let (_, node) = self.lookup(path).await?;
        Ok(Self::metadata_of(&node))
    }

    async fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let (normalized, node) = self.lookup(path).await?;
        match node {
            ContentNode::Directory { entries } => self.list_entries(&entries).await,
            ContentNode::Leaf { .. } => Err(FsError::NotADirectory(path::display(&normalized))),
        }
    }

    async fn mkdir(&self, path: &Path) -> Result<()> {
        Err(Self::read_only_error(path))
    }

    async fn mkdir_all(&self, path: &Path) -> Result<()> {
        Err(Self::read_only_error(path))
    }

    async fn remove(&self, path: &Path) -> Result<()> {
        Err(Self::read_only_error(path))
    }

    async fn remove_all(&self, path: &Path) -> Result<()> {
        Err(Self::read_only_error(path))
    }

    async fn rename(&self, from: &Path, _to: &Path) -> Result<()> {
        Err(Self::read_only_error(from))
    }

    async fn symlink(&self, _target: &Path, link: &Path) -> Result<()> {
        Err(Self::read_only_error(link))
    }

    async fn temp_file(&self, dir: &Path, _prefix: &str) -> Result<(PathBuf, Box<dyn VirtualFile>)> {
        Err(Self::read_only_error(dir))
    }

    fn read_only(&self) -> bool {
        true
    }
}

impl ContentFs {
    async fn list_entries(&self, entries: &BTreeMap<String, ContentAddress>) -> Result<Vec<DirEntry>> {
        let mut listing = Vec::with_capacity(entries.len());
        for (name, address) in entries {
            let child = load_required(self.store.as_ref(), address).await?;
            listing.push(DirEntry::new(name.clone(), &Self::metadata_of(&child)));
        }
        Ok(listing)
    }
}

/// Handle on a sealed leaf.
#[derive(Debug)]
pub struct ContentFile {
    path: PathBuf,
    data: Arc<Vec<u8>>,
    pos: u64,
}

impl ContentFile {
    fn copy_out(&self, buf: &mut [u8], offset: u64) -> usize {
        let start = (offset as usize).min(self.data.len());
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        n
    }
}

#[async_trait]
impl VirtualFile for ContentFile {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.copy_out(buf, self.pos);
        self.pos += n as u64;
        Ok(n)
    }

    async fn write(&mut self, _buf: &[u8]) -> Result<usize> {
        Err(ContentFs::read_only_error(&self.path))
    }

    async fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize> {
        Ok(self.copy_out(buf, offset))
    }

    async fn write_at(&mut self, _buf: &[u8], _offset: u64) -> Result<usize> {
        Err(ContentFs::read_only_error(&self.path))
    }

    async fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::End(delta) => self.data.len() as i64 + delta,
            SeekFrom::Current(delta) => self.pos as i64 + delta,
        };
        if target < 0 {
            return Err(FsError::InvalidPath(format!(
                "seek before start of {}",
                path::display(&self.path)
            )));
        }
        self.pos = target as u64;
        Ok(self.pos)
    }

    async fn stat(&self) -> Result<Metadata> {
        Ok(sealed(Metadata::file(self.data.len() as u64)))
    }

    async fn set_len(&mut self, _size: u64) -> Result<()> {
        Err(ContentFs::read_only_error(&self.path))
    }
}

/// Handle on a sealed directory; the listing is fixed at open time.
#[derive(Debug)]
pub struct ContentDir {
    fs: ContentFs,
    path: PathBuf,
    entries: BTreeMap<String, ContentAddress>,
}

impl ContentDir {
    fn not_a_file<T>(&self) -> Result<T> {
        Err(FsError::NotAFile(path::display(&self.path)))
    }
}

#[async_trait]
impl VirtualFile for ContentDir {
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
        Ok(sealed(Metadata::directory()))
    }

    async fn set_len(&mut self, _size: u64) -> Result<()> {
        self.not_a_file()
    }

    async fn read_dir(&mut self) -> Result<Vec<DirEntry>> {
        self.fs.list_entries(&self.entries).await
    }
}
