//! Rooted sub-views.
//!
//! A [`SubFs`] shares storage with its parent; every path is re-rooted under the prefix
//! before being forwarded.

use super::path;
use super::traits::{DirEntry, FileSystem, Metadata, OpenOptions, Result, VirtualFile};
use crate::error::FsError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct SubFs {
    inner: Arc<dyn FileSystem>,
    prefix: PathBuf,
}

impl SubFs {
    /// Re-root `inner` at `prefix` without checking that the prefix exists.
    pub fn new(inner: Arc<dyn FileSystem>, prefix: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            inner,
            prefix: path::normalize(prefix.as_ref())?,
        })
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    fn full(&self, path: &Path) -> Result<PathBuf> {
        Ok(self.prefix.join(path::normalize(path)?))
    }

    fn guard_root(&self, path: &Path, op: &str) -> Result<()> {
        if path::is_root(path) {
            return Err(FsError::Conflict(format!(
                "cannot {} the root of a sub view ({})",
                op,
                path::display(&self.prefix)
            )));
        }
        Ok(())
    }
}

/// View `fs` rooted at `prefix`. The prefix must name an existing directory.
pub async fn sub(fs: Arc<dyn FileSystem>, prefix: impl AsRef<Path>) -> Result<Arc<dyn FileSystem>> {
    let view = SubFs::new(fs, prefix)?;
    let meta = view.inner.stat(&view.prefix).await?;
    if !meta.is_dir() {
        return Err(FsError::NotADirectory(path::display(&view.prefix)));
    }
    Ok(Arc::new(view))
}

#[async_trait]
impl FileSystem for SubFs {
    async fn open_file(&self, path: &Path, options: &OpenOptions) -> Result<Box<dyn VirtualFile>> {
        self.inner.open_file(&self.full(path)?, options).await
    }

    async fn stat(&self, path: &Path) -> Result<Metadata> {
        self.inner.stat(&self.full(path)?).await
    }

    async fn lstat(&self, path: &Path) -> Result<Metadata> {
        self.inner.lstat(&self.full(path)?).await
    }

    async fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        self.inner.read_dir(&self.full(path)?).await
    }

    async fn mkdir(&self, path: &Path) -> Result<()> {
        self.inner.mkdir(&self.full(path)?).await
    }

    async fn remove(&self, path: &Path) -> Result<()> {
        self.guard_root(path, "remove")?;
        self.inner.remove(&self.full(path)?).await
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        self.guard_root(from, "rename")?;
        self.guard_root(to, "replace")?;
        self.inner.rename(&self.full(from)?, &self.full(to)?).await
    }

    async fn symlink(&self, target: &Path, link: &Path) -> Result<()> {
        self.inner.symlink(target, &self.full(link)?).await
    }

    async fn read_link(&self, path: &Path) -> Result<PathBuf> {
        self.inner.read_link(&self.full(path)?).await
    }

    async fn temp_file(&self, dir: &Path, prefix: &str) -> Result<(PathBuf, Box<dyn VirtualFile>)> {
        let (full, file) = self.inner.temp_file(&self.full(dir)?, prefix).await?;
        let relative = full.strip_prefix(&self.prefix).unwrap_or(&full).to_path_buf();
        Ok((relative, file))
    }

    fn read_only(&self) -> bool {
        self.inner.read_only()
    }
}
