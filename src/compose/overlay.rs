//! Copy-on-write overlay of two filesystems.
//!
//! Reads fall through from `upper` to `lower`; every mutation lands in `upper`. The lower
//! layer is never written, and deletions are not recorded anywhere: removing a name that only
//! exists in `lower` succeeds without hiding it.

use crate::error::FsError;
use crate::vfs::path;
use crate::vfs::traits::{DirEntry, FileSystem, Metadata, OpenOptions, Result, VirtualFile};
use crate::vfs::ops;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Debug, Clone)]
pub struct OverlayFs {
    upper: Arc<dyn FileSystem>,
    lower: Arc<dyn FileSystem>,
}

impl OverlayFs {
    pub fn new(upper: Arc<dyn FileSystem>, lower: Arc<dyn FileSystem>) -> Self {
        Self { upper, lower }
    }

    pub fn upper(&self) -> &Arc<dyn FileSystem> {
        &self.upper
    }

    pub fn lower(&self) -> &Arc<dyn FileSystem> {
        &self.lower
    }

    /// Make `dir` exist in upper, materialising directories that so far only exist in lower.
    ///
    /// A directory missing from both layers is `NotFound`; nothing is invented.
    async fn ensure_dir_in_upper(&self, dir: &Path) -> Result<()> {
        let mut current = PathBuf::new();
        for segment in path::segments(dir)? {
            current.push(segment);
            match self.upper.stat(&current).await {
                Ok(meta) if meta.is_dir() => continue,
                Ok(_) => return Err(FsError::NotADirectory(path::display(&current))),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }

            let lower_meta = self.lower.stat(&current).await?;
            if !lower_meta.is_dir() {
                return Err(FsError::NotADirectory(path::display(&current)));
            }
            debug!(path = %current.display(), "Copying directory up into overlay");
            match self.upper.mkdir(&current).await {
                Ok(()) | Err(FsError::AlreadyExists(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Lower may only answer for `normalized` when no ancestor in upper is a non-directory.
    async fn check_upper_ancestors(&self, normalized: &Path) -> Result<()> {
        let segments = path::segments(normalized)?;
        let mut current = PathBuf::new();
        for segment in &segments[..segments.len().saturating_sub(1)] {
            current.push(segment);
            match self.upper.stat(&current).await {
                Ok(meta) if meta.is_dir() => {}
                Ok(_) => return Err(FsError::NotADirectory(path::display(&current))),
                Err(e) if e.is_not_found() => return Ok(()),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    async fn ensure_parent_in_upper(&self, normalized: &Path) -> Result<()> {
        match path::parent(normalized) {
            Some(parent) => self.ensure_dir_in_upper(parent).await,
            None => Ok(()),
        }
    }

    /// Copy a lower file's bytes into upper so it can be modified in place.
    async fn copy_up(&self, normalized: &Path) -> Result<()> {
        debug!(path = %normalized.display(), "Copying file up into overlay");
        let mut source = self.lower.open(normalized).await?;
        let mut target = self.upper.create(normalized).await?;
        ops::copy(source.as_mut(), target.as_mut()).await?;
        target.close().await?;
        source.close().await
    }

    async fn present_in(fs: &dyn FileSystem, path: &Path) -> Result<bool> {
        ops::exists(fs, path).await
    }

    async fn wrap_dir(&self, handle: Box<dyn VirtualFile>, normalized: PathBuf) -> Result<Box<dyn VirtualFile>> {
        if handle.stat().await?.is_dir() {
            Ok(Box::new(MergedDir {
                overlay: self.clone(),
                path: normalized,
            }))
        } else {
            Ok(handle)
        }
    }

    async fn open_for_read(&self, normalized: PathBuf, options: &OpenOptions) -> Result<Box<dyn VirtualFile>> {
        match self.upper.open_file(&normalized, options).await {
            Ok(handle) => self.wrap_dir(handle, normalized).await,
            Err(e) if e.is_not_found() => {
                self.check_upper_ancestors(&normalized).await?;
                trace!(path = %normalized.display(), "Overlay falling back to lower layer");
                let handle = self.lower.open_file(&normalized, options).await?;
                self.wrap_dir(handle, normalized).await
            }
            Err(e) => Err(e),
        }
    }

    async fn open_for_write(&self, normalized: PathBuf, options: &OpenOptions) -> Result<Box<dyn VirtualFile>> {
        self.ensure_parent_in_upper(&normalized).await?;

        if Self::present_in(self.upper.as_ref(), &normalized).await? {
            return self.upper.open_file(&normalized, options).await;
        }

        match self.lower.stat(&normalized).await {
            Ok(meta) => {
                if options.is_create_new() {
                    return Err(FsError::AlreadyExists(path::display(&normalized)));
                }
                if meta.is_dir() {
                    return Err(FsError::NotAFile(path::display(&normalized)));
                }
                if !options.is_truncate() {
                    self.copy_up(&normalized).await?;
                }
                let options = options.clone().create(true);
                self.upper.open_file(&normalized, &options).await
            }
            Err(e) if e.is_not_found() => self.upper.open_file(&normalized, options).await,
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl FileSystem for OverlayFs {
    async fn open_file(&self, path: &Path, options: &OpenOptions) -> Result<Box<dyn VirtualFile>> {
        let normalized = path::normalize(path)?;
        if options.is_write() {
            self.open_for_write(normalized, options).await
        } else {
            self.open_for_read(normalized, options).await
        }
    }

    async fn stat(&self, path: &Path) -> Result<Metadata> {
        let normalized = path::normalize(path)?;
        match self.upper.stat(&normalized).await {
            Err(e) if e.is_not_found() => {
                self.check_upper_ancestors(&normalized).await?;
                self.lower.stat(&normalized).await
            }
            other => other,
        }
    }

    async fn lstat(&self, path: &Path) -> Result<Metadata> {
        let normalized = path::normalize(path)?;
        match self.upper.lstat(&normalized).await {
            Err(e) if e.is_not_found() => {
                self.check_upper_ancestors(&normalized).await?;
                self.lower.lstat(&normalized).await
            }
            other => other,
        }
    }

    async fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let normalized = path::normalize(path)?;
        let upper_entries = match self.upper.read_dir(&normalized).await {
            Ok(entries) => entries,
            Err(e) if e.is_not_found() => {
                self.check_upper_ancestors(&normalized).await?;
                trace!(path = %normalized.display(), "Listing lower layer only");
                return self.lower.read_dir(&normalized).await;
            }
            // An upper non-directory shadows whatever lower has here.
            Err(e) => return Err(e),
        };

        let lower_entries = match self.lower.read_dir(&normalized).await {
            Ok(entries) => entries,
            Err(FsError::NotFound(_)) | Err(FsError::NotADirectory(_)) => return Ok(upper_entries),
            Err(e) => return Err(e),
        };

        let mut merged: BTreeMap<String, DirEntry> = lower_entries
            .into_iter()
            .map(|entry| (entry.name.clone(), entry))
            .collect();
        for entry in upper_entries {
            merged.insert(entry.name.clone(), entry);
        }
        Ok(merged.into_values().collect())
    }

    async fn mkdir(&self, path: &Path) -> Result<()> {
        let normalized = path::normalize(path)?;
        if Self::present_in(self.upper.as_ref(), &normalized).await?
            || Self::present_in(self.lower.as_ref(), &normalized).await?
        {
            return Err(FsError::AlreadyExists(path::display(&normalized)));
        }
        self.ensure_parent_in_upper(&normalized).await?;
        self.upper.mkdir(&normalized).await
    }

    async fn remove(&self, path: &Path) -> Result<()> {
        let normalized = path::normalize(path)?;
        match self.upper.remove(&normalized).await {
            Err(e) if e.is_not_found() => {
                self.check_upper_ancestors(&normalized).await?;
                if Self::present_in(self.lower.as_ref(), &normalized).await? {
                    debug!(
                        path = %normalized.display(),
                        "Remove of lower-only entry leaves lower untouched"
                    );
                    Ok(())
                } else {
                    Err(e)
                }
            }
            other => other,
        }
    }

    async fn remove_all(&self, path: &Path) -> Result<()> {
        self.upper.remove_all(path).await
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let from = path::normalize(from)?;
        let to = path::normalize(to)?;
        if Self::present_in(self.upper.as_ref(), &from).await? {
            self.ensure_parent_in_upper(&to).await?;
            return self.upper.rename(&from, &to).await;
        }
        self.check_upper_ancestors(&from).await?;
        if Self::present_in(self.lower.as_ref(), &from).await? {
            return Err(FsError::Conflict(format!(
                "{} exists only in the lower layer and cannot be moved",
                path::display(&from)
            )));
        }
        Err(FsError::not_found(path::display(&from)))
    }

    async fn symlink(&self, target: &Path, link: &Path) -> Result<()> {
        let link = path::normalize(link)?;
        self.ensure_parent_in_upper(&link).await?;
        self.upper.symlink(target, &link).await
    }

    async fn read_link(&self, path: &Path) -> Result<PathBuf> {
        let normalized = path::normalize(path)?;
        match self.upper.read_link(&normalized).await {
            Err(e) if e.is_not_found() => {
                self.check_upper_ancestors(&normalized).await?;
                self.lower.read_link(&normalized).await
            }
            other => other,
        }
    }

    async fn temp_file(&self, dir: &Path, prefix: &str) -> Result<(PathBuf, Box<dyn VirtualFile>)> {
        self.ensure_dir_in_upper(dir).await?;
        self.upper.temp_file(dir, prefix).await
    }

    fn read_only(&self) -> bool {
        self.upper.read_only()
    }
}

/// Directory handle whose listing is the overlay's merged view.
#[derive(Debug)]
pub struct MergedDir {
    overlay: OverlayFs,
    path: PathBuf,
}

impl MergedDir {
    fn not_a_file<T>(&self) -> Result<T> {
        Err(FsError::NotAFile(path::display(&self.path)))
    }
}

#[async_trait]
impl VirtualFile for MergedDir {
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
        self.overlay.stat(&self.path).await
    }

    async fn set_len(&mut self, _size: u64) -> Result<()> {
        self.not_a_file()
    }

    async fn read_dir(&mut self) -> Result<Vec<DirEntry>> {
        self.overlay.read_dir(&self.path).await
    }
}
