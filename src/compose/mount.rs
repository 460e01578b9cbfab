//! Mount table composition.
//!
//! Routes each path to the filesystem mounted at its longest segment-prefix and strips the
//! matched segments before forwarding. Paths above or between mount points are synthesized
//! directories whose listings show the next segment of every mount below them.

use crate::error::FsError;
use crate::vfs::path;
use crate::vfs::traits::{DirEntry, FileSystem, Metadata, OpenOptions, Result, VirtualFile};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::trace;

#[derive(Clone)]
struct Mount {
    segments: Vec<String>,
    fs: Arc<dyn FileSystem>,
}

impl Mount {
    fn path(&self) -> PathBuf {
        self.segments.iter().collect()
    }

    fn covers(&self, segments: &[String]) -> bool {
        segments.starts_with(&self.segments)
    }
}

/// Result of routing a path through the table.
struct Route<'a> {
    mount: &'a Mount,
    rest: PathBuf,
}

#[derive(Clone, Default)]
pub struct MountFs {
    /// Sorted longest mount path first so the first cover is the longest match.
    mounts: Arc<Vec<Mount>>,
}

impl fmt::Debug for MountFs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountFs")
            .field("mounts", &self.mounts())
            .finish()
    }
}

impl MountFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `fs` at `path`. Each path may be mounted once.
    pub fn mount(&mut self, mount_path: impl AsRef<Path>, fs: Arc<dyn FileSystem>) -> Result<()> {
        let segments = path::segments(mount_path.as_ref())?;
        if self.mounts.iter().any(|m| m.segments == segments) {
            return Err(FsError::Conflict(format!(
                "{} is already mounted",
                path::display(&segments.iter().collect::<PathBuf>())
            )));
        }

        let mounts = Arc::make_mut(&mut self.mounts);
        mounts.push(Mount { segments, fs });
        mounts.sort_by(|a, b| b.segments.len().cmp(&a.segments.len()));
        Ok(())
    }

    /// Mount paths, sorted.
    pub fn mounts(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.mounts.iter().map(Mount::path).collect();
        paths.sort();
        paths
    }

    fn route(&self, segments: &[String]) -> Option<Route<'_>> {
        let mount = self.mounts.iter().find(|m| m.covers(segments))?;
        let rest: PathBuf = segments[mount.segments.len()..].iter().collect();
        trace!(mount = %path::display(&mount.path()), rest = %path::display(&rest), "Mount dispatch");
        Some(Route { mount, rest })
    }

    fn route_or_not_found(&self, segments: &[String]) -> Result<Route<'_>> {
        self.route(segments)
            .ok_or_else(|| FsError::not_found(path::display(&segments.iter().collect::<PathBuf>())))
    }

    /// Next segment of every mount strictly below `segments`.
    fn mounts_below(&self, segments: &[String]) -> BTreeSet<String> {
        self.mounts
            .iter()
            .filter(|m| m.segments.len() > segments.len() && m.segments.starts_with(segments))
            .map(|m| m.segments[segments.len()].clone())
            .collect()
    }

    /// Paths the table itself vouches for as directories: the root and every path with
    /// mounts below it.
    fn is_synthesized(&self, segments: &[String]) -> bool {
        segments.is_empty() || !self.mounts_below(segments).is_empty()
    }

    /// Listing entries contributed by the mounts below `segments`.
    ///
    /// A mount directly below takes its entry type from its own root; a name that only leads
    /// to deeper mounts is a directory.
    async fn mount_entries(&self, segments: &[String]) -> Result<BTreeMap<String, DirEntry>> {
        let mut entries = BTreeMap::new();
        for mount in self.mounts.iter() {
            if mount.segments.len() <= segments.len() || !mount.segments.starts_with(segments) {
                continue;
            }
            let name = &mount.segments[segments.len()];
            // Deeper mounts make the name a directory whatever is mounted at it
            if entries.get(name).is_some_and(DirEntry::is_dir) {
                continue;
            }
            let meta = if mount.segments.len() == segments.len() + 1 {
                mount.fs.stat(Path::new("")).await?
            } else {
                Metadata::directory()
            };
            entries.insert(name.clone(), DirEntry::new(name.clone(), &meta));
        }
        Ok(entries)
    }

    fn is_mount_point(&self, segments: &[String]) -> bool {
        self.mounts.iter().any(|m| m.segments == segments)
    }

    /// Mount points and their ancestors cannot be removed or moved.
    fn guard_structure(&self, segments: &[String], op: &str) -> Result<()> {
        if self.is_mount_point(segments) || !self.mounts_below(segments).is_empty() {
            return Err(FsError::Conflict(format!(
                "cannot {} {}: mount structure",
                op,
                path::display(&segments.iter().collect::<PathBuf>())
            )));
        }
        Ok(())
    }

    async fn stat_with(&self, path: &Path, follow: bool) -> Result<Metadata> {
        let segments = path::segments(path)?;

        let covered = match self.route(&segments) {
            Some(route) if follow => route.mount.fs.stat(&route.rest).await,
            Some(route) => route.mount.fs.lstat(&route.rest).await,
            None => Err(FsError::not_found(path::display(path))),
        };

        if !self.is_synthesized(&segments) {
            return covered;
        }
        match covered {
            Ok(meta) if meta.is_dir() => Ok(meta),
            _ => Ok(Metadata::directory()),
        }
    }
}

#[async_trait]
impl FileSystem for MountFs {
    async fn open_file(&self, path: &Path, options: &OpenOptions) -> Result<Box<dyn VirtualFile>> {
        let segments = path::segments(path)?;
        if self.is_synthesized(&segments) {
            if options.is_create_new() {
                return Err(FsError::AlreadyExists(path::display(path)));
            }
            if options.is_write() {
                return Err(FsError::NotAFile(path::display(path)));
            }
            return Ok(Box::new(VirtualDir {
                fs: self.clone(),
                path: segments.iter().collect(),
            }));
        }

        let route = self.route_or_not_found(&segments)?;
        let handle = route.mount.fs.open_file(&route.rest, options).await?;
        if handle.stat().await?.is_dir() {
            // Re-wrap so nested mounts added under this directory stay visible
            return Ok(Box::new(VirtualDir {
                fs: self.clone(),
                path: segments.iter().collect(),
            }));
        }
        Ok(handle)
    }

    async fn stat(&self, path: &Path) -> Result<Metadata> {
        self.stat_with(path, true).await
    }

    async fn lstat(&self, path: &Path) -> Result<Metadata> {
        self.stat_with(path, false).await
    }

    async fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let segments = path::segments(path)?;
        let synthesized = self.is_synthesized(&segments);

        let covered = match self.route(&segments) {
            Some(route) => route.mount.fs.read_dir(&route.rest).await,
            None => Err(FsError::not_found(path::display(path))),
        };

        let mut merged: BTreeMap<String, DirEntry> = match covered {
            Ok(entries) => entries.into_iter().map(|e| (e.name.clone(), e)).collect(),
            Err(FsError::NotFound(_)) | Err(FsError::NotADirectory(_)) if synthesized => {
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };

        // Mount points shadow same-named entries of the covering filesystem
        merged.extend(self.mount_entries(&segments).await?);
        Ok(merged.into_values().collect())
    }

    async fn mkdir(&self, path: &Path) -> Result<()> {
        let segments = path::segments(path)?;
        if self.is_synthesized(&segments) {
            return Err(FsError::AlreadyExists(path::display(path)));
        }
        let route = self.route_or_not_found(&segments)?;
        route.mount.fs.mkdir(&route.rest).await
    }

    async fn remove(&self, path: &Path) -> Result<()> {
        let segments = path::segments(path)?;
        self.guard_structure(&segments, "remove")?;
        let route = self.route_or_not_found(&segments)?;
        route.mount.fs.remove(&route.rest).await
    }

    async fn remove_all(&self, path: &Path) -> Result<()> {
        let segments = path::segments(path)?;
        self.guard_structure(&segments, "remove")?;
        match self.route(&segments) {
            Some(route) => route.mount.fs.remove_all(&route.rest).await,
            None => Ok(()),
        }
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let from_segments = path::segments(from)?;
        let to_segments = path::segments(to)?;
        self.guard_structure(&from_segments, "rename")?;
        self.guard_structure(&to_segments, "replace")?;

        let source = self.route_or_not_found(&from_segments)?;
        let target = self.route_or_not_found(&to_segments)?;
        if source.mount.segments != target.mount.segments {
            return Err(FsError::Conflict(format!(
                "cannot rename across mounts: {} -> {}",
                path::display(from),
                path::display(to)
            )));
        }
        source.mount.fs.rename(&source.rest, &target.rest).await
    }

    async fn symlink(&self, target: &Path, link: &Path) -> Result<()> {
        let segments = path::segments(link)?;
        self.guard_structure(&segments, "replace")?;
        let route = self.route_or_not_found(&segments)?;
        route.mount.fs.symlink(target, &route.rest).await
    }

    async fn read_link(&self, path: &Path) -> Result<PathBuf> {
        let route = self.route_or_not_found(&path::segments(path)?)?;
        route.mount.fs.read_link(&route.rest).await
    }

    async fn temp_file(&self, dir: &Path, prefix: &str) -> Result<(PathBuf, Box<dyn VirtualFile>)> {
        let route = self.route_or_not_found(&path::segments(dir)?)?;
        let (inner, file) = route.mount.fs.temp_file(&route.rest, prefix).await?;
        Ok((route.mount.path().join(inner), file))
    }

    fn read_only(&self) -> bool {
        !self.mounts.is_empty() && self.mounts.iter().all(|m| m.fs.read_only())
    }
}

/// Directory handle for any directory seen through a [`MountFs`].
#[derive(Debug)]
pub struct VirtualDir {
    fs: MountFs,
    path: PathBuf,
}

impl VirtualDir {
    fn not_a_file<T>(&self) -> Result<T> {
        Err(FsError::NotAFile(path::display(&self.path)))
    }
}

#[async_trait]
impl VirtualFile for VirtualDir {
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
