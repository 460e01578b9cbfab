//! Clone: copy a tree from one filesystem into another
//!
//! Walks the source exactly like the snapshot engine (one task per entry, first failure
//! wins, siblings detached) but writes each node into the destination filesystem instead
//! of the object store.

use super::snapshot::{acquire, join_error, DEFAULT_MAX_CONCURRENCY};
use crate::error::FsError;
use crate::store::{self, ObjectStore};
use crate::types::ContentAddress;
use crate::vfs::{ops, path, FileSystem};
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{info, instrument, trace};

#[derive(Debug, Clone)]
pub struct Cloner {
    limiter: Arc<Semaphore>,
}

impl Default for Cloner {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENCY)
    }
}

impl Cloner {
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            limiter: Arc::new(Semaphore::new(max_concurrency.max(1))),
        }
    }

    /// Copy `src_path` in `src` to `dst_path` in `dst`.
    ///
    /// Directories that already exist in the destination are reused; files are overwritten.
    /// Returns the number of nodes copied.
    #[instrument(skip_all, fields(src = %src_path.display(), dst = %dst_path.display()))]
    pub async fn clone_tree(
        &self,
        src: Arc<dyn FileSystem>,
        dst: Arc<dyn FileSystem>,
        src_path: &Path,
        dst_path: &Path,
    ) -> Result<usize, FsError> {
        let start = Instant::now();
        let copy = CopyWalk {
            src,
            dst,
            limiter: self.limiter.clone(),
            copied: Arc::new(AtomicUsize::new(0)),
        };
        copy.clone()
            .visit(path::normalize(src_path)?, path::normalize(dst_path)?)
            .await?;

        let copied = copy.copied.load(Ordering::Relaxed);
        info!(
            node_count = copied,
            duration_ms = start.elapsed().as_millis(),
            "Clone completed"
        );
        Ok(copied)
    }
}

/// Copy a tree with the default concurrency bound.
pub async fn clone(
    src: Arc<dyn FileSystem>,
    dst: Arc<dyn FileSystem>,
    src_path: &Path,
    dst_path: &Path,
) -> Result<(), FsError> {
    Cloner::default().clone_tree(src, dst, src_path, dst_path).await?;
    Ok(())
}

/// Materialise the tree at `address` into `dst` at `dst_path`.
pub async fn clone_address(
    store: Arc<dyn ObjectStore>,
    address: ContentAddress,
    dst: Arc<dyn FileSystem>,
    dst_path: &Path,
) -> Result<(), FsError> {
    let view = store::resolve(store, address).await?;
    clone(view, dst, Path::new(""), dst_path).await
}

#[derive(Clone)]
struct CopyWalk {
    src: Arc<dyn FileSystem>,
    dst: Arc<dyn FileSystem>,
    limiter: Arc<Semaphore>,
    copied: Arc<AtomicUsize>,
}

impl CopyWalk {
    /// mkdir that tolerates an existing directory (cloning into an existing root).
    async fn ensure_dir(&self, dst_path: &Path) -> Result<(), FsError> {
        match self.dst.mkdir(dst_path).await {
            Ok(()) => Ok(()),
            Err(FsError::AlreadyExists(detail)) => {
                if self.dst.stat(dst_path).await?.is_dir() {
                    Ok(())
                } else {
                    Err(FsError::AlreadyExists(detail))
                }
            }
            Err(e) => Err(e),
        }
    }

    fn visit(self, src_path: PathBuf, dst_path: PathBuf) -> BoxFuture<'static, Result<(), FsError>> {
        async move {
            let permit = acquire(&self.limiter).await?;
            let mut source = self.src.open(&src_path).await?;
            let meta = source.stat().await?;

            if !meta.is_dir() {
                let mut target = self.dst.create(&dst_path).await?;
                ops::copy(source.as_mut(), target.as_mut()).await?;
                target.close().await?;
                source.close().await?;
                drop(permit);
                self.copied.fetch_add(1, Ordering::Relaxed);
                trace!(path = %path::display(&dst_path), "Copied file");
                return Ok(());
            }

            let listing = source.read_dir().await?;
            source.close().await?;
            self.ensure_dir(&dst_path).await?;
            drop(permit);
            self.copied.fetch_add(1, Ordering::Relaxed);

            let mut children = FuturesUnordered::new();
            for entry in listing {
                let copy = self.clone();
                let child_src = src_path.join(&entry.name);
                let child_dst = dst_path.join(&entry.name);
                children.push(tokio::spawn(copy.visit(child_src, child_dst)));
            }

            while let Some(joined) = children.next().await {
                joined.map_err(join_error)??;
            }
            Ok(())
        }
        .boxed()
    }
}
