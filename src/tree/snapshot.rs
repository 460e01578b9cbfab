//! Snapshot engine: live filesystem tree to sealed content tree
//!
//! Every directory entry is visited on its own tokio task. A directory node is submitted only
//! after all of its children have produced addresses, so addresses depend on content alone
//! and never on the order in which siblings finish.

use crate::config::SnapshotConfig;
use crate::error::FsError;
use crate::store::{ContentNode, ObjectStore, StagingStore};
use crate::types::ContentAddress;
use crate::vfs::{ops, path, FileSystem};
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_MAX_CONCURRENCY: usize = 64;

/// Seals filesystem trees into an object store.
///
/// I/O sections (open, read, submit) each hold one permit of a shared semaphore, so at most
/// `max_concurrency` of them run at a time across the whole walk. Permits are released
/// before waiting on children.
#[derive(Debug, Clone)]
pub struct Snapshotter {
    store: Arc<dyn ObjectStore>,
    limiter: Arc<Semaphore>,
    max_concurrency: usize,
}

impl Snapshotter {
    pub fn new(store: Arc<dyn ObjectStore>, max_concurrency: usize) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            store,
            limiter: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
        }
    }

    pub fn from_config(store: Arc<dyn ObjectStore>, config: &SnapshotConfig) -> Self {
        Self::new(store, config.max_concurrency)
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Seal the tree at `root` and return its address.
    ///
    /// Nothing reaches the store unless the whole walk succeeds. On the first failure the
    /// call returns that error; sibling tasks already started are left to finish on their own
    /// and their results are dropped.
    #[instrument(skip_all, fields(root = %root.display()))]
    pub async fn snapshot(&self, fs: Arc<dyn FileSystem>, root: &Path) -> Result<ContentAddress, FsError> {
        let start = Instant::now();
        let root = path::normalize(root)?;
        info!("Starting snapshot");

        let stage = Arc::new(StagingStore::new(self.store.clone()));
        let walk = Walk {
            fs,
            stage: stage.clone(),
            limiter: self.limiter.clone(),
            visited: Arc::new(AtomicUsize::new(0)),
        };

        match walk.clone().visit(root).await {
            Ok(address) => {
                let committed = stage.commit().await?;
                info!(
                    node_count = walk.visited.load(Ordering::Relaxed),
                    new_objects = committed,
                    address = %address.short(),
                    duration_ms = start.elapsed().as_millis(),
                    "Snapshot completed"
                );
                Ok(address)
            }
            Err(e) => {
                stage.discard();
                warn!(error = %e, "Snapshot failed, store left unchanged");
                Err(e)
            }
        }
    }
}

/// Seal the tree at `root` with the default concurrency bound.
pub async fn snapshot(
    fs: Arc<dyn FileSystem>,
    store: Arc<dyn ObjectStore>,
    root: &Path,
) -> Result<ContentAddress, FsError> {
    Snapshotter::new(store, DEFAULT_MAX_CONCURRENCY)
        .snapshot(fs, root)
        .await
}

pub(crate) async fn acquire(limiter: &Arc<Semaphore>) -> Result<OwnedSemaphorePermit, FsError> {
    limiter
        .clone()
        .acquire_owned()
        .await
        .map_err(|_| FsError::Io(io::Error::other("concurrency limiter closed")))
}

pub(crate) fn join_error(err: tokio::task::JoinError) -> FsError {
    FsError::Io(io::Error::other(format!("tree task failed: {}", err)))
}

/// State shared by every task of one snapshot.
#[derive(Clone)]
struct Walk {
    fs: Arc<dyn FileSystem>,
    stage: Arc<StagingStore>,
    limiter: Arc<Semaphore>,
    visited: Arc<AtomicUsize>,
}

impl Walk {
    fn visit(self, node_path: PathBuf) -> BoxFuture<'static, Result<ContentAddress, FsError>> {
        async move {
            self.visited.fetch_add(1, Ordering::Relaxed);

            let permit = acquire(&self.limiter).await?;
            let mut handle = self.fs.open(&node_path).await?;
            let meta = handle.stat().await?;

            if !meta.is_dir() {
                let data = ops::read_to_end(handle.as_mut()).await?;
                handle.close().await?;
                let address = self.stage.add(ContentNode::leaf(data)).await?;
                drop(permit);
                return Ok(address);
            }

            let listing = handle.read_dir().await?;
            handle.close().await?;
            drop(permit);

            let mut children = FuturesUnordered::new();
            for entry in listing {
                let walk = self.clone();
                let child_path = node_path.join(&entry.name);
                let name = entry.name;
                children.push(tokio::spawn(async move {
                    let result = walk.visit(child_path).await;
                    (name, result)
                }));
            }

            let mut entries = BTreeMap::new();
            while let Some(joined) = children.next().await {
                let (name, result) = joined.map_err(join_error)?;
                // Returning here drops the remaining join handles, which detaches their tasks
                entries.insert(name, result?);
            }

            let _permit = acquire(&self.limiter).await?;
            let address = self.stage.add(ContentNode::directory(entries)).await?;
            debug!(path = %path::display(&node_path), address = %address.short(), "Sealed directory");
            Ok(address)
        }
        .boxed()
    }
}
