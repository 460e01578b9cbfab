//! Patch, meld and assemble: derive new sealed trees from existing ones
//!
//! All three build a transient composition over read-only views of sealed trees and then
//! snapshot it. None of them mutate an existing object; on failure the store is unchanged.

use super::snapshot::{Snapshotter, DEFAULT_MAX_CONCURRENCY};
use crate::compose::{MountFs, OverlayFs};
use crate::error::FsError;
use crate::store::{self, ObjectStore};
use crate::types::ContentAddress;
use crate::vfs::{path, FileSystem, MemoryFs};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument};

impl Snapshotter {
    /// Apply `mutate` to a writable copy-on-write view of `address` and seal the result.
    ///
    /// The view is an overlay of a fresh in-memory layer over the sealed tree. Only the
    /// in-memory layer is ever written, and it is discarded once the call returns.
    #[instrument(skip_all, fields(base = %address.short()))]
    pub async fn patch<F, Fut>(&self, address: ContentAddress, mutate: F) -> Result<ContentAddress, FsError>
    where
        F: FnOnce(Arc<dyn FileSystem>) -> Fut,
        Fut: Future<Output = Result<(), FsError>> + Send,
    {
        let lower = store::resolve(self.store().clone(), address).await?;
        if !lower.stat(Path::new("")).await?.is_dir() {
            return Err(FsError::NotADirectory(format!("object {}", address)));
        }

        let overlay: Arc<dyn FileSystem> = Arc::new(OverlayFs::new(Arc::new(MemoryFs::new()), lower));
        mutate(overlay.clone()).await?;

        let patched = self.snapshot(overlay, Path::new("")).await?;
        info!(result = %patched.short(), "Patch sealed");
        Ok(patched)
    }

    /// Overlay `upper` on `lower` and seal the merged tree.
    ///
    /// Names present in both trees take `upper`'s version; directories present in both merge
    /// recursively.
    #[instrument(skip_all, fields(lower = %lower.short(), upper = %upper.short()))]
    pub async fn meld(&self, lower: ContentAddress, upper: ContentAddress) -> Result<ContentAddress, FsError> {
        let lower_view = store::resolve(self.store().clone(), lower).await?;
        let upper_view = store::resolve(self.store().clone(), upper).await?;

        let overlay = Arc::new(OverlayFs::new(upper_view, lower_view));
        let melded = self.snapshot(overlay, Path::new("")).await?;
        info!(result = %melded.short(), "Meld sealed");
        Ok(melded)
    }

    /// Seal a directory whose entries are the given trees, each under its name.
    #[instrument(skip_all)]
    pub async fn assemble<I, S>(&self, entries: I) -> Result<ContentAddress, FsError>
    where
        I: IntoIterator<Item = (S, ContentAddress)>,
        S: AsRef<str>,
    {
        let mut table = MountFs::new();
        table.mount("", Arc::new(MemoryFs::new()))?;

        let mut count = 0usize;
        for (name, address) in entries {
            let name = name.as_ref();
            if path::segments(Path::new(name))?.len() != 1 {
                return Err(FsError::InvalidPath(format!(
                    "entry name must be a single path segment: {:?}",
                    name
                )));
            }
            let view = store::resolve(self.store().clone(), address).await?;
            table.mount(name, view)?;
            count += 1;
        }

        let assembled = self.snapshot(Arc::new(table), Path::new("")).await?;
        info!(entries = count, result = %assembled.short(), "Assembled directory");
        Ok(assembled)
    }
}

/// Patch with the default concurrency bound. See [`Snapshotter::patch`].
pub async fn patch<F, Fut>(
    store: Arc<dyn ObjectStore>,
    address: ContentAddress,
    mutate: F,
) -> Result<ContentAddress, FsError>
where
    F: FnOnce(Arc<dyn FileSystem>) -> Fut,
    Fut: Future<Output = Result<(), FsError>> + Send,
{
    Snapshotter::new(store, DEFAULT_MAX_CONCURRENCY)
        .patch(address, mutate)
        .await
}

/// Meld with the default concurrency bound. `b` wins conflicts.
pub async fn meld(
    store: Arc<dyn ObjectStore>,
    a: ContentAddress,
    b: ContentAddress,
) -> Result<ContentAddress, FsError> {
    Snapshotter::new(store, DEFAULT_MAX_CONCURRENCY).meld(a, b).await
}

/// Assemble with the default concurrency bound.
pub async fn assemble<I, S>(store: Arc<dyn ObjectStore>, entries: I) -> Result<ContentAddress, FsError>
where
    I: IntoIterator<Item = (S, ContentAddress)>,
    S: AsRef<str>,
{
    Snapshotter::new(store, DEFAULT_MAX_CONCURRENCY)
        .assemble(entries)
        .await
}
