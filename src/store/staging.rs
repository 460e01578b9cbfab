//! Staged submissions
//!
//! A [`StagingStore`] sits in front of a real store for the duration of one tree walk.
//! Nodes added to it are held back and only reach the real store through [`StagingStore::commit`],
//! which hands them over as a single batch. Dropping the stage without committing discards
//! everything, leaving the real store exactly as it was.

use crate::error::StorageError;
use crate::store::{ContentNode, ObjectStore};
use crate::types::ContentAddress;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug)]
pub struct StagingStore {
    base: Arc<dyn ObjectStore>,
    pending: Mutex<BTreeMap<ContentAddress, ContentNode>>,
}

impl StagingStore {
    pub fn new(base: Arc<dyn ObjectStore>) -> Self {
        Self {
            base,
            pending: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    /// Write every staged node to the base store. Returns how many were handed over.
    pub async fn commit(&self) -> Result<usize, StorageError> {
        let nodes: Vec<ContentNode> = std::mem::take(&mut *self.pending.lock())
            .into_values()
            .collect();
        let count = nodes.len();
        if count > 0 {
            self.base.add_batch(nodes).await?;
        }
        debug!(objects = count, "Committed staged objects");
        Ok(count)
    }

    /// Drop every staged node.
    pub fn discard(&self) {
        let dropped = std::mem::take(&mut *self.pending.lock()).len();
        debug!(objects = dropped, "Discarded staged objects");
    }
}

#[async_trait]
impl ObjectStore for StagingStore {
    async fn add(&self, node: ContentNode) -> Result<ContentAddress, StorageError> {
        let address = node.address();
        let staged = self.pending.lock().contains_key(&address);
        if staged || self.base.contains(&address).await? {
            return Ok(address);
        }
        self.pending.lock().entry(address).or_insert(node);
        Ok(address)
    }

    async fn load(&self, address: &ContentAddress) -> Result<Option<ContentNode>, StorageError> {
        let staged = self.pending.lock().get(address).cloned();
        match staged {
            Some(node) => Ok(Some(node)),
            None => self.base.load(address).await,
        }
    }

    async fn contains(&self, address: &ContentAddress) -> Result<bool, StorageError> {
        if self.pending.lock().contains_key(address) {
            return Ok(true);
        }
        self.base.contains(address).await
    }

    async fn object_count(&self) -> Result<usize, StorageError> {
        Ok(self.base.object_count().await? + self.pending())
    }
}
