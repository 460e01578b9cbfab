//! In-memory object store

use crate::error::StorageError;
use crate::store::{ContentNode, ObjectStore};
use crate::types::ContentAddress;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::trace;

/// Object store backed by a `HashMap`. Contents are lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<ContentAddress, ContentNode>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Every address currently held, sorted.
    pub fn addresses(&self) -> Vec<ContentAddress> {
        let mut addresses: Vec<_> = self.objects.read().keys().copied().collect();
        addresses.sort();
        addresses
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn add(&self, node: ContentNode) -> Result<ContentAddress, StorageError> {
        let address = node.address();
        self.objects.write().entry(address).or_insert_with(|| {
            trace!(address = %address.short(), "Storing object");
            node
        });
        Ok(address)
    }

    async fn load(&self, address: &ContentAddress) -> Result<Option<ContentNode>, StorageError> {
        Ok(self.objects.read().get(address).cloned())
    }

    async fn contains(&self, address: &ContentAddress) -> Result<bool, StorageError> {
        Ok(self.objects.read().contains_key(address))
    }

    async fn object_count(&self) -> Result<usize, StorageError> {
        Ok(self.len())
    }

    async fn add_batch(&self, nodes: Vec<ContentNode>) -> Result<Vec<ContentAddress>, StorageError> {
        let mut objects = self.objects.write();
        let addresses = nodes
            .into_iter()
            .map(|node| {
                let address = node.address();
                objects.entry(address).or_insert(node);
                address
            })
            .collect();
        Ok(addresses)
    }
}
