//! Content-addressed object store
//!
//! Holds immutable [`ContentNode`]s keyed by their [`ContentAddress`]. Directory nodes refer
//! to their children by address, so a single root address pins a whole tree.

pub mod hasher;
pub mod memory;
pub mod persistence;
pub mod staging;
pub mod view;

pub use memory::MemoryObjectStore;
pub use persistence::SledObjectStore;
pub use staging::StagingStore;
pub use view::ContentFs;

use crate::error::{FsError, StorageError};
use crate::types::ContentAddress;
use crate::vfs::FileSystem;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Immutable tree node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentNode {
    Leaf { data: Vec<u8> },
    Directory { entries: BTreeMap<String, ContentAddress> },
}

impl ContentNode {
    pub fn leaf(data: impl Into<Vec<u8>>) -> Self {
        ContentNode::Leaf { data: data.into() }
    }

    pub fn directory(entries: BTreeMap<String, ContentAddress>) -> Self {
        ContentNode::Directory { entries }
    }

    pub fn address(&self) -> ContentAddress {
        hasher::address_of(self)
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, ContentNode::Directory { .. })
    }

    /// Byte length for leaves, entry count for directories.
    pub fn len(&self) -> usize {
        match self {
            ContentNode::Leaf { data } => data.len(),
            ContentNode::Directory { entries } => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Object store interface
///
/// `add` is idempotent: submitting a node that is already present returns the same address
/// and stores nothing new.
#[async_trait]
pub trait ObjectStore: fmt::Debug + Send + Sync {
    async fn add(&self, node: ContentNode) -> Result<ContentAddress, StorageError>;

    async fn load(&self, address: &ContentAddress) -> Result<Option<ContentNode>, StorageError>;

    async fn contains(&self, address: &ContentAddress) -> Result<bool, StorageError>;

    /// Number of distinct objects held.
    async fn object_count(&self) -> Result<usize, StorageError>;

    /// Store several nodes at once. Backends with native batches make this all-or-nothing.
    async fn add_batch(&self, nodes: Vec<ContentNode>) -> Result<Vec<ContentAddress>, StorageError> {
        let mut addresses = Vec::with_capacity(nodes.len());
        for node in nodes {
            addresses.push(self.add(node).await?);
        }
        Ok(addresses)
    }
}

/// Load a node that must exist.
pub async fn load_required(
    store: &dyn ObjectStore,
    address: &ContentAddress,
) -> Result<ContentNode, StorageError> {
    store
        .load(address)
        .await?
        .ok_or(StorageError::ObjectNotFound(*address))
}

/// Resolve an address to a read-only filesystem view of the tree it names.
///
/// A leaf resolves to a view whose root is that single file.
pub async fn resolve(
    store: Arc<dyn ObjectStore>,
    address: ContentAddress,
) -> Result<Arc<dyn FileSystem>, FsError> {
    let view = ContentFs::open(store, address).await?;
    Ok(Arc::new(view))
}
