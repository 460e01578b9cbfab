//! Persistence layer for the object store

use crate::error::StorageError;
use crate::store::{hasher, ContentNode, ObjectStore};
use crate::types::ContentAddress;
use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, trace};

/// Sled-based implementation of [`ObjectStore`]
///
/// Keys are the raw 32-byte addresses, values the bincode encoding of the node. Every load
/// re-hashes the decoded node, so a corrupted value surfaces as `HashMismatch` instead of
/// silently returning wrong content.
#[derive(Debug)]
pub struct SledObjectStore {
    db: sled::Db,
}

impl SledObjectStore {
    /// Create a new SledObjectStore at the given path
    ///
    /// The path can be a directory (sled will create a database there) or
    /// a file path (sled will use it as the database file).
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path).map_err(|e| {
            StorageError::Backend(format!("Failed to open sled database: {}", e))
        })?;
        Ok(Self { db })
    }

    /// Open a throwaway database that is deleted on drop.
    pub fn temporary() -> Result<Self, StorageError> {
        let db = sled::Config::new().temporary(true).open().map_err(|e| {
            StorageError::Backend(format!("Failed to open temporary sled database: {}", e))
        })?;
        Ok(Self { db })
    }

    /// Get the underlying sled database (for advanced operations)
    pub fn db(&self) -> &sled::Db {
        &self.db
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db
            .flush()
            .map_err(|e| StorageError::Backend(format!("Failed to flush database: {}", e)))?;
        Ok(())
    }

    fn encode(node: &ContentNode) -> Result<Vec<u8>, StorageError> {
        bincode::serialize(node)
            .map_err(|e| StorageError::Codec(format!("Failed to serialize object: {}", e)))
    }

    fn decode(address: &ContentAddress, bytes: &[u8]) -> Result<ContentNode, StorageError> {
        let node: ContentNode = bincode::deserialize(bytes)
            .map_err(|e| StorageError::Codec(format!("Failed to deserialize object: {}", e)))?;
        let actual = hasher::address_of(&node);
        if actual != *address {
            return Err(StorageError::HashMismatch {
                expected: *address,
                actual,
            });
        }
        Ok(node)
    }
}

#[async_trait]
impl ObjectStore for SledObjectStore {
    async fn add(&self, node: ContentNode) -> Result<ContentAddress, StorageError> {
        let address = node.address();
        let key = address.as_bytes().as_slice();
        if self.contains(&address).await? {
            return Ok(address);
        }

        let value = Self::encode(&node)?;
        self.db
            .insert(key, value)
            .map_err(|e| StorageError::Backend(format!("Failed to put object: {}", e)))?;
        trace!(address = %address.short(), "Stored object");
        Ok(address)
    }

    async fn load(&self, address: &ContentAddress) -> Result<Option<ContentNode>, StorageError> {
        match self
            .db
            .get(address.as_bytes().as_slice())
            .map_err(|e| StorageError::Backend(format!("Failed to get object: {}", e)))?
        {
            Some(value) => Ok(Some(Self::decode(address, &value)?)),
            None => Ok(None),
        }
    }

    async fn contains(&self, address: &ContentAddress) -> Result<bool, StorageError> {
        let exists = self.db.contains_key(address.as_bytes().as_slice()).map_err(|e| {
            StorageError::Backend(format!("Failed to check object existence: {}", e))
        })?;
        Ok(exists)
    }

    async fn object_count(&self) -> Result<usize, StorageError> {
        Ok(self.db.len())
    }

    /// Batch insert; sled applies the whole batch atomically.
    async fn add_batch(&self, nodes: Vec<ContentNode>) -> Result<Vec<ContentAddress>, StorageError> {
        let mut batch = sled::Batch::default();
        let mut addresses = Vec::with_capacity(nodes.len());

        for node in &nodes {
            let address = node.address();
            batch.insert(address.as_bytes().as_slice(), Self::encode(node)?);
            addresses.push(address);
        }

        self.db
            .apply_batch(batch)
            .map_err(|e| StorageError::Backend(format!("Failed to apply batch: {}", e)))?;
        debug!(objects = addresses.len(), "Applied object batch");

        Ok(addresses)
    }
}
