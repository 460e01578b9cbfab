//! Core identifier types.

use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Raw 32-byte BLAKE3 digest
pub type Hash = [u8; 32];

/// Address of a sealed [`crate::store::ContentNode`] in an object store.
///
/// Derived deterministically from the node's content, so identical trees always
/// share an address regardless of how or when they were submitted.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentAddress(Hash);

impl ContentAddress {
    pub const fn from_bytes(bytes: Hash) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &Hash {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short prefix for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }
}

impl fmt::Display for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentAddress({})", self.short())
    }
}

impl FromStr for ContentAddress {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let bytes = hex::decode(trimmed)
            .map_err(|e| ApiError::InvalidAddress(format!("{}: {}", trimmed, e)))?;
        let hash: Hash = bytes.try_into().map_err(|b: Vec<u8>| {
            ApiError::InvalidAddress(format!("expected 32 bytes, got {}", b.len()))
        })?;
        Ok(Self(hash))
    }
}
