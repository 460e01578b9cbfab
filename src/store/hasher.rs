//! Content addressing for [`ContentNode`]s using BLAKE3
//!
//! The address is a pure function of the node's content: a type discriminator followed by
//! length-prefixed fields, with directory entries taken in name order. Where or when a node
//! was produced never enters the digest.

use crate::store::ContentNode;
use crate::types::{ContentAddress, Hash};
use blake3::Hasher;
use std::collections::BTreeMap;

/// Compute the address of a leaf
///
/// Address = hash("leaf" || data_len || data)
pub fn leaf_address(data: &[u8]) -> ContentAddress {
    let mut hasher = Hasher::new();

    // Hash type discriminator
    hasher.update(b"leaf");

    // Hash data length (8 bytes, big-endian for determinism)
    hasher.update(&(data.len() as u64).to_be_bytes());

    hasher.update(data);

    ContentAddress::from_bytes(*hasher.finalize().as_bytes())
}

/// Compute the address of a directory
///
/// Address = hash("directory" || entry_count || (name_len || name || child_address)*)
///
/// `BTreeMap` iteration gives the entries in name order.
pub fn directory_address(entries: &BTreeMap<String, ContentAddress>) -> ContentAddress {
    let mut hasher = Hasher::new();

    // Hash type discriminator
    hasher.update(b"directory");

    // Hash entry count (8 bytes, big-endian)
    hasher.update(&(entries.len() as u64).to_be_bytes());

    for (name, address) in entries {
        hasher.update(&(name.len() as u64).to_be_bytes());
        hasher.update(name.as_bytes());
        hasher.update(address.as_bytes());
    }

    ContentAddress::from_bytes(*hasher.finalize().as_bytes())
}

pub fn address_of(node: &ContentNode) -> ContentAddress {
    match node {
        ContentNode::Leaf { data } => leaf_address(data),
        ContentNode::Directory { entries } => directory_address(entries),
    }
}

/// Compute a generic hash of arbitrary data
pub fn compute_hash(data: &[u8]) -> Hash {
    let mut hasher = Hasher::new();
    hasher.update(data);
    *hasher.finalize().as_bytes()
}
