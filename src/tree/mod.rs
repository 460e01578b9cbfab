//! Conversions between live filesystem trees and sealed content trees.
//!
//! - [`snapshot`]: walk a filesystem and seal it into the object store
//! - [`clone`]: copy a tree between filesystems, or out of the store
//! - [`patch`], [`meld`], [`assemble`]: derive new sealed trees from existing ones

pub mod clone;
pub mod patch;
pub mod snapshot;

pub use clone::{clone, clone_address, Cloner};
pub use patch::{assemble, meld, patch};
pub use snapshot::{snapshot, Snapshotter, DEFAULT_MAX_CONCURRENCY};
