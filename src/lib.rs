//! Remount: Composable Virtual Filesystems
//!
//! One abstract filesystem contract ([`vfs::FileSystem`]) with in-memory and host-backed
//! implementations, runtime composition through overlays and mount tables, and a
//! content-addressed store that seals live trees into immutable snapshots and derives new
//! ones from them (clone, patch, meld, assemble).

pub mod bridge;
pub mod cli;
pub mod compose;
pub mod config;
pub mod error;
pub mod logging;
pub mod store;
pub mod tree;
pub mod types;
pub mod vfs;
