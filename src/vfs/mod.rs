//! Abstract filesystem contract and its concrete backends.
//!
//! Every backend implements [`FileSystem`]; composers in [`crate::compose`] and the
//! tree engines in [`crate::tree`] only ever see `Arc<dyn FileSystem>`.

pub mod local;
pub mod memory;
pub mod ops;
pub mod path;
pub mod sub;
pub mod traits;

pub use local::LocalFs;
pub use memory::MemoryFs;
pub use sub::{sub, SubFs};
pub use traits::{DirEntry, EntryType, FileSystem, Metadata, OpenOptions, VirtualFile};
