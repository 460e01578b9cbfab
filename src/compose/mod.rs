//! Runtime composition of filesystems.
//!
//! - [`OverlayFs`]: copy-on-write pair, upper over lower
//! - [`MountFs`]: namespace built from several filesystems mounted at paths

pub mod mount;
pub mod overlay;

pub use mount::{MountFs, VirtualDir};
pub use overlay::{MergedDir, OverlayFs};
