//! Pure translation tables for protocol bridges.
//!
//! Bridges (kernel mounts, 9P servers, guest runtimes) consume the filesystem contract; these
//! helpers cover the data translation they share. No wire protocol lives here.

pub mod attr;
pub mod flags;

pub use attr::{errno, FileAttr};
pub use flags::{guest_to_options, ninep_to_options, options_to_guest, options_to_ninep};
