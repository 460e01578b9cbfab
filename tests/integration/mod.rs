//! Integration tests for remount

mod config_integration;
mod failure_atomicity;
mod mount_routing;
mod overlay_semantics;
mod patch_meld;
mod snapshot_roundtrip;
mod store_integration;
pub mod test_utils;
