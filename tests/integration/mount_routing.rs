//! Mount table routing across backends

use crate::integration::test_utils::memory_tree;
use remount::compose::{MountFs, OverlayFs};
use remount::error::ErrorKind;
use remount::store::{self, MemoryObjectStore, ObjectStore};
use remount::tree;
use remount::vfs::{ops, FileSystem, LocalFs};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn names(entries: Vec<remount::vfs::DirEntry>) -> Vec<String> {
    entries.into_iter().map(|e| e.name).collect()
}

#[tokio::test]
async fn test_root_lists_mount_points_and_forwards_paths() {
    let a = memory_tree(&[("foo", b"from a")]).await;
    let b = memory_tree(&[("bar", b"from b")]).await;

    let mut table = MountFs::new();
    table.mount("/a", Arc::new(a)).unwrap();
    table.mount("/b", Arc::new(b)).unwrap();

    assert_eq!(names(table.read_dir(Path::new("/")).await.unwrap()), vec!["a", "b"]);
    assert_eq!(ops::read_file(&table, Path::new("/a/foo")).await.unwrap(), b"from a");
    assert!(table.stat(Path::new("/a/bar")).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_longest_prefix_wins() {
    let outer = memory_tree(&[("inner/shadowed", b"outer")]).await;
    let inner = memory_tree(&[("file", b"inner")]).await;

    let mut table = MountFs::new();
    table.mount("data", Arc::new(outer)).unwrap();
    table.mount("data/inner", Arc::new(inner)).unwrap();

    assert_eq!(
        ops::read_file(&table, Path::new("data/inner/file")).await.unwrap(),
        b"inner"
    );
    assert!(table
        .stat(Path::new("data/inner/shadowed"))
        .await
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn test_writes_land_in_the_routed_backend() {
    let temp_dir = TempDir::new().unwrap();
    let local = LocalFs::new(temp_dir.path()).unwrap();
    let scratch = memory_tree(&[]).await;

    let mut table = MountFs::new();
    table.mount("disk", Arc::new(local)).unwrap();
    table.mount("tmp", Arc::new(scratch.clone())).unwrap();

    ops::write_file(&table, Path::new("disk/out.txt"), b"on disk").await.unwrap();
    ops::write_file(&table, Path::new("tmp/out.txt"), b"in memory").await.unwrap();

    assert_eq!(std::fs::read(temp_dir.path().join("out.txt")).unwrap(), b"on disk");
    assert_eq!(
        ops::read_file(&scratch, Path::new("out.txt")).await.unwrap(),
        b"in memory"
    );
}

#[tokio::test]
async fn test_cross_mount_rename_is_rejected() {
    let mut table = MountFs::new();
    table.mount("a", Arc::new(memory_tree(&[("f", b"1")]).await)).unwrap();
    table.mount("b", Arc::new(memory_tree(&[]).await)).unwrap();

    let err = table
        .rename(Path::new("a/f"), Path::new("b/f"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_overlay_over_sealed_tree_inside_mount_table() {
    let objects: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::new());
    let base = tree::snapshot(
        Arc::new(memory_tree(&[("lib/core", b"v1")]).await),
        objects.clone(),
        Path::new(""),
    )
    .await
    .unwrap();

    let sealed = store::resolve(objects.clone(), base).await.unwrap();
    let scratch = memory_tree(&[]).await;
    let workspace = OverlayFs::new(Arc::new(scratch), sealed.clone());

    let mut table = MountFs::new();
    table.mount("work", Arc::new(workspace)).unwrap();
    table.mount("pristine", sealed).unwrap();

    ops::write_file(&table, Path::new("work/lib/core"), b"v2").await.unwrap();

    assert_eq!(ops::read_file(&table, Path::new("work/lib/core")).await.unwrap(), b"v2");
    assert_eq!(
        ops::read_file(&table, Path::new("pristine/lib/core")).await.unwrap(),
        b"v1"
    );
    assert_eq!(
        ops::write_file(&table, Path::new("pristine/lib/core"), b"nope")
            .await
            .unwrap_err()
            .kind(),
        ErrorKind::ReadOnly
    );
}
