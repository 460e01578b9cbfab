//! A failing walk leaves the object store exactly as it was

use crate::integration::test_utils::{memory_tree, FaultyFs};
use remount::error::ErrorKind;
use remount::store::{MemoryObjectStore, ObjectStore, SledObjectStore};
use remount::tree::{self, Snapshotter};
use std::path::Path;
use std::sync::Arc;

const TREE: &[(&str, &[u8])] = &[
    ("a", b"readable"),
    ("nested/b", b"readable too"),
    ("nested/deeper/secret", b"unreadable"),
    ("z", b"last"),
];

#[tokio::test]
async fn test_unreadable_file_fails_snapshot_without_writes() {
    let store = Arc::new(MemoryObjectStore::new());
    let fs = FaultyFs::new(memory_tree(TREE).await, "nested/deeper/secret");

    let err = tree::snapshot(Arc::new(fs), store.clone(), Path::new(""))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Io);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_failed_snapshot_keeps_existing_objects() {
    let store = Arc::new(MemoryObjectStore::new());
    tree::snapshot(Arc::new(memory_tree(&[("pre", b"existing")]).await), store.clone(), Path::new(""))
        .await
        .unwrap();
    let before = store.addresses();

    let fs = FaultyFs::new(memory_tree(TREE).await, "z");
    assert!(tree::snapshot(Arc::new(fs), store.clone(), Path::new(""))
        .await
        .is_err());

    assert_eq!(store.addresses(), before);
}

#[tokio::test]
async fn test_failure_with_sled_and_low_concurrency() {
    let sled = Arc::new(SledObjectStore::temporary().unwrap());
    let fs = FaultyFs::new(memory_tree(TREE).await, "a");

    let snapshotter = Snapshotter::new(sled.clone(), 1);
    assert!(snapshotter.snapshot(Arc::new(fs), Path::new("")).await.is_err());
    assert_eq!(sled.object_count().await.unwrap(), 0);

    // The same tree without the fault seals fine afterwards
    let ok = snapshotter
        .snapshot(Arc::new(memory_tree(TREE).await), Path::new(""))
        .await
        .unwrap();
    assert!(sled.contains(&ok).await.unwrap());
}
