//! Integration tests for the persistent object store

use crate::integration::test_utils::memory_tree;
use remount::store::{self, ContentNode, ObjectStore, SledObjectStore};
use remount::tree;
use remount::vfs::{ops, MemoryFs};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Test that a sealed tree survives closing and reopening the database
#[tokio::test]
async fn test_sealed_tree_survives_reopen() {
    let store_dir = TempDir::new().unwrap();

    let address = {
        let sled = Arc::new(SledObjectStore::new(store_dir.path()).unwrap());
        let fs = memory_tree(&[("etc/hosts", b"127.0.0.1 localhost"), ("motd", b"hello")]).await;
        let address = tree::snapshot(Arc::new(fs), sled.clone(), Path::new(""))
            .await
            .unwrap();
        sled.flush().unwrap();
        address
    };

    let reopened: Arc<dyn ObjectStore> = Arc::new(SledObjectStore::new(store_dir.path()).unwrap());
    let view = store::resolve(reopened, address).await.unwrap();
    assert_eq!(
        ops::read_file(view.as_ref(), Path::new("etc/hosts")).await.unwrap(),
        b"127.0.0.1 localhost"
    );
}

/// Test that identical subtrees are stored once
#[tokio::test]
async fn test_identical_subtrees_are_deduplicated() {
    let sled = Arc::new(SledObjectStore::temporary().unwrap());
    let fs = memory_tree(&[("a/x", b"same"), ("b/x", b"same")]).await;

    tree::snapshot(Arc::new(fs), sled.clone(), Path::new("")).await.unwrap();

    // root, one shared directory node, one shared leaf
    assert_eq!(sled.object_count().await.unwrap(), 3);
}

/// Test that every child address of a sealed directory resolves in the store
#[tokio::test]
async fn test_directory_entries_resolve() {
    let sled = Arc::new(SledObjectStore::temporary().unwrap());
    let fs = memory_tree(&[("one", b"1"), ("two/three", b"3")]).await;
    let root = tree::snapshot(Arc::new(fs), sled.clone(), Path::new(""))
        .await
        .unwrap();

    let node = store::load_required(sled.as_ref(), &root).await.unwrap();
    let ContentNode::Directory { entries } = node else {
        panic!("root should be a directory");
    };
    for address in entries.values() {
        assert!(sled.contains(address).await.unwrap());
    }
    assert_eq!(entries.len(), 2);
}

/// Test cloning out of a persistent store into a fresh memory filesystem
#[tokio::test]
async fn test_clone_from_sled_store() {
    let sled: Arc<dyn ObjectStore> = Arc::new(SledObjectStore::temporary().unwrap());
    let fs = memory_tree(&[("deep/er/file", b"bytes")]).await;
    let root = tree::snapshot(Arc::new(fs), sled.clone(), Path::new(""))
        .await
        .unwrap();

    let target = MemoryFs::new();
    tree::clone_address(sled, root, Arc::new(target.clone()), Path::new(""))
        .await
        .unwrap();
    assert_eq!(
        ops::read_file(&target, Path::new("deep/er/file")).await.unwrap(),
        b"bytes"
    );
}
