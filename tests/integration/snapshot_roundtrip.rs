//! Snapshot, clone and determinism across backends

use crate::integration::test_utils::{memory_tree, CountingFs};
use remount::store::{MemoryObjectStore, ObjectStore};
use remount::tree::{self, Snapshotter};
use remount::vfs::{ops, FileSystem, LocalFs, MemoryFs};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const TREE: &[(&str, &[u8])] = &[
    ("readme.md", b"# remount"),
    ("src/lib.rs", b"pub mod vfs;"),
    ("src/vfs/mod.rs", b"pub mod memory;"),
    ("assets/empty", b""),
];

#[tokio::test]
async fn test_snapshot_then_clone_reproduces_tree() {
    let source = memory_tree(TREE).await;
    let store: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::new());
    let address = tree::snapshot(Arc::new(source), store.clone(), Path::new(""))
        .await
        .unwrap();

    let target = MemoryFs::new();
    tree::clone_address(store, address, Arc::new(target.clone()), Path::new(""))
        .await
        .unwrap();

    for (name, data) in TREE {
        assert_eq!(
            ops::read_file(&target, Path::new(name)).await.unwrap(),
            *data,
            "content of {}",
            name
        );
    }
    let top: Vec<String> = target
        .read_dir(Path::new(""))
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(top, vec!["assets", "readme.md", "src"]);
}

#[tokio::test]
async fn test_two_snapshots_without_mutation_agree() {
    let source = Arc::new(memory_tree(TREE).await);
    let store: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::new());

    let first = tree::snapshot(source.clone(), store.clone(), Path::new("")).await.unwrap();
    let second = tree::snapshot(source, store, Path::new("")).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_memory_and_local_backends_seal_identically() {
    let temp_dir = TempDir::new().unwrap();
    for (name, data) in TREE {
        let path = temp_dir.path().join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, data).unwrap();
    }

    let store: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::new());
    let local = LocalFs::new(temp_dir.path()).unwrap();
    let from_disk = tree::snapshot(Arc::new(local), store.clone(), Path::new(""))
        .await
        .unwrap();
    let from_memory = tree::snapshot(Arc::new(memory_tree(TREE).await), store, Path::new(""))
        .await
        .unwrap();

    assert_eq!(from_disk, from_memory);
}

#[tokio::test]
async fn test_clone_onto_local_disk() {
    let store: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::new());
    let address = tree::snapshot(Arc::new(memory_tree(TREE).await), store.clone(), Path::new(""))
        .await
        .unwrap();

    let temp_dir = TempDir::new().unwrap();
    let local = LocalFs::new(temp_dir.path()).unwrap();
    tree::clone_address(store, address, Arc::new(local), Path::new(""))
        .await
        .unwrap();

    assert_eq!(
        std::fs::read(temp_dir.path().join("src/vfs/mod.rs")).unwrap(),
        b"pub mod memory;"
    );
    assert!(temp_dir.path().join("assets").is_dir());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrency_bound_is_respected() {
    let mut files = Vec::new();
    let names: Vec<String> = (0..40).map(|i| format!("d{}/f{}", i % 5, i)).collect();
    for name in &names {
        files.push((name.as_str(), b"x".as_slice()));
    }
    let counting = Arc::new(CountingFs::new(memory_tree(&files).await));

    let store: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::new());
    let bounded = Snapshotter::new(store.clone(), 2);
    let address = bounded.snapshot(counting.clone(), Path::new("")).await.unwrap();

    assert!(counting.peak() <= 2, "peak concurrency was {}", counting.peak());

    let reference = tree::snapshot(Arc::new(memory_tree(&files).await), store, Path::new(""))
        .await
        .unwrap();
    assert_eq!(address, reference);
}
