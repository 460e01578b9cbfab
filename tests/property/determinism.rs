//! Property-based tests for determinism guarantees

use proptest::prelude::*;
use remount::store::{MemoryObjectStore, ObjectStore};
use remount::tree;
use remount::types::ContentAddress;
use remount::vfs::{ops, FileSystem, MemoryFs};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Random file trees: paths of one to three segments over a small alphabet so that
/// directories are shared, with no path that is both a file and a directory.
fn file_tree() -> impl Strategy<Value = BTreeMap<String, Vec<u8>>> {
    let segment = prop::sample::select(vec!["a", "b", "c", "d"]);
    let path = prop::collection::vec(segment, 1..=3).prop_map(|segments| segments.join("/"));
    prop::collection::btree_map(path, prop::collection::vec(any::<u8>(), 0..64), 1..12).prop_map(
        |files| {
            let keys: Vec<String> = files.keys().cloned().collect();
            files
                .into_iter()
                .filter(|(path, _)| {
                    let as_dir = format!("{}/", path);
                    !keys.iter().any(|other| other.starts_with(&as_dir))
                })
                .collect()
        },
    )
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

async fn build<'a>(files: impl Iterator<Item = (&'a String, &'a Vec<u8>)>) -> MemoryFs {
    let fs = MemoryFs::new();
    for (name, data) in files {
        let path = Path::new(name);
        if let Some(parent) = path.parent() {
            fs.mkdir_all(parent).await.unwrap();
        }
        ops::write_file(&fs, path, data).await.unwrap();
    }
    fs
}

async fn seal(fs: MemoryFs, store: Arc<dyn ObjectStore>) -> ContentAddress {
    tree::snapshot(Arc::new(fs), store, Path::new("")).await.unwrap()
}

/// Test that insertion order never changes the address
#[test]
fn test_snapshot_independent_of_insertion_order() {
    let rt = runtime();
    let mut runner = proptest::test_runner::TestRunner::new(ProptestConfig::with_cases(48));

    runner
        .run(&file_tree(), |files| {
            let (forward, backward) = rt.block_on(async {
                let store: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::new());
                let forward = seal(build(files.iter()).await, store.clone()).await;
                let backward = seal(build(files.iter().rev()).await, store).await;
                (forward, backward)
            });
            prop_assert_eq!(forward, backward);
            Ok(())
        })
        .unwrap();
}

/// Test that snapshot then clone reproduces every file, and resealing gives the same address
#[test]
fn test_snapshot_clone_round_trip() {
    let rt = runtime();
    let mut runner = proptest::test_runner::TestRunner::new(ProptestConfig::with_cases(48));

    runner
        .run(&file_tree(), |files| {
            let (original, resealed, copies) = rt.block_on(async {
                let store: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::new());
                let original = seal(build(files.iter()).await, store.clone()).await;

                let target = MemoryFs::new();
                tree::clone_address(store.clone(), original, Arc::new(target.clone()), Path::new(""))
                    .await
                    .unwrap();

                let mut copies = BTreeMap::new();
                for name in files.keys() {
                    copies.insert(
                        name.clone(),
                        ops::read_file(&target, Path::new(name)).await.unwrap(),
                    );
                }
                let resealed = seal(target, store).await;
                (original, resealed, copies)
            });

            prop_assert_eq!(original, resealed);
            prop_assert_eq!(copies, files);
            Ok(())
        })
        .unwrap();
}

/// Test that changing any single file changes the root address
#[test]
fn test_any_edit_changes_address() {
    let rt = runtime();
    let mut runner = proptest::test_runner::TestRunner::new(ProptestConfig::with_cases(48));

    runner
        .run(&(file_tree(), any::<u8>()), |(files, extra)| {
            let (before, after) = rt.block_on(async {
                let store: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::new());
                let before = seal(build(files.iter()).await, store.clone()).await;

                let edited = build(files.iter()).await;
                let victim = files.keys().next().unwrap();
                let mut data = ops::read_file(&edited, Path::new(victim)).await.unwrap();
                data.push(extra);
                ops::write_file(&edited, Path::new(victim), &data).await.unwrap();

                let after = seal(edited, store).await;
                (before, after)
            });
            prop_assert_ne!(before, after);
            Ok(())
        })
        .unwrap();
}

/// Test that listings of a sealed tree come back sorted by name
#[test]
fn test_sealed_listing_is_sorted() {
    let rt = runtime();
    let mut runner = proptest::test_runner::TestRunner::new(ProptestConfig::with_cases(32));

    runner
        .run(&file_tree(), |files| {
            let names = rt.block_on(async {
                let store: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::new());
                let root = seal(build(files.iter()).await, store.clone()).await;
                let view = remount::store::resolve(store, root).await.unwrap();
                view.read_dir(Path::new(""))
                    .await
                    .unwrap()
                    .into_iter()
                    .map(|e| e.name)
                    .collect::<Vec<_>>()
            });
            let mut sorted = names.clone();
            sorted.sort();
            prop_assert_eq!(names, sorted);
            Ok(())
        })
        .unwrap();
}
