//! Patch, meld and assemble over a shared object store

use crate::integration::test_utils::seal;
use remount::error::{ErrorKind, FsError};
use remount::store::{self, MemoryObjectStore, ObjectStore};
use remount::tree;
use remount::vfs::{ops, FileSystem};
use std::path::Path;
use std::sync::Arc;

fn memory_store() -> Arc<dyn ObjectStore> {
    Arc::new(MemoryObjectStore::new())
}

#[tokio::test]
async fn test_patch_adds_file_and_old_tree_still_resolves() {
    let objects = memory_store();
    let base = seal(objects.clone(), &[("a", b"1"), ("dir/b", b"2")]).await;

    let patched = tree::patch(objects.clone(), base, |fs| async move {
        ops::write_file(fs.as_ref(), Path::new("/new"), b"hi").await
    })
    .await
    .unwrap();

    let view = store::resolve(objects.clone(), patched).await.unwrap();
    assert_eq!(ops::read_file(view.as_ref(), Path::new("new")).await.unwrap(), b"hi");
    assert_eq!(ops::read_file(view.as_ref(), Path::new("dir/b")).await.unwrap(), b"2");

    let old = store::resolve(objects, base).await.unwrap();
    assert!(old.stat(Path::new("new")).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_failed_patch_adds_no_objects() {
    let objects = memory_store();
    let base = seal(objects.clone(), &[("a", b"1")]).await;
    let before = objects.object_count().await.unwrap();

    let err = tree::patch(objects.clone(), base, |fs| async move {
        ops::write_file(fs.as_ref(), Path::new("partial"), b"unsealed").await?;
        fs.mkdir(Path::new("missing/parent")).await
    })
    .await
    .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(objects.object_count().await.unwrap(), before);
    let old = store::resolve(objects, base).await.unwrap();
    assert_eq!(ops::read_file(old.as_ref(), Path::new("a")).await.unwrap(), b"1");
}

#[tokio::test]
async fn test_meld_is_not_commutative_on_conflicts() {
    let objects = memory_store();
    let a = seal(objects.clone(), &[("x", b"a"), ("only_a", b"")]).await;
    let b = seal(objects.clone(), &[("x", b"b"), ("only_b", b"")]).await;

    let ab = tree::meld(objects.clone(), a, b).await.unwrap();
    let ba = tree::meld(objects.clone(), b, a).await.unwrap();
    assert_ne!(ab, ba);

    let view = store::resolve(objects, ab).await.unwrap();
    assert_eq!(ops::read_file(view.as_ref(), Path::new("x")).await.unwrap(), b"b");
    let names: Vec<String> = view
        .read_dir(Path::new(""))
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(names, vec!["only_a", "only_b", "x"]);
}

#[tokio::test]
async fn test_meld_of_disjoint_trees_commutes() {
    let objects = memory_store();
    let a = seal(objects.clone(), &[("left", b"l")]).await;
    let b = seal(objects.clone(), &[("right", b"r")]).await;

    assert_eq!(
        tree::meld(objects.clone(), a, b).await.unwrap(),
        tree::meld(objects, b, a).await.unwrap()
    );
}

#[tokio::test]
async fn test_meld_with_missing_tree_fails() {
    let objects = memory_store();
    let a = seal(objects.clone(), &[("left", b"l")]).await;
    let missing = remount::types::ContentAddress::from_bytes([7u8; 32]);

    let err = tree::meld(objects, a, missing).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_assemble_then_patch_inside_entry() {
    let objects = memory_store();
    let app = seal(objects.clone(), &[("main", b"fn main() {}")]).await;
    let docs = seal(objects.clone(), &[("guide", b"read me")]).await;

    let bundle = tree::assemble(objects.clone(), vec![("app", app), ("docs", docs)])
        .await
        .unwrap();
    let patched = tree::patch(objects.clone(), bundle, |fs| async move {
        ops::write_file(fs.as_ref(), Path::new("docs/faq"), b"?").await?;
        Ok::<(), FsError>(())
    })
    .await
    .unwrap();

    let view = store::resolve(objects, patched).await.unwrap();
    assert_eq!(ops::read_file(view.as_ref(), Path::new("app/main")).await.unwrap(), b"fn main() {}");
    assert_eq!(ops::read_file(view.as_ref(), Path::new("docs/faq")).await.unwrap(), b"?");
}
