//! Overlay precedence, merging and copy-up

use crate::integration::test_utils::{memory_tree, seal};
use remount::compose::OverlayFs;
use remount::error::ErrorKind;
use remount::store::{MemoryObjectStore, ObjectStore};
use remount::tree;
use remount::vfs::{ops, FileSystem, OpenOptions};
use std::path::Path;
use std::sync::Arc;

#[tokio::test]
async fn test_upper_wins_on_shared_name() {
    let upper = memory_tree(&[("a", b"1")]).await;
    let lower = memory_tree(&[("a", b"2")]).await;
    let overlay = OverlayFs::new(Arc::new(upper), Arc::new(lower));

    assert_eq!(ops::read_file(&overlay, Path::new("/a")).await.unwrap(), b"1");
}

#[tokio::test]
async fn test_listing_is_union_of_layers() {
    let upper = memory_tree(&[("x", b"")]).await;
    let lower = memory_tree(&[("y", b"")]).await;
    let overlay = OverlayFs::new(Arc::new(upper), Arc::new(lower));

    let names: Vec<String> = overlay
        .read_dir(Path::new("/"))
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(names, vec!["x", "y"]);
}

#[tokio::test]
async fn test_write_to_lower_file_copies_up_and_leaves_lower_untouched() {
    let upper = memory_tree(&[]).await;
    let lower = memory_tree(&[("docs/notes", b"original")]).await;
    let overlay = OverlayFs::new(Arc::new(upper.clone()), Arc::new(lower.clone()));

    let mut handle = overlay
        .open_file(Path::new("docs/notes"), &OpenOptions::new().append(true))
        .await
        .unwrap();
    ops::write_all(handle.as_mut(), b" + edit").await.unwrap();
    handle.close().await.unwrap();

    assert_eq!(
        ops::read_file(&overlay, Path::new("docs/notes")).await.unwrap(),
        b"original + edit"
    );
    assert_eq!(
        ops::read_file(&upper, Path::new("docs/notes")).await.unwrap(),
        b"original + edit"
    );
    assert_eq!(
        ops::read_file(&lower, Path::new("docs/notes")).await.unwrap(),
        b"original"
    );
}

#[tokio::test]
async fn test_removing_lower_entry_does_not_hide_it() {
    let upper = memory_tree(&[]).await;
    let lower = memory_tree(&[("keep", b"still here")]).await;
    let overlay = OverlayFs::new(Arc::new(upper), Arc::new(lower));

    overlay.remove(Path::new("keep")).await.unwrap();
    assert_eq!(
        ops::read_file(&overlay, Path::new("keep")).await.unwrap(),
        b"still here"
    );
}

#[tokio::test]
async fn test_nested_directories_merge() {
    let upper = memory_tree(&[("shared/up", b"u")]).await;
    let lower = memory_tree(&[("shared/down", b"d")]).await;
    let overlay = OverlayFs::new(Arc::new(upper), Arc::new(lower));

    let names: Vec<String> = overlay
        .read_dir(Path::new("shared"))
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(names, vec!["down", "up"]);
}

#[tokio::test]
async fn test_upper_file_shadows_lower_directory_subtree() {
    let upper = memory_tree(&[("x", b"UPPER")]).await;
    let lower = memory_tree(&[("x/inner", b"LOWER"), ("x/sub/deep", b"LOWER")]).await;
    let overlay = OverlayFs::new(Arc::new(upper), Arc::new(lower));

    for hidden in ["x/inner", "x/sub", "x/sub/deep"] {
        let path = Path::new(hidden);
        assert_eq!(overlay.open(path).await.unwrap_err().kind(), ErrorKind::NotADirectory);
        assert_eq!(overlay.stat(path).await.unwrap_err().kind(), ErrorKind::NotADirectory);
        assert_eq!(overlay.lstat(path).await.unwrap_err().kind(), ErrorKind::NotADirectory);
    }
    let err = overlay.read_dir(Path::new("x")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotADirectory);
    let err = overlay.read_dir(Path::new("x/sub")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotADirectory);

    assert!(overlay.stat(Path::new("x")).await.unwrap().is_file());
    assert_eq!(ops::read_file(&overlay, Path::new("x")).await.unwrap(), b"UPPER");
}

#[tokio::test]
async fn test_meld_file_over_directory_seals_the_file() {
    let store: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::new());
    let lower = seal(store.clone(), &[("x/inner", b"LOWER"), ("keep", b"k")]).await;
    let upper = seal(store.clone(), &[("x", b"UPPER")]).await;

    let melded = tree::meld(store.clone(), lower, upper).await.unwrap();
    let view = remount::store::resolve(store, melded).await.unwrap();

    assert_eq!(ops::read_file(view.as_ref(), Path::new("x")).await.unwrap(), b"UPPER");
    assert_eq!(ops::read_file(view.as_ref(), Path::new("keep")).await.unwrap(), b"k");
    let err = view.stat(Path::new("x/inner")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotADirectory);
}
