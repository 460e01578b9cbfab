//! Shared test utilities for integration tests
//!
//! Tree builders, filesystems that misbehave on purpose, and environment isolation for
//! configuration tests.

use async_trait::async_trait;
use remount::error::FsError;
use remount::store::ObjectStore;
use remount::tree;
use remount::types::ContentAddress;
use remount::vfs::{ops, DirEntry, FileSystem, Metadata, MemoryFs, OpenOptions, VirtualFile};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Build an in-memory tree from `(path, contents)` pairs, creating parent directories.
pub async fn memory_tree(files: &[(&str, &[u8])]) -> MemoryFs {
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

/// Seal an in-memory tree built from `files`.
pub async fn seal(store: Arc<dyn ObjectStore>, files: &[(&str, &[u8])]) -> ContentAddress {
    let fs = memory_tree(files).await;
    tree::snapshot(Arc::new(fs), store, Path::new("")).await.unwrap()
}

/// Delegates to an inner filesystem but refuses to open one path.
#[derive(Debug)]
pub struct FaultyFs {
    inner: MemoryFs,
    poisoned: PathBuf,
}

impl FaultyFs {
    pub fn new(inner: MemoryFs, poisoned: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            poisoned: poisoned.into(),
        }
    }
}

#[async_trait]
impl FileSystem for FaultyFs {
    async fn open_file(
        &self,
        path: &Path,
        options: &OpenOptions,
    ) -> Result<Box<dyn VirtualFile>, FsError> {
        if remount::vfs::path::normalize(path)? == self.poisoned {
            return Err(FsError::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("permission denied: {}", self.poisoned.display()),
            )));
        }
        self.inner.open_file(path, options).await
    }

    async fn stat(&self, path: &Path) -> Result<Metadata, FsError> {
        self.inner.stat(path).await
    }

    async fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>, FsError> {
        self.inner.read_dir(path).await
    }

    async fn mkdir(&self, path: &Path) -> Result<(), FsError> {
        self.inner.mkdir(path).await
    }

    async fn remove(&self, path: &Path) -> Result<(), FsError> {
        self.inner.remove(path).await
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<(), FsError> {
        self.inner.rename(from, to).await
    }
}

/// Delegates to an inner filesystem and records the peak number of concurrent opens.
#[derive(Debug)]
pub struct CountingFs {
    inner: MemoryFs,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl CountingFs {
    pub fn new(inner: MemoryFs) -> Self {
        Self {
            inner,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileSystem for CountingFs {
    async fn open_file(
        &self,
        path: &Path,
        options: &OpenOptions,
    ) -> Result<Box<dyn VirtualFile>, FsError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        // Give other tasks a chance to pile up behind the limiter
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
        let result = self.inner.open_file(path, options).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn stat(&self, path: &Path) -> Result<Metadata, FsError> {
        self.inner.stat(path).await
    }

    async fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>, FsError> {
        self.inner.read_dir(path).await
    }

    async fn mkdir(&self, path: &Path) -> Result<(), FsError> {
        self.inner.mkdir(path).await
    }

    async fn remove(&self, path: &Path) -> Result<(), FsError> {
        self.inner.remove(path).await
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<(), FsError> {
        self.inner.rename(from, to).await
    }
}

/// Global mutex to serialize environment variable access across all tests
static ENV_MUTEX: Mutex<()> = Mutex::new(());

const ISOLATED_VARS: &[&str] = &["HOME", "XDG_CONFIG_HOME", "REMOUNT_ENV"];

/// Environment variable state to restore after test
struct EnvState {
    saved: Vec<(&'static str, Option<String>)>,
}

impl EnvState {
    fn capture() -> Self {
        Self {
            saved: ISOLATED_VARS
                .iter()
                .map(|name| (*name, std::env::var(name).ok()))
                .collect(),
        }
    }

    fn restore(self) {
        for (name, value) in self.saved {
            match value {
                Some(value) => std::env::set_var(name, value),
                None => std::env::remove_var(name),
            }
        }
    }
}

/// Run `f` with HOME and XDG_CONFIG_HOME pointed into a fresh temp dir.
///
/// The closure receives the temp dir root; the global config file lives at
/// `<root>/xdg/remount/config.toml`.
pub fn with_isolated_env<F, R>(f: F) -> R
where
    F: FnOnce(&Path) -> R,
{
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let temp_dir = TempDir::new().unwrap();
    let state = EnvState::capture();

    std::env::set_var("HOME", temp_dir.path().join("home"));
    std::env::set_var("XDG_CONFIG_HOME", temp_dir.path().join("xdg"));
    std::env::remove_var("REMOUNT_ENV");

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| f(temp_dir.path())));
    state.restore();

    match result {
        Ok(value) => value,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}
