//! Configuration System
//!
//! Layered configuration for the store backend, snapshot concurrency and logging. Built-in
//! defaults, the global config file, workspace files and `REMOUNT__*` environment variables
//! are merged in that order by [`ConfigLoader`].

use crate::logging::LoggingConfig;
use crate::tree::DEFAULT_MAX_CONCURRENCY;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod facade;
mod merge {
    pub mod merge_policy;
}
mod sources {
    pub mod global_file;
    pub mod workspace_file;
}

pub use facade::ConfigLoader;
pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemountConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub snapshot: SnapshotConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which object store backs sealed trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local; everything is lost on exit.
    Memory,
    /// Persistent sled database at `StoreConfig::path`.
    Sled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,

    /// Database directory for the sled backend. Relative paths resolve against the workspace.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_backend() -> StoreBackend {
    StoreBackend::Sled
}

/// `<platform data dir>/remount/store`, or `.remount/store` when no home directory is known.
pub fn default_store_path() -> PathBuf {
    directories::ProjectDirs::from("", "", "remount")
        .map(|dirs| dirs.data_dir().join("store"))
        .unwrap_or_else(|| PathBuf::from(".remount").join("store"))
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_store_path(),
        }
    }
}

impl StoreConfig {
    /// Store path with relative paths resolved against `workspace_root`.
    pub fn resolve_path(&self, workspace_root: &Path) -> PathBuf {
        if self.path.is_absolute() {
            self.path.clone()
        } else {
            workspace_root.join(&self.path)
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.backend == StoreBackend::Sled && self.path.as_os_str().is_empty() {
            return Err("Store path cannot be empty for the sled backend".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Upper bound on concurrent open/read/submit sections during a walk.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
        }
    }
}

impl SnapshotConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrency == 0 {
            return Err("max_concurrency must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Store(String),
    Snapshot(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Store(msg) => write!(f, "Store: {}", msg),
            ValidationError::Snapshot(msg) => write!(f, "Snapshot: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl RemountConfig {
    /// Validate the entire configuration, collecting every problem.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.store.validate() {
            errors.push(ValidationError::Store(e));
        }
        if let Err(e) = self.snapshot.validate() {
            errors.push(ValidationError::Snapshot(e));
        }
        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Effective configuration rendered as TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
