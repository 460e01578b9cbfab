//! Error types for the remount virtual filesystem layer.

use crate::types::ContentAddress;
use std::io;
use thiserror::Error;

/// Coarse classification of an [`FsError`].
///
/// Composers branch on this (most importantly on `NotFound`), never on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    NotADirectory,
    NotAFile,
    AlreadyExists,
    Conflict,
    ReadOnly,
    InvalidPath,
    Unsupported,
    StoreFailure,
    Io,
}

/// Errors produced by the abstract filesystem contract and everything built on it.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Not a file: {0}")]
    NotAFile(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Invalid rename or remove target (non-empty directory, mount point, cross-mount move...).
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Read-only filesystem: {0}")]
    ReadOnly(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// A capability the backend deliberately does not implement.
    #[error("Not supported: {0}")]
    Unsupported(&'static str),

    /// The underlying store call failed.
    #[error("Store failure: {0}")]
    StoreFailure(String),

    #[error("I/O error: {0}")]
    Io(io::Error),
}

impl FsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FsError::NotFound(_) => ErrorKind::NotFound,
            FsError::NotADirectory(_) => ErrorKind::NotADirectory,
            FsError::NotAFile(_) => ErrorKind::NotAFile,
            FsError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            FsError::Conflict(_) => ErrorKind::Conflict,
            FsError::ReadOnly(_) => ErrorKind::ReadOnly,
            FsError::InvalidPath(_) => ErrorKind::InvalidPath,
            FsError::Unsupported(_) => ErrorKind::Unsupported,
            FsError::StoreFailure(_) => ErrorKind::StoreFailure,
            FsError::Io(_) => ErrorKind::Io,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub(crate) fn not_found(path: impl AsRef<std::path::Path>) -> Self {
        FsError::NotFound(path.as_ref().display().to_string())
    }
}

impl From<io::Error> for FsError {
    fn from(err: io::Error) -> Self {
        let detail = err.to_string();
        match err.kind() {
            io::ErrorKind::NotFound => FsError::NotFound(detail),
            io::ErrorKind::AlreadyExists => FsError::AlreadyExists(detail),
            io::ErrorKind::NotADirectory => FsError::NotADirectory(detail),
            io::ErrorKind::IsADirectory => FsError::NotAFile(detail),
            io::ErrorKind::DirectoryNotEmpty => FsError::Conflict(detail),
            io::ErrorKind::ReadOnlyFilesystem => FsError::ReadOnly(detail),
            io::ErrorKind::Unsupported => FsError::Unsupported("operation unsupported by host"),
            _ => FsError::Io(err),
        }
    }
}

/// Object store errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    ObjectNotFound(ContentAddress),

    #[error("Hash mismatch: expected {expected}, got {actual}")]
    HashMismatch {
        expected: ContentAddress,
        actual: ContentAddress,
    },

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] io::Error),
}

impl From<StorageError> for FsError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ObjectNotFound(address) => {
                FsError::NotFound(format!("object {}", address))
            }
            other => FsError::StoreFailure(other.to_string()),
        }
    }
}

/// Errors surfaced at the CLI and configuration boundary
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid content address: {0}")]
    InvalidAddress(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Fs(#[from] FsError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
