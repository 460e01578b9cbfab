//! Attribute projection and errno mapping for kernel-facing bridges

use crate::error::FsError;
use crate::store::hasher::compute_hash;
use crate::vfs::{path, EntryType, Metadata};
use std::io;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

pub const S_IFMT: u32 = 0o170000;
pub const S_IFREG: u32 = 0o100000;
pub const S_IFDIR: u32 = 0o040000;
pub const S_IFLNK: u32 = 0o120000;

pub const EIO: i32 = 5;
pub const ENOENT: i32 = 2;
pub const EEXIST: i32 = 17;
pub const ENOTDIR: i32 = 20;
pub const EISDIR: i32 = 21;
pub const EINVAL: i32 = 22;
pub const EROFS: i32 = 30;
pub const ENOTEMPTY: i32 = 39;
pub const ENOTSUP: i32 = 95;

/// Attributes in the shape a kernel mount bridge reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileAttr {
    /// Stable per path: the first eight bytes of the path digest.
    pub ino: u64,
    pub size: u64,
    /// Permission bits plus the `S_IF*` type bits.
    pub mode: u32,
    pub mtime: SystemTime,
    pub kind: EntryType,
}

impl FileAttr {
    pub fn from_metadata(path: &Path, metadata: &Metadata) -> Self {
        let type_bits = match metadata.entry_type {
            EntryType::File => S_IFREG,
            EntryType::Directory => S_IFDIR,
            EntryType::Symlink => S_IFLNK,
        };
        Self {
            ino: inode(path),
            size: metadata.size,
            mode: type_bits | (metadata.mode & !S_IFMT),
            mtime: metadata.modified.unwrap_or(UNIX_EPOCH),
            kind: metadata.entry_type,
        }
    }
}

/// Inode number for a path. `/`, `.` and `a/../` spellings of one path agree.
pub fn inode(p: &Path) -> u64 {
    let key = match path::normalize(p) {
        Ok(normalized) => path::display(&normalized),
        Err(_) => p.to_string_lossy().into_owned(),
    };
    let digest = compute_hash(key.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head)
}

/// POSIX errno for an error.
pub fn errno(err: &FsError) -> i32 {
    match err {
        FsError::NotFound(_) => ENOENT,
        FsError::NotADirectory(_) => ENOTDIR,
        FsError::NotAFile(_) => EISDIR,
        FsError::AlreadyExists(_) => EEXIST,
        FsError::Conflict(_) => ENOTEMPTY,
        FsError::ReadOnly(_) => EROFS,
        FsError::InvalidPath(_) => EINVAL,
        FsError::Unsupported(_) => ENOTSUP,
        FsError::StoreFailure(_) => EIO,
        FsError::Io(e) => e.raw_os_error().unwrap_or_else(|| io_kind_errno(e.kind())),
    }
}

fn io_kind_errno(kind: io::ErrorKind) -> i32 {
    match kind {
        io::ErrorKind::NotFound => ENOENT,
        io::ErrorKind::AlreadyExists => EEXIST,
        io::ErrorKind::InvalidInput => EINVAL,
        io::ErrorKind::Unsupported => ENOTSUP,
        _ => EIO,
    }
}
