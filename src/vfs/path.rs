//! Path normalization shared by every backend and composer.
//!
//! Paths handed to a [`super::FileSystem`] are always relative to that filesystem's own
//! root. A leading `/`, `.` and empty segments are ignored, `..` pops one segment and may
//! not climb above the root. The root itself normalizes to the empty path.

use crate::error::FsError;
use std::path::{Component, Path, PathBuf};

/// Normalize a path to its canonical relative form.
pub fn normalize(path: &Path) -> Result<PathBuf, FsError> {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::RootDir | Component::CurDir => {}
            Component::ParentDir => {
                if !result.pop() {
                    return Err(FsError::InvalidPath(format!(
                        "{} escapes the filesystem root",
                        path.display()
                    )));
                }
            }
            Component::Normal(segment) => result.push(segment),
            Component::Prefix(_) => {
                return Err(FsError::InvalidPath(format!(
                    "{} carries a platform prefix",
                    path.display()
                )))
            }
        }
    }
    Ok(result)
}

/// Split a path into its normalized UTF-8 segments.
pub fn segments(path: &Path) -> Result<Vec<String>, FsError> {
    normalize(path)?
        .components()
        .map(|component| {
            component
                .as_os_str()
                .to_str()
                .map(str::to_owned)
                .ok_or_else(|| {
                    FsError::InvalidPath(format!("{} is not valid UTF-8", path.display()))
                })
        })
        .collect()
}

/// True when the path addresses the root (`""`, `"."`, `"/"`).
pub fn is_root(path: &Path) -> bool {
    matches!(normalize(path), Ok(p) if p.as_os_str().is_empty())
}

/// Parent of an already-normalized path; `None` for the root.
pub fn parent(normalized: &Path) -> Option<&Path> {
    if normalized.as_os_str().is_empty() {
        None
    } else {
        Some(normalized.parent().unwrap_or_else(|| Path::new("")))
    }
}

/// Last segment of an already-normalized path.
pub fn file_name(normalized: &Path) -> String {
    normalized
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Human-readable rendering: the root shows as `/`.
pub fn display(normalized: &Path) -> String {
    if normalized.as_os_str().is_empty() {
        "/".to_string()
    } else {
        normalized.display().to_string()
    }
}
