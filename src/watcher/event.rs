//! Event types consumed by the content watch session.

use std::path::{Path, PathBuf};

use crate::paths::to_content_relative;

/// Raw filesystem event from a watch source, absolute paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsEvent {
    Add(PathBuf),
    Change(PathBuf),
    Unlink(PathBuf),
    /// Initial enumeration is complete.
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Changed,
    Removed,
}

/// A content change translated to a content-root relative path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentChangeEvent {
    pub kind: ChangeKind,
    pub path_from_root: String,
}

impl ContentChangeEvent {
    /// Translate an absolute path event. `None` when outside `content_root`.
    pub fn from_absolute(kind: ChangeKind, content_root: &Path, path: &Path) -> Option<Self> {
        to_content_relative(content_root, path).map(|path_from_root| Self {
            kind,
            path_from_root,
        })
    }
}
