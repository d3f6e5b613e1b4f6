//! Domain types shared by the watcher, the router and the link writer.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.

use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Position of a source directory in the configured source list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub usize);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source#{}", self.0)
    }
}

impl From<usize> for SourceId {
    fn from(n: usize) -> Self {
        Self(n)
    }
}

// ---------------------------------------------------------------------------
// Source directory
// ---------------------------------------------------------------------------

/// One watched source directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDir {
    pub id: SourceId,
    /// Absolute path of the directory.
    pub path: PathBuf,
}

impl SourceDir {
    pub fn new(id: impl Into<SourceId>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
        }
    }

    /// Build one `SourceDir` per path, numbered in list order.
    pub fn from_paths<P: AsRef<Path>>(paths: &[P]) -> Vec<Arc<SourceDir>> {
        paths
            .iter()
            .enumerate()
            .map(|(idx, path)| Arc::new(SourceDir::new(idx, path.as_ref())))
            .collect()
    }
}

impl fmt::Display for SourceDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.path.display().fmt(f)
    }
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// The two changes that affect the destination directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Creation,
    Deletion,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKind::Creation => write!(f, "create"),
            NotificationKind::Deletion => write!(f, "delete"),
        }
    }
}

/// A single observed change inside a source directory.
///
/// Produced by a watch session and consumed exactly once by the router.
#[derive(Debug, Clone)]
pub struct Notification {
    pub kind: NotificationKind,
    /// Absolute path of the affected source file.
    pub path: PathBuf,
    /// The directory whose watcher observed the change.
    pub source: Arc<SourceDir>,
}

impl Notification {
    pub fn creation(source: Arc<SourceDir>, path: impl Into<PathBuf>) -> Self {
        Self {
            kind: NotificationKind::Creation,
            path: path.into(),
            source,
        }
    }

    pub fn deletion(source: Arc<SourceDir>, path: impl Into<PathBuf>) -> Self {
        Self {
            kind: NotificationKind::Deletion,
            path: path.into(),
            source,
        }
    }

    /// Base name of the affected file; the destination link carries this name.
    pub fn file_name(&self) -> Option<&OsStr> {
        self.path.file_name()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
