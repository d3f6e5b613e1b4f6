//! Error types for lnsync-sync.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from link and reconcile operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The destination already holds an entry with the link's name.
    #[error("link already exists: {link}")]
    LinkExists { link: PathBuf },

    /// Nothing to remove under the link's name.
    #[error("no link to remove: {link}")]
    LinkMissing { link: PathBuf },

    /// The source path ends in `..` or is a root, so it has no base name.
    #[error("source path has no file name: {path}")]
    NoFileName { path: PathBuf },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
