//! Link synchronizer: one notification in, one symlink action out.
//!
//! The link for a source file `f` is `<destination>/<basename(f)>` and points
//! at `f` itself. Nothing is overwritten and nothing is retried: an existing
//! entry on create, or a missing one on delete, is reported as an error and
//! the notification is dropped by the caller.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use lnsync_core::{Notification, NotificationKind};

use crate::error::{io_err, SyncError};

// ---------------------------------------------------------------------------
// Link action
// ---------------------------------------------------------------------------

/// Outcome of a successful link operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkAction {
    /// A symlink `link -> target` was created.
    Linked { link: PathBuf, target: PathBuf },
    /// The entry at `link` was removed.
    Unlinked { link: PathBuf },
}

// ---------------------------------------------------------------------------
// apply
// ---------------------------------------------------------------------------

/// Apply one notification to `destination` and log the outcome.
pub fn apply(destination: &Path, notification: &Notification) -> Result<LinkAction, SyncError> {
    let result = link_path(destination, notification).and_then(|link| match notification.kind {
        NotificationKind::Creation => create_link(link, &notification.path),
        NotificationKind::Deletion => remove_link(link),
    });

    match &result {
        Ok(LinkAction::Linked { link, target }) => tracing::info!(
            link = %link.display(),
            target = %target.display(),
            source = %notification.source,
            "link created",
        ),
        Ok(LinkAction::Unlinked { link }) => tracing::info!(
            link = %link.display(),
            source = %notification.source,
            "link removed",
        ),
        Err(err) => tracing::warn!(
            action = %notification.kind,
            path = %notification.path.display(),
            error = %err,
            "link action failed, notification dropped",
        ),
    }

    result
}

/// `<destination>/<basename(notification.path)>`. Pure, no I/O.
pub fn link_path(destination: &Path, notification: &Notification) -> Result<PathBuf, SyncError> {
    notification
        .file_name()
        .map(|name| destination.join(name))
        .ok_or_else(|| SyncError::NoFileName {
            path: notification.path.clone(),
        })
}

/// Create the symlink `link -> target`.
pub fn create_link(link: PathBuf, target: &Path) -> Result<LinkAction, SyncError> {
    match symlink(target, &link) {
        Ok(()) => Ok(LinkAction::Linked {
            link,
            target: target.to_path_buf(),
        }),
        Err(err) if err.kind() == ErrorKind::AlreadyExists => Err(SyncError::LinkExists { link }),
        Err(err) => Err(io_err(link, err)),
    }
}

/// Remove whatever entry sits at `link`.
pub fn remove_link(link: PathBuf) -> Result<LinkAction, SyncError> {
    match std::fs::remove_file(&link) {
        Ok(()) => Ok(LinkAction::Unlinked { link }),
        Err(err) if err.kind() == ErrorKind::NotFound => Err(SyncError::LinkMissing { link }),
        Err(err) => Err(io_err(link, err)),
    }
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
