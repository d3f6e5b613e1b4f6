//! # lnsync-sync
//!
//! Blocking filesystem work against the destination directory.
//!
//! [`link::apply`] turns one notification into one symlink create/remove;
//! [`reconcile::reconcile`] prunes broken links once at startup.

pub mod error;
pub mod link;
pub mod reconcile;

pub use error::SyncError;
pub use link::{apply, LinkAction};
pub use reconcile::{reconcile, ReconcileReport};
