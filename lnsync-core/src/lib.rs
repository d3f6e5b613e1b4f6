//! lnsync core library: domain types, configuration and errors.
//!
//! - [`types`]: source directories and filesystem notifications
//! - [`config`]: YAML config file + CLI override merging
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, Settings};
pub use error::ConfigError;
pub use types::{Notification, NotificationKind, SourceDir, SourceId};
