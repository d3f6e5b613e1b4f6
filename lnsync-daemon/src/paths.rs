use std::path::{Path, PathBuf};
use std::time::Duration;

use lnsync_core::config::lnsync_root;

pub const DAEMON_LOG: &str = "lnsync.log";
pub const DAEMON_PID: &str = "lnsync.pid";
pub const DAEMON_SOCKET: &str = "lnsync.sock";

/// How long a stopping session waits for its forwarding loop to drain.
pub const FORWARDER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

pub fn run_dir(home: &Path) -> PathBuf {
    lnsync_root(home).join("run")
}

pub fn logs_dir(home: &Path) -> PathBuf {
    lnsync_root(home).join("logs")
}

pub fn socket_path(home: &Path) -> PathBuf {
    run_dir(home).join(DAEMON_SOCKET)
}

pub fn default_pid_path(home: &Path) -> PathBuf {
    run_dir(home).join(DAEMON_PID)
}

pub fn default_log_path(home: &Path) -> PathBuf {
    logs_dir(home).join(DAEMON_LOG)
}
