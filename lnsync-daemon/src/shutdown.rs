//! Shutdown coordinator.
//!
//! [`ShutdownHandle::request_shutdown`] puts one quit request on the router's
//! control channel; the router forwards it to every watch session. Completion
//! is observed through [`crate::Ready::wait`], which resolves only after each
//! session has acknowledged exit.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::router::RouterReport;
use crate::session::SessionState;

/// Cloneable trigger for graceful termination.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    quit: mpsc::Sender<()>,
}

impl ShutdownHandle {
    pub(crate) fn new(quit: mpsc::Sender<()>) -> Self {
        Self { quit }
    }

    /// Ask the watch core to stop. Never blocks; repeated calls are harmless.
    pub fn request_shutdown(&self) {
        match self.quit.try_send(()) {
            Ok(()) => tracing::info!("shutdown requested"),
            Err(TrySendError::Full(())) => tracing::debug!("shutdown already pending"),
            Err(TrySendError::Closed(())) => tracing::debug!("watch core already stopped"),
        }
    }
}

/// Log every session that crashed or did not reach `Stopped`.
pub(crate) fn log_incomplete(report: &RouterReport) {
    for source in &report.crashed {
        tracing::error!(path = %source, "watch session crashed before stopping");
    }
    for (source, state) in &report.sessions {
        if *state != SessionState::Stopped {
            tracing::warn!(path = %source, state = %state, "watch session did not stop cleanly");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn requests_after_the_first_are_dropped() {
        let (tx, mut rx) = mpsc::channel(1);
        let handle = ShutdownHandle::new(tx);

        handle.request_shutdown();
        handle.clone().request_shutdown();

        assert_eq!(rx.recv().await, Some(()));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn request_after_core_stopped_is_a_no_op() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        ShutdownHandle::new(tx).request_shutdown();
    }
}
