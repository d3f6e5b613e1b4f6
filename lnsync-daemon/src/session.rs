//! Watch session: OS change notification for one source directory.
//!
//! ```text
//! Idle ──start──▶ Watching ──quit──▶ Draining ──ack + release──▶ Stopped
//! ```
//!
//! A session owns the notify watcher and a forwarding task that turns raw
//! notify events into [`Notification`]s on the router's shared channel. Only
//! create and remove events for direct children are forwarded; renames and
//! in-place modifications are dropped.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use lnsync_core::{Notification, NotificationKind, SourceDir};

use crate::error::DaemonError;
use crate::paths::FORWARDER_DRAIN_TIMEOUT;
use crate::router::SessionWiring;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Watching,
    Draining,
    Stopped,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Watching => write!(f, "watching"),
            SessionState::Draining => write!(f, "draining"),
            SessionState::Stopped => write!(f, "stopped"),
        }
    }
}

type RawEvents = mpsc::UnboundedReceiver<notify::Result<Event>>;

pub struct WatchSession {
    source: Arc<SourceDir>,
    state: SessionState,
    watcher: RecommendedWatcher,
    events: RawEvents,
    wiring: SessionWiring,
    registered: bool,
}

impl WatchSession {
    /// Create the notify backend for `source`.
    ///
    /// # Errors
    /// Fails when the platform watcher cannot be initialized; callers treat
    /// this as fatal.
    pub fn new(source: Arc<SourceDir>, wiring: SessionWiring) -> Result<Self, DaemonError> {
        let (event_tx, events) = mpsc::unbounded_channel::<notify::Result<Event>>();
        let watcher = recommended_watcher(move |event| {
            let _ = event_tx.send(event);
        })?;

        Ok(Self {
            source,
            state: SessionState::Idle,
            watcher,
            events,
            wiring,
            registered: false,
        })
    }

    /// Register the directory watch and spawn the session task.
    ///
    /// A failed registration is logged and the directory stays unmonitored;
    /// the session still runs so it can acknowledge `quit`.
    pub fn start(mut self, quit: oneshot::Receiver<()>) -> JoinHandle<SessionState> {
        match self
            .watcher
            .watch(&self.source.path, RecursiveMode::NonRecursive)
        {
            Ok(()) => {
                self.registered = true;
                tracing::info!(path = %self.source, "directory added for watch");
            }
            Err(err) => tracing::error!(
                path = %self.source,
                error = %err,
                "failed to watch directory, it will not be monitored",
            ),
        }
        self.transition(SessionState::Watching);
        tokio::spawn(self.run(quit))
    }

    async fn run(self, quit: oneshot::Receiver<()>) -> SessionState {
        let Self {
            source,
            mut state,
            mut watcher,
            events,
            wiring,
            registered,
        } = self;

        let mut forwarder = tokio::spawn(forward_events(
            source.clone(),
            events,
            wiring.notifications.clone(),
        ));

        // A dropped sender means the router is gone; stop the same way.
        let _ = quit.await;
        transition(&source, &mut state, SessionState::Draining);

        if registered {
            match watcher.unwatch(&source.path) {
                Ok(()) => tracing::info!(path = %source, "directory removed from watching"),
                Err(err) => tracing::warn!(
                    path = %source,
                    error = %err,
                    "failed to remove directory from watching",
                ),
            }
        }
        drop(watcher);

        match tokio::time::timeout(FORWARDER_DRAIN_TIMEOUT, &mut forwarder).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::warn!(path = %source, error = %err, "forwarder task failed"),
            Err(_) => {
                tracing::warn!(path = %source, "forwarder did not drain in time, aborting");
                forwarder.abort();
            }
        }

        if wiring.exits.send(source.id).await.is_err() {
            tracing::debug!(path = %source, "router gone before exit acknowledgment");
        }
        transition(&source, &mut state, SessionState::Stopped);
        state
    }

    fn transition(&mut self, next: SessionState) {
        transition(&self.source, &mut self.state, next);
    }
}

fn transition(source: &SourceDir, state: &mut SessionState, next: SessionState) {
    tracing::debug!(path = %source, from = %state, to = %next, "watch session state");
    *state = next;
}

/// Forward notify events for `source` until the stream closes or errors.
async fn forward_events(
    source: Arc<SourceDir>,
    mut events: RawEvents,
    notifications: mpsc::Sender<Notification>,
) {
    while let Some(event) = events.recv().await {
        let event = match event {
            Ok(event) => event,
            Err(err) => {
                tracing::error!(path = %source, error = %err, "file watcher exiting");
                return;
            }
        };
        for notification in notifications_for(&source, event) {
            if notifications.send(notification).await.is_err() {
                tracing::debug!(path = %source, "notification channel closed");
                return;
            }
        }
    }
    tracing::debug!(path = %source, "watch event stream closed");
}

/// Map one notify event to zero or more notifications for `source`.
pub(crate) fn notifications_for(source: &Arc<SourceDir>, event: Event) -> Vec<Notification> {
    let kind = match event.kind {
        EventKind::Create(_) => NotificationKind::Creation,
        EventKind::Remove(_) => NotificationKind::Deletion,
        _ => return Vec::new(),
    };

    event
        .paths
        .into_iter()
        .filter(|path| is_direct_child(&source.path, path))
        .map(|path| Notification {
            kind,
            path,
            source: source.clone(),
        })
        .collect()
}

fn is_direct_child(dir: &Path, path: &Path) -> bool {
    path.parent() == Some(dir) && path.file_name().is_some()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
