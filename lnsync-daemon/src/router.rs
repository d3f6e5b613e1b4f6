//! Event router: the single control loop of the watch core.
//!
//! Inputs, all owned here:
//! - notifications from every watch session (shared channel)
//! - the global quit request from [`crate::ShutdownHandle`]
//! - per-session exit acknowledgments
//!
//! Every notification is handed to a blocking task running
//! [`lnsync_sync::apply`]; dispatch order is receive order, completion order is
//! not. Failed actions are logged by the link writer and never retried. The
//! loop ends when the last session has acknowledged exit, after which the
//! router waits for the link actions it already started.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};

use lnsync_core::{Notification, SourceDir, SourceId};
use lnsync_sync::LinkAction;

use crate::session::SessionState;

/// Sender halves handed to each watch session at construction.
#[derive(Debug, Clone)]
pub struct SessionWiring {
    pub notifications: mpsc::Sender<Notification>,
    pub exits: mpsc::Sender<SourceId>,
}

/// Lock-free outcome counters, readable while the router runs.
#[derive(Debug, Default)]
pub struct RouterStats {
    linked: AtomicU64,
    unlinked: AtomicU64,
    failed: AtomicU64,
    pruned: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub linked: u64,
    pub unlinked: u64,
    pub failed: u64,
    pub pruned: u64,
}

impl RouterStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            linked: self.linked.load(Ordering::Relaxed),
            unlinked: self.unlinked.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            pruned: self.pruned.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_pruned(&self, count: usize) {
        self.pruned.fetch_add(count as u64, Ordering::Relaxed);
    }

    fn record(&self, outcome: &Result<LinkAction, lnsync_sync::SyncError>) {
        let counter = match outcome {
            Ok(LinkAction::Linked { .. }) => &self.linked,
            Ok(LinkAction::Unlinked { .. }) => &self.unlinked,
            Err(_) => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

struct SessionEntry {
    source: Arc<SourceDir>,
    quit: Option<oneshot::Sender<()>>,
    task: JoinHandle<SessionState>,
}

/// Final state of every session once the router has finished.
#[derive(Debug, Clone)]
pub struct RouterReport {
    /// Sessions whose task returned, with the state they ended in.
    pub sessions: Vec<(Arc<SourceDir>, SessionState)>,
    /// Sessions whose task panicked or was cancelled.
    pub crashed: Vec<Arc<SourceDir>>,
    pub stats: StatsSnapshot,
}

impl RouterReport {
    pub fn all_stopped(&self) -> bool {
        self.crashed.is_empty()
            && self
                .sessions
                .iter()
                .all(|(_, state)| *state == SessionState::Stopped)
    }
}

pub struct EventRouter {
    destination: Arc<PathBuf>,
    sessions: Vec<SessionEntry>,
    wiring: SessionWiring,
    notifications: mpsc::Receiver<Notification>,
    exits: mpsc::Receiver<SourceId>,
    quit: mpsc::Receiver<()>,
    in_flight: JoinSet<()>,
    stats: Arc<RouterStats>,
}

impl EventRouter {
    pub fn new(destination: PathBuf, quit: mpsc::Receiver<()>, stats: Arc<RouterStats>) -> Self {
        let (notify_tx, notifications) = mpsc::channel(1);
        let (exit_tx, exits) = mpsc::channel(1);
        Self {
            destination: Arc::new(destination),
            sessions: Vec::new(),
            wiring: SessionWiring {
                notifications: notify_tx,
                exits: exit_tx,
            },
            notifications,
            exits,
            quit,
            in_flight: JoinSet::new(),
            stats,
        }
    }

    /// Channel ends for a new watch session.
    pub fn wiring(&self) -> SessionWiring {
        self.wiring.clone()
    }

    /// Track a started session; it counts as outstanding until it acknowledges exit.
    pub fn register(
        &mut self,
        source: Arc<SourceDir>,
        quit: oneshot::Sender<()>,
        task: JoinHandle<SessionState>,
    ) {
        self.sessions.push(SessionEntry {
            source,
            quit: Some(quit),
            task,
        });
    }

    pub async fn run(self) -> RouterReport {
        let Self {
            destination,
            mut sessions,
            wiring,
            mut notifications,
            mut exits,
            mut quit,
            mut in_flight,
            stats,
        } = self;
        drop(wiring);

        let mut outstanding = sessions.len();
        let mut quit_open = true;
        tracing::info!(sessions = outstanding, "event router started");

        while outstanding > 0 {
            tokio::select! {
                // A session acknowledges exit only after its last notification
                // is queued, so notifications must win over exits.
                biased;
                Some(notification) = notifications.recv() => {
                    dispatch(&mut in_flight, &destination, &stats, notification);
                }
                request = quit.recv(), if quit_open => match request {
                    Some(()) => broadcast_quit(&mut sessions),
                    None => quit_open = false,
                },
                Some(id) = exits.recv() => {
                    outstanding -= 1;
                    tracing::info!(source = %id, remaining = outstanding, "watch session exited");
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(err) = joined {
                        tracing::error!(error = %err, "link action task failed");
                    }
                }
                else => {
                    tracing::warn!(remaining = outstanding, "all router inputs closed");
                    break;
                }
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            if let Err(err) = joined {
                tracing::error!(error = %err, "link action task failed");
            }
        }

        let mut states = Vec::with_capacity(sessions.len());
        let mut crashed = Vec::new();
        for entry in sessions {
            match entry.task.await {
                Ok(state) => states.push((entry.source, state)),
                Err(err) => {
                    tracing::error!(
                        path = %entry.source,
                        panicked = err.is_panic(),
                        error = %err,
                        "watch session task crashed",
                    );
                    crashed.push(entry.source);
                }
            }
        }

        tracing::info!("event router stopped");
        RouterReport {
            sessions: states,
            crashed,
            stats: stats.snapshot(),
        }
    }
}

fn dispatch(
    in_flight: &mut JoinSet<()>,
    destination: &Arc<PathBuf>,
    stats: &Arc<RouterStats>,
    notification: Notification,
) {
    let destination = destination.clone();
    let stats = stats.clone();
    in_flight.spawn_blocking(move || {
        let outcome = lnsync_sync::apply(&destination, &notification);
        stats.record(&outcome);
    });
}

fn broadcast_quit(sessions: &mut [SessionEntry]) {
    let mut sent = 0usize;
    for entry in sessions.iter_mut() {
        if let Some(quit) = entry.quit.take() {
            if quit.send(()).is_err() {
                tracing::debug!(path = %entry.source, "watch session already gone");
            }
            sent += 1;
        }
    }
    if sent > 0 {
        tracing::info!(sessions = sent, "quit forwarded to watch sessions");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
