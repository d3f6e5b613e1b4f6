//! Watch core entry point: reconcile, start sessions, start the router.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use lnsync_core::SourceDir;
use lnsync_sync::ReconcileReport;

use crate::error::{io_err, DaemonError};
use crate::router::{EventRouter, RouterReport, RouterStats};
use crate::session::WatchSession;
use crate::shutdown::{log_incomplete, ShutdownHandle};

/// A running watch core.
pub struct Ready {
    shutdown: ShutdownHandle,
    router: JoinHandle<RouterReport>,
    stats: Arc<RouterStats>,
    sources: Vec<Arc<SourceDir>>,
    destination: PathBuf,
    reconcile: ReconcileReport,
}

impl Ready {
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn request_shutdown(&self) {
        self.shutdown.request_shutdown();
    }

    pub fn stats(&self) -> Arc<RouterStats> {
        self.stats.clone()
    }

    /// Canonical source directories, in configured order.
    pub fn sources(&self) -> &[Arc<SourceDir>] {
        &self.sources
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn reconcile_report(&self) -> &ReconcileReport {
        &self.reconcile
    }

    /// Resolve once every watch session has stopped and in-flight link
    /// actions have finished.
    pub async fn wait(self) -> Result<RouterReport, DaemonError> {
        let report = self.router.await?;
        log_incomplete(&report);
        Ok(report)
    }
}

/// Reconcile `destination`, then watch every source until shutdown is requested.
///
/// # Errors
/// Unreadable source or destination directories and watcher backend failures
/// are fatal; nothing is left running when this returns an error.
pub async fn initialize<P: AsRef<Path>>(
    sources: &[P],
    destination: &Path,
) -> Result<Ready, DaemonError> {
    let source_paths: Vec<PathBuf> = sources.iter().map(|p| p.as_ref().to_path_buf()).collect();
    let dest = destination.to_path_buf();

    tracing::info!("starting pre-clean of destination");
    let (reconcile, canonical) =
        tokio::task::spawn_blocking(move || prepare(&source_paths, &dest)).await??;

    let stats = Arc::new(RouterStats::default());
    stats.record_pruned(reconcile.pruned.len());

    let sources = SourceDir::from_paths(&canonical);
    let (quit_tx, quit_rx) = mpsc::channel(1);
    let mut router = EventRouter::new(destination.to_path_buf(), quit_rx, stats.clone());
    for source in &sources {
        let session = WatchSession::new(source.clone(), router.wiring())?;
        let (session_quit_tx, session_quit_rx) = oneshot::channel();
        router.register(source.clone(), session_quit_tx, session.start(session_quit_rx));
    }

    let router = tokio::spawn(router.run());

    Ok(Ready {
        shutdown: ShutdownHandle::new(quit_tx),
        router,
        stats,
        sources,
        destination: destination.to_path_buf(),
        reconcile,
    })
}

/// Blocking half of startup: prune the destination and resolve source paths.
fn prepare(
    sources: &[PathBuf],
    destination: &Path,
) -> Result<(ReconcileReport, Vec<PathBuf>), DaemonError> {
    let report = lnsync_sync::reconcile(sources, destination)?;

    let mut canonical: Vec<PathBuf> = Vec::with_capacity(sources.len());
    for source in sources {
        let path = fs::canonicalize(source).map_err(|e| io_err(source, e))?;
        if canonical.contains(&path) {
            tracing::warn!(path = %path.display(), "source listed twice, watching once");
            continue;
        }
        canonical.push(path);
    }
    Ok((report, canonical))
}
