//! Process host: logging, pid file, control socket and OS signals around the
//! watch core.

use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::sync::broadcast;

use lnsync_core::Settings;

use crate::engine::initialize;
use crate::error::{io_err, DaemonError};
use crate::paths::{default_log_path, default_pid_path, logs_dir, run_dir, socket_path};
use crate::protocol::{DaemonRequest, DaemonResponse, CMD_RELOAD, CMD_STATUS, CMD_STOP};
use crate::router::RouterStats;
use crate::shutdown::ShutdownHandle;

/// Start the daemon and block the current thread until it exits.
///
/// Logs go to the configured log file (default `~/.lnsync/logs/lnsync.log`)
/// unless `log_to_stderr` is set.
pub fn start_blocking(home: &Path, settings: Settings, log_to_stderr: bool) -> Result<(), DaemonError> {
    let log_file = if log_to_stderr {
        None
    } else {
        Some(
            settings
                .log_file
                .clone()
                .unwrap_or_else(|| default_log_path(home)),
        )
    };
    init_logging(log_file.as_deref())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf(), settings))
}

/// Run the daemon until a stop request or termination signal.
pub async fn run(home: PathBuf, settings: Settings) -> Result<(), DaemonError> {
    ensure_runtime_dirs(&home)?;

    let socket = socket_path(&home);
    prepare_socket_for_bind(&socket)?;

    let pid_path = settings
        .pid_file
        .clone()
        .unwrap_or_else(|| default_pid_path(&home));
    write_pid_file(&pid_path)?;

    let result = serve(&settings, &socket).await;

    remove_if_exists(&socket);
    remove_if_exists(&pid_path);
    result
}

struct StatusContext {
    pid: u32,
    started_at_unix: u64,
    sources: Vec<PathBuf>,
    destination: PathBuf,
    socket: PathBuf,
    stats: Arc<RouterStats>,
}

struct Signals {
    terminate: Signal,
    hangup: Signal,
}

async fn serve(settings: &Settings, socket: &Path) -> Result<(), DaemonError> {
    let signals = Signals {
        terminate: signal(SignalKind::terminate()).map_err(|e| io_err("SIGTERM handler", e))?,
        hangup: signal(SignalKind::hangup()).map_err(|e| io_err("SIGHUP handler", e))?,
    };

    let listener = UnixListener::bind(socket).map_err(|e| io_err(socket, e))?;
    set_socket_permissions(socket)?;

    let ready = initialize(&settings.sources, &settings.destination).await?;
    let shutdown = ready.shutdown_handle();
    let status = Arc::new(StatusContext {
        pid: std::process::id(),
        started_at_unix: unix_seconds_now(),
        sources: ready.sources().iter().map(|s| s.path.clone()).collect(),
        destination: ready.destination().to_path_buf(),
        socket: socket.to_path_buf(),
        stats: ready.stats(),
    });

    let (done_tx, _) = broadcast::channel::<()>(1);

    let socket_handle = {
        let shutdown = shutdown.clone();
        let done = done_tx.subscribe();
        tokio::spawn(async move {
            let result = socket_server_task(listener, status, shutdown.clone(), done).await;
            if result.is_err() {
                shutdown.request_shutdown();
            }
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown.clone();
        let done = done_tx.subscribe();
        tokio::spawn(async move {
            let result = signal_task(signals, shutdown.clone(), done).await;
            if result.is_err() {
                shutdown.request_shutdown();
            }
            result
        })
    };

    tracing::info!(pid = std::process::id(), "daemon started");
    let outcome = ready.wait().await;
    let _ = done_tx.send(());

    let (socket_result, signal_result) = tokio::join!(socket_handle, signal_handle);
    handle_join("socket_server", socket_result)?;
    handle_join("signal_handler", signal_result)?;

    let report = outcome?;
    tracing::info!(
        linked = report.stats.linked,
        unlinked = report.stats.unlinked,
        failed = report.stats.failed,
        pruned = report.stats.pruned,
        "daemon stopped",
    );
    Ok(())
}

async fn signal_task(
    mut signals: Signals,
    shutdown: ShutdownHandle,
    mut done: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = done.recv() => return Ok(()),
            interrupt = tokio::signal::ctrl_c() => {
                interrupt.map_err(|e| io_err("SIGINT handler", e))?;
                tracing::info!("received interrupt, shutting down");
                shutdown.request_shutdown();
            }
            _ = signals.terminate.recv() => {
                tracing::info!("received SIGTERM, shutting down");
                shutdown.request_shutdown();
            }
            _ = signals.hangup.recv() => {
                tracing::info!("received SIGHUP, shutting down");
                shutdown.request_shutdown();
            }
        }
    }
}

async fn socket_server_task(
    listener: UnixListener,
    status: Arc<StatusContext>,
    shutdown: ShutdownHandle,
    mut done: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = done.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&status.socket, e))?;
                let status = status.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_socket_client(stream, status, shutdown).await {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }
    Ok(())
}

async fn handle_socket_client(
    stream: UnixStream,
    status: Arc<StatusContext>,
    shutdown: ShutdownHandle,
) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request: DaemonRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                write_response(
                    &mut writer,
                    &DaemonResponse::error(format!("invalid request JSON: {err}")),
                )
                .await?;
                continue;
            }
        };

        let (response, stopping) = match request.cmd.as_str() {
            CMD_STATUS => (DaemonResponse::ok(build_status_payload(&status)), false),
            CMD_STOP | CMD_RELOAD => {
                tracing::info!(cmd = %request.cmd, "stop requested over control socket");
                shutdown.request_shutdown();
                (DaemonResponse::ok(json!({ "stopping": true })), true)
            }
            other => (
                DaemonResponse::error(format!("unknown command '{other}'")),
                false,
            ),
        };

        write_response(&mut writer, &response).await?;
        if stopping {
            break;
        }
    }

    Ok(())
}

fn build_status_payload(status: &StatusContext) -> Value {
    let stats = status.stats.snapshot();
    json!({
        "running": true,
        "pid": status.pid,
        "started_at_unix": status.started_at_unix,
        "sources": status
            .sources
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>(),
        "destination": status.destination.display().to_string(),
        "socket": status.socket.display().to_string(),
        "linked": stats.linked,
        "unlinked": stats.unlinked,
        "failed": stats.failed,
        "pruned": stats.pruned,
    })
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::AlreadyRunning {
                socket: socket.to_path_buf(),
            });
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

fn write_pid_file(path: &Path) -> Result<(), DaemonError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    fs::write(path, format!("{}\n", std::process::id())).map_err(|e| io_err(path, e))
}

fn remove_if_exists(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => tracing::warn!(path = %path.display(), error = %err, "cleanup failed"),
    }
}

fn ensure_runtime_dirs(home: &Path) -> Result<(), DaemonError> {
    for dir in [run_dir(home), logs_dir(home)] {
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        }
    }
    Ok(())
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    response: &DaemonResponse,
) -> Result<(), DaemonError> {
    let payload = serde_json::to_string(response)?;
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => {
            tracing::error!(task, error = %err, "host task failed");
            Err(DaemonError::Join(err))
        }
    }
}

fn unix_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Install the global tracing subscriber, writing to `log_file` or stderr.
pub fn init_logging(log_file: Option<&Path>) -> Result<(), DaemonError> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
            }
            let file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| io_err(path, e))?;
            let _ = fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        None => {
            let _ = fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
    Ok(())
}

fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}
