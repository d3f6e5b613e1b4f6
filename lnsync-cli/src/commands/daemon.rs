//! `lnsync start|stop|reload|status|logs`: daemon lifecycle over the control socket.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use lnsync_daemon::paths::{default_log_path, socket_path};
use lnsync_daemon::{request_reload, request_status, request_stop, start_blocking, DaemonError};

use super::{load_config, ConfigArgs};

#[derive(Args, Debug)]
pub struct StartArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Pid file path.
    #[arg(long = "pid")]
    pub pid: Option<PathBuf>,

    /// Log file path.
    #[arg(long = "log")]
    pub log: Option<PathBuf>,

    /// Log to stderr instead of the log file.
    #[arg(long)]
    pub stderr: bool,
}

#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Number of trailing lines to show.
    #[arg(long, default_value_t = 100)]
    pub lines: usize,

    /// Log file to read instead of the configured one.
    #[arg(long = "log")]
    pub log: Option<PathBuf>,

    /// Config file the daemon was started with.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub fn start(args: StartArgs, home: &Path) -> Result<()> {
    let settings = args.config.settings(home, args.pid, args.log)?;
    start_blocking(home, settings, args.stderr).context("daemon exited with error")
}

pub fn stop(home: &Path) -> Result<()> {
    match request_stop(home) {
        Ok(()) => println!("daemon stop requested"),
        Err(DaemonError::DaemonNotRunning { .. }) => println!("daemon is not running"),
        Err(err) => return Err(err).context("failed to stop daemon"),
    }
    Ok(())
}

pub fn reload(home: &Path) -> Result<()> {
    match request_reload(home) {
        Ok(()) => println!("daemon reload requested (the daemon stops; start it again)"),
        Err(DaemonError::DaemonNotRunning { .. }) => println!("daemon is not running"),
        Err(err) => return Err(err).context("failed to reload daemon"),
    }
    Ok(())
}

pub fn status(home: &Path) -> Result<()> {
    let payload = match request_status(home) {
        Ok(status) => status,
        Err(DaemonError::DaemonNotRunning { .. }) => serde_json::json!({
            "running": false,
            "socket": socket_path(home).display().to_string(),
        }),
        Err(err) => return Err(err).context("failed to query daemon status"),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to render daemon status JSON")?
    );
    Ok(())
}

pub fn logs(args: LogsArgs, home: &Path) -> Result<()> {
    let path = match args.log {
        Some(path) => path,
        None => load_config(home, args.config.as_deref())?
            .log_file
            .unwrap_or_else(|| default_log_path(home)),
    };
    print_tail(&path, args.lines).context("failed to read daemon log")
}

fn print_tail(path: &Path, lines: usize) -> Result<()> {
    if !path.exists() {
        println!("log file not found: {}", path.display());
        return Ok(());
    }

    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut tail = VecDeque::<String>::with_capacity(lines);
    for line in reader.lines() {
        let line = line.with_context(|| format!("read {}", path.display()))?;
        if lines == 0 {
            continue;
        }
        if tail.len() == lines {
            tail.pop_front();
        }
        tail.push_back(line);
    }

    println!("==> {} <==", path.display());
    for line in tail {
        println!("{line}");
    }
    Ok(())
}
