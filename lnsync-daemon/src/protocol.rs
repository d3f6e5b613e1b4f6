use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{io_err, DaemonError};
use crate::paths::socket_path;

pub const CMD_STATUS: &str = "status";
pub const CMD_STOP: &str = "stop";
pub const CMD_RELOAD: &str = "reload";

/// JSON newline-delimited request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonRequest {
    pub cmd: String,
}

impl DaemonRequest {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }
}

/// JSON newline-delimited response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DaemonResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Attempts a status query makes while the daemon socket comes up.
const STATUS_ATTEMPTS: u32 = 5;
const STATUS_BACKOFF: Duration = Duration::from_millis(100);

impl DaemonResponse {
    /// `data` of a successful reply, or the daemon's error as `Protocol`.
    pub fn into_data(self) -> Result<Value, DaemonError> {
        match (self.ok, self.data, self.error) {
            (true, data, _) => Ok(data.unwrap_or(Value::Null)),
            (false, _, error) => Err(DaemonError::Protocol(
                error.unwrap_or_else(|| "daemon reported failure without a message".to_string()),
            )),
        }
    }
}

/// Send one request line to the daemon under `home` and read one reply line.
pub fn send_request(home: &Path, request: &DaemonRequest) -> Result<DaemonResponse, DaemonError> {
    let socket = socket_path(home);
    let mut stream = connect(&socket)?;

    let mut line = serde_json::to_string(request)?;
    line.push('\n');
    stream
        .write_all(line.as_bytes())
        .and_then(|()| stream.flush())
        .map_err(|e| io_err(&socket, e))?;

    let mut reply = String::new();
    let read = BufReader::new(stream)
        .read_line(&mut reply)
        .map_err(|e| io_err(&socket, e))?;
    if read == 0 {
        return Err(DaemonError::Protocol(format!(
            "daemon hung up on '{}' without replying",
            request.cmd
        )));
    }
    Ok(serde_json::from_str(reply.trim_end())?)
}

fn connect(socket: &Path) -> Result<UnixStream, DaemonError> {
    UnixStream::connect(socket).map_err(|err| match err.kind() {
        ErrorKind::NotFound | ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset => {
            DaemonError::DaemonNotRunning {
                socket: socket.to_path_buf(),
            }
        }
        _ => io_err(socket, err),
    })
}

fn call(home: &Path, cmd: &str) -> Result<Value, DaemonError> {
    send_request(home, &DaemonRequest::new(cmd))?.into_data()
}

/// Status payload of the running daemon.
///
/// A freshly started daemon may not have bound its socket yet, so a missing
/// daemon is retried a few times before being reported.
pub fn request_status(home: &Path) -> Result<Value, DaemonError> {
    let mut attempt = 1;
    loop {
        match call(home, CMD_STATUS) {
            Err(DaemonError::DaemonNotRunning { .. }) if attempt < STATUS_ATTEMPTS => {
                attempt += 1;
                sleep(STATUS_BACKOFF);
            }
            other => return other,
        }
    }
}

pub fn request_stop(home: &Path) -> Result<(), DaemonError> {
    call(home, CMD_STOP).map(drop)
}

/// Reload has no separate meaning for the watch core: it stops the daemon.
pub fn request_reload(home: &Path) -> Result<(), DaemonError> {
    call(home, CMD_RELOAD).map(drop)
}
