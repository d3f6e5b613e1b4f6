//! Watch core and process host for `lnsync`.
//!
//! [`initialize`] reconciles the destination and starts one watch session per
//! source directory; [`run`] wraps it with a pid file, a control socket and
//! signal handling.

mod engine;
mod error;
pub mod paths;
pub mod protocol;
mod router;
mod runtime;
mod session;
mod shutdown;

pub use engine::{initialize, Ready};
pub use error::DaemonError;
pub use protocol::{
    request_reload, request_status, request_stop, send_request, DaemonRequest, DaemonResponse,
};
pub use router::{RouterReport, RouterStats, StatsSnapshot};
pub use runtime::{init_logging, run, start_blocking};
pub use session::SessionState;
pub use shutdown::ShutdownHandle;
