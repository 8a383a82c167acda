//! Client library for forwarding structured event records to a Fluentd
//! compatible collector over a stream socket.
//!
//! Records are packed into MessagePack `[tag, time, record]` messages and
//! written over a single lazily established TCP or Unix domain socket
//! connection. Transient network failures are absorbed into a bounded
//! pending buffer and retried on the next emit; once a consecutive-failure
//! count, a failure window, or the buffer cap is exceeded, the failure
//! surfaces to the caller as an [`EmitError`].
//!
//! ```no_run
//! use fluent_client::{FluentSender, SenderConfig};
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct Access<'a> {
//!     method: &'a str,
//!     path: &'a str,
//! }
//!
//! let sender = FluentSender::with_config("app", SenderConfig::default());
//! sender.emit(Some("access"), &Access { method: "GET", path: "/" })?;
//! # Ok::<(), fluent_client::EmitError>(())
//! ```

mod error;
mod global;
pub mod retry_warner;
mod sender;

pub use error::{BuildError, EmitError, EncodeError};
pub use global::{get_global_sender, setup, teardown};
pub use sender::{
    DEFAULT_BUFMAX, DEFAULT_HOST, DEFAULT_MAX_SEND_FAIL, DEFAULT_PORT, DEFAULT_TIMEOUT, EmitStatus,
    Endpoint, FluentSender, SEND_FAIL_WINDOW, SenderBuilder, SenderConfig, UNIX_PREFIX,
};
