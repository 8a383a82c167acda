//! Error taxonomy for the forwarding pipeline.
//!
//! Encoding failures are programmer errors and propagate immediately.
//! Transport failures are absorbed into the pending buffer until one of the
//! escalation thresholds is crossed, at which point they surface as a
//! variant of [`EmitError`] carrying the underlying I/O error.

use std::{io, time::Duration};

use thiserror::Error;

/// Failure to pack a record into its MessagePack wire form.
///
/// Raised when the payload contains a value the encoding cannot represent.
/// Never retried: the same payload would fail again on every attempt.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct EncodeError(#[from] rmp_serde::encode::Error);

/// Errors that may occur while building a sender.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Invalid user supplied configuration.
    #[error("invalid sender configuration: {0}")]
    InvalidConfig(String),
}

/// Terminal failure of a single emit call.
///
/// Transient transport errors do not produce an `EmitError`; they are
/// reported as [`EmitStatus::Absorbed`](crate::EmitStatus). An `EmitError`
/// means either the record could not be encoded at all, or the failure
/// episode crossed one of the count/time/size thresholds.
#[derive(Debug, Error)]
pub enum EmitError {
    /// The payload could not be represented in the wire encoding.
    #[error(transparent)]
    Encode(#[from] EncodeError),
    /// More than `max_send_fail` consecutive attempts have failed.
    ///
    /// The failure episode is reset before this is returned; the pending
    /// buffer is retained for the next call.
    #[error("{attempts} consecutive send attempts failed: {source}")]
    TooManyFailures {
        attempts: u32,
        #[source]
        source: io::Error,
    },
    /// Failures have persisted beyond the fixed failure window.
    ///
    /// The window anchor is cleared before this is returned; the pending
    /// buffer is retained for the next call.
    #[error("send failures persisted for {elapsed:?}: {source}")]
    FailureWindowExpired {
        elapsed: Duration,
        #[source]
        source: io::Error,
    },
    /// The pending buffer would exceed `bufmax`; it has been dropped.
    #[error("pending buffer of {buffered} bytes exceeds bufmax of {bufmax}: {source}")]
    BufferOverflow {
        buffered: usize,
        bufmax: usize,
        #[source]
        source: io::Error,
    },
}
