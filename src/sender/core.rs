//! The sender and its buffering/escalation state machine.

use std::{
    io,
    time::{Instant, SystemTime, UNIX_EPOCH},
};

use log::{debug, warn};
use parking_lot::Mutex;
use serde::Serialize;

use crate::{error::EmitError, retry_warner::RetryWarner};

use super::{
    config::{SEND_FAIL_WINDOW, SenderConfig},
    serialise,
    transport::{Endpoint, Transport},
};

/// Success-side outcome of an emit call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmitStatus {
    /// The record, and any previously buffered bytes, reached the socket.
    Sent,
    /// The attempt failed; the bytes were retained for the next call.
    Absorbed,
}

/// Unbroken run of consecutive send failures since the last success.
///
/// `first_at` is set on the first failure of the run only and is never
/// updated by later failures within the same run. Both fields reset
/// together on success and on escalation.
#[derive(Debug, Default)]
struct FailureEpisode {
    count: u32,
    first_at: Option<Instant>,
}

impl FailureEpisode {
    fn reset(&mut self) {
        self.count = 0;
        self.first_at = None;
    }

    /// Elapsed time since the episode began, when it exceeds the window.
    fn expired_window(&self, now: Instant) -> Option<std::time::Duration> {
        self.first_at.and_then(|first| {
            let elapsed = now.duration_since(first);
            (elapsed > SEND_FAIL_WINDOW).then_some(elapsed)
        })
    }
}

/// State guarded by the sender's lock.
///
/// The connection handle and the pending buffer are guarded together: a
/// send attempt must never observe one without the matching state of the
/// other.
struct Shared {
    transport: Transport,
    pending: Vec<u8>,
    failures: FailureEpisode,
}

/// Client that forwards `[tag, time, record]` messages to a Fluentd
/// compatible collector.
///
/// All sends are serialised by a single internal lock, including the
/// connect attempt. There are no background threads or timers; the pending
/// buffer is only drained by a subsequent call from application code.
pub struct FluentSender {
    tag: String,
    bufmax: usize,
    max_send_fail: u32,
    verbose: bool,
    warner: RetryWarner,
    shared: Mutex<Shared>,
}

impl FluentSender {
    /// Construct a sender targeting the default local collector.
    pub fn new(tag: impl Into<String>) -> Self {
        Self::with_config(tag, SenderConfig::default())
    }

    /// Construct the sender from a configuration object.
    ///
    /// The connection is established lazily on the first emit.
    pub fn with_config(tag: impl Into<String>, config: SenderConfig) -> Self {
        let endpoint = Endpoint::from_host_port(&config.host, config.port);
        Self {
            tag: tag.into(),
            bufmax: config.bufmax,
            max_send_fail: config.max_send_fail,
            verbose: config.verbose,
            warner: RetryWarner::new(),
            shared: Mutex::new(Shared {
                transport: Transport::new(endpoint, config.timeout),
                pending: Vec::new(),
                failures: FailureEpisode::default(),
            }),
        }
    }

    /// Base tag attached to every record.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Forward a record stamped with the current time.
    ///
    /// Returns `Ok(EmitStatus::Absorbed)` when the attempt failed but the
    /// bytes were retained for the next call; see [`EmitError`] for the
    /// escalated outcomes.
    pub fn emit<T>(&self, label: Option<&str>, payload: &T) -> Result<EmitStatus, EmitError>
    where
        T: Serialize + ?Sized,
    {
        self.emit_with_time(label, unix_now(), payload)
    }

    /// Forward a record with an explicit timestamp (epoch seconds).
    pub fn emit_with_time<T>(
        &self,
        label: Option<&str>,
        timestamp: u64,
        payload: &T,
    ) -> Result<EmitStatus, EmitError>
    where
        T: Serialize + ?Sized,
    {
        if self.verbose {
            debug!(
                "emit tag={} label={} time={timestamp}",
                self.tag,
                label.unwrap_or("-"),
            );
        }
        let bytes = serialise::encode(&self.tag, label, timestamp, payload)?;
        self.submit_at(bytes, Instant::now())
    }

    /// Retry the pending buffer without appending a new record.
    ///
    /// A no-op returning `Ok(EmitStatus::Sent)` when nothing is pending.
    pub fn flush_pending(&self) -> Result<EmitStatus, EmitError> {
        self.submit_at(Vec::new(), Instant::now())
    }

    /// Number of bytes currently retained for retry.
    pub fn pending_len(&self) -> usize {
        self.shared.lock().pending.len()
    }

    /// Consecutive failures in the current episode.
    pub fn fail_count(&self) -> u32 {
        self.shared.lock().failures.count
    }

    /// Whether a live connection is currently held.
    pub fn is_connected(&self) -> bool {
        self.shared.lock().transport.is_connected()
    }

    /// Drop the live connection, if any. Buffered bytes stay pending and
    /// are retried on the next emit.
    pub fn close(&self) {
        self.shared.lock().transport.close();
    }

    #[cfg(test)]
    pub(crate) fn pending_bytes(&self) -> Vec<u8> {
        self.shared.lock().pending.clone()
    }

    pub(crate) fn submit_at(&self, bytes: Vec<u8>, now: Instant) -> Result<EmitStatus, EmitError> {
        let mut shared = self.shared.lock();

        let effective = if shared.pending.is_empty() {
            bytes
        } else {
            let mut merged = std::mem::take(&mut shared.pending);
            merged.extend_from_slice(&bytes);
            merged
        };
        if effective.is_empty() {
            return Ok(EmitStatus::Sent);
        }

        match Self::try_send(&mut shared.transport, &effective) {
            Ok(()) => {
                shared.failures.reset();
                self.warner
                    .drain(|count| debug!("recovered after {count} absorbed send failures"));
                Ok(EmitStatus::Sent)
            }
            Err(err) => self.on_failure(&mut shared, effective, err, now),
        }
    }

    fn try_send(transport: &mut Transport, bytes: &[u8]) -> io::Result<()> {
        transport.ensure_connected()?;
        transport.write_all(bytes)
    }

    /// Apply the retry/escalation policy after a failed attempt.
    ///
    /// Threshold checks run in fixed order: count, then window, then size.
    /// Every escalation resets the failure episode before returning, so the
    /// next call starts a fresh one.
    fn on_failure(
        &self,
        shared: &mut Shared,
        effective: Vec<u8>,
        err: io::Error,
        now: Instant,
    ) -> Result<EmitStatus, EmitError> {
        shared.transport.close();
        shared.failures.count += 1;

        if shared.failures.count > self.max_send_fail {
            let attempts = shared.failures.count;
            shared.failures.reset();
            shared.pending = effective;
            warn!("send failed {attempts} consecutive times; surfacing to caller");
            return Err(EmitError::TooManyFailures {
                attempts,
                source: err,
            });
        }

        if let Some(elapsed) = shared.failures.expired_window(now) {
            shared.failures.reset();
            shared.pending = effective;
            warn!("send failures persisted for {elapsed:?}; surfacing to caller");
            return Err(EmitError::FailureWindowExpired {
                elapsed,
                source: err,
            });
        }

        if effective.len() > self.bufmax {
            let buffered = effective.len();
            shared.failures.reset();
            shared.pending = Vec::new();
            warn!(
                "pending buffer of {buffered} bytes exceeds bufmax of {}; dropping buffered records",
                self.bufmax,
            );
            return Err(EmitError::BufferOverflow {
                buffered,
                bufmax: self.bufmax,
                source: err,
            });
        }

        let retained = effective.len();
        shared.pending = effective;
        if shared.failures.first_at.is_none() {
            shared.failures.first_at = Some(now);
        }
        self.warner.note_failure();
        self.warner.warn_if_due(|count| {
            warn!("absorbed {count} send failures; retaining {retained} pending bytes");
        });
        Ok(EmitStatus::Absorbed)
    }
}

impl std::fmt::Debug for FluentSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FluentSender")
            .field("tag", &self.tag)
            .field("bufmax", &self.bufmax)
            .field("max_send_fail", &self.max_send_fail)
            .finish()
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|dur| dur.as_secs())
        .unwrap_or_default()
}
