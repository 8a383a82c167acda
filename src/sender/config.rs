//! Configuration consumed by the sender.
//!
//! [`SenderConfig`] carries the tunables recognised at construction time.
//! `SenderBuilder` validates these values before passing them to
//! [`FluentSender`](super::FluentSender) for runtime use.

use std::time::Duration;

/// Default collector host.
pub const DEFAULT_HOST: &str = "localhost";
/// Default Fluentd forward port.
pub const DEFAULT_PORT: u16 = 24224;
/// Default maximum size (in bytes) of the pending buffer.
pub const DEFAULT_BUFMAX: usize = 1 << 20; // 1 MiB
/// Default connect/read/write timeout applied to the socket.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);
/// Default number of consecutive failures tolerated before escalating.
pub const DEFAULT_MAX_SEND_FAIL: u32 = 30;
/// Fixed window measured from the first failure of an episode; a failed
/// attempt beyond it surfaces to the caller.
pub const SEND_FAIL_WINDOW: Duration = Duration::from_secs(6);

/// Configuration object describing how to construct a [`FluentSender`](super::FluentSender).
#[derive(Clone, Debug)]
pub struct SenderConfig {
    /// Collector hostname, IP address, or `unix://` socket path.
    pub host: String,
    /// Collector TCP port; ignored for `unix://` hosts.
    pub port: u16,
    /// Maximum bytes retained across failed attempts.
    pub bufmax: usize,
    /// Timeout applied to connection setup and socket writes.
    pub timeout: Duration,
    /// Echo each record to the diagnostic log before encoding.
    pub verbose: bool,
    /// Consecutive-failure threshold; the attempt after it escalates.
    pub max_send_fail: u32,
}

/// Provide defaults that target a collector on the local machine.
impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
            bufmax: DEFAULT_BUFMAX,
            timeout: DEFAULT_TIMEOUT,
            verbose: false,
            max_send_fail: DEFAULT_MAX_SEND_FAIL,
        }
    }
}

impl SenderConfig {
    /// Override the collector host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Override the collector port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Override the pending buffer cap.
    pub fn with_bufmax(mut self, bufmax: usize) -> Self {
        self.bufmax = bufmax;
        self
    }

    /// Override the socket timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable or disable the diagnostic record echo.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Override the consecutive-failure threshold.
    pub fn with_max_send_fail(mut self, max_send_fail: u32) -> Self {
        self.max_send_fail = max_send_fail;
        self
    }
}
