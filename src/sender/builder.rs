//! Builder for [`FluentSender`](super::FluentSender).
//!
//! Exposes the construction-time tunables with validation, so callers get
//! a configuration error at build time rather than a misbehaving sender at
//! emit time.

use std::time::Duration;

use crate::error::BuildError;

use super::{FluentSender, SenderConfig};

macro_rules! ensure_positive {
    ($value:expr, $field:expr) => {{
        if $value == 0 {
            return Err(BuildError::InvalidConfig(format!(
                "{} must be greater than zero",
                $field
            )));
        }
    }};
}

macro_rules! option_setter {
    ($(#[$meta:meta])* $fn_name:ident, $field:ident, $ty:ty) => {
        $(#[$meta])*
        pub fn $fn_name(mut self, value: $ty) -> Self {
            self.$field = Some(value);
            self
        }
    };
}

/// Builder for constructing [`FluentSender`] instances.
#[derive(Clone, Debug)]
pub struct SenderBuilder {
    tag: String,
    host: Option<String>,
    port: Option<u16>,
    bufmax: Option<usize>,
    timeout: Option<Duration>,
    verbose: bool,
    max_send_fail: Option<u32>,
}

impl SenderBuilder {
    /// Create a builder for a sender with the given base tag.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            host: None,
            port: None,
            bufmax: None,
            timeout: None,
            verbose: false,
            max_send_fail: None,
        }
    }

    /// Target a collector host, or a `unix://` socket path.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    option_setter!(
        #[doc = "Target a collector TCP port."]
        with_port,
        port,
        u16
    );
    option_setter!(
        #[doc = "Cap the pending buffer at the given byte count."]
        with_bufmax,
        bufmax,
        usize
    );
    option_setter!(
        #[doc = "Bound connection setup and socket writes by the given timeout."]
        with_timeout,
        timeout,
        Duration
    );
    option_setter!(
        #[doc = "Tolerate the given number of consecutive failures before escalating."]
        with_max_send_fail,
        max_send_fail,
        u32
    );

    /// Echo each record to the diagnostic log before encoding.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn validate(&self) -> Result<(), BuildError> {
        self.validate_tag()?;
        self.validate_host()?;
        self.validate_limits()
    }

    fn validate_tag(&self) -> Result<(), BuildError> {
        let tag = self.tag.as_str();
        if tag.is_empty() || tag.split('.').any(|segment| segment.is_empty()) {
            return Err(BuildError::InvalidConfig(format!(
                "tag {tag:?} must be a non-empty dotted name"
            )));
        }
        Ok(())
    }

    fn validate_host(&self) -> Result<(), BuildError> {
        if let Some(host) = &self.host
            && host.trim().is_empty()
        {
            return Err(BuildError::InvalidConfig("host must not be empty".into()));
        }
        Ok(())
    }

    fn validate_limits(&self) -> Result<(), BuildError> {
        if let Some(bufmax) = self.bufmax {
            ensure_positive!(bufmax, "bufmax");
        }
        if let Some(timeout) = self.timeout {
            ensure_positive!(timeout.as_millis(), "timeout");
        }
        if let Some(max_send_fail) = self.max_send_fail {
            ensure_positive!(max_send_fail, "max_send_fail");
        }
        Ok(())
    }

    fn build_config(&self) -> Result<SenderConfig, BuildError> {
        self.validate()?;
        let mut config = SenderConfig::default();
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(bufmax) = self.bufmax {
            config.bufmax = bufmax;
        }
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
        if let Some(max_send_fail) = self.max_send_fail {
            config.max_send_fail = max_send_fail;
        }
        config.verbose = self.verbose;
        Ok(config)
    }

    /// Validate the configuration and construct the sender.
    pub fn build(&self) -> Result<FluentSender, BuildError> {
        let config = self.build_config()?;
        Ok(FluentSender::with_config(self.tag.clone(), config))
    }
}
