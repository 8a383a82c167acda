//! Forwarding sender built around a buffering retry state machine.
//!
//! This module defines [`FluentSender`], which packs event records into
//! MessagePack `[tag, time, record]` messages and forwards them over a
//! lazily established TCP or Unix domain socket connection. Bytes from
//! failed sends are retained in a bounded pending buffer and prepended to
//! the next attempt; sustained failure surfaces to the caller once a
//! count, time, or size threshold is crossed.

mod builder;
mod config;
mod core;
mod serialise;
mod transport;

#[cfg(test)]
mod tests;

pub use builder::SenderBuilder;
pub use config::{
    DEFAULT_BUFMAX, DEFAULT_HOST, DEFAULT_MAX_SEND_FAIL, DEFAULT_PORT, DEFAULT_TIMEOUT,
    SEND_FAIL_WINDOW, SenderConfig,
};
pub use core::{EmitStatus, FluentSender};
pub use transport::{Endpoint, UNIX_PREFIX};
