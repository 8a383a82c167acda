//! Process-wide default sender.
//!
//! Pure wiring around a single [`FluentSender`] instance: [`setup`]
//! constructs and installs it, [`get_global_sender`] hands out shared
//! references. This is explicit process-wide state with one-time
//! initialisation; calling [`setup`] again replaces the instance, and
//! bytes buffered by the old instance are dropped with it. No retry logic
//! lives here.

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::sender::{FluentSender, SenderConfig};

static GLOBAL_SENDER: Lazy<RwLock<Option<Arc<FluentSender>>>> = Lazy::new(|| RwLock::new(None));

/// Install a process-wide sender constructed from `tag` and `config`.
pub fn setup(tag: impl Into<String>, config: SenderConfig) {
    let sender = Arc::new(FluentSender::with_config(tag, config));
    *GLOBAL_SENDER.write() = Some(sender);
}

/// Retrieve the process-wide sender, if one has been installed.
pub fn get_global_sender() -> Option<Arc<FluentSender>> {
    GLOBAL_SENDER.read().clone()
}

/// Remove the process-wide sender. Intended for tests and orderly
/// shutdown; emitters holding an `Arc` from [`get_global_sender`] keep
/// their instance alive.
pub fn teardown() {
    *GLOBAL_SENDER.write() = None;
}
