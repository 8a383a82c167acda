use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// How often to emit warnings about absorbed send failures.
pub const WARN_RATE_LIMIT_SECS: u64 = 5;

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|dur| dur.as_secs())
        .unwrap_or_default()
}

/// Helper that rate limits warnings about absorbed send failures.
///
/// The sender increments the failure counter via [`note_failure`] each time
/// an attempt is absorbed into the pending buffer. The next call to
/// [`warn_if_due`] emits a warning using the provided callback if the
/// configured interval has elapsed. [`drain`] emits immediately if any
/// failures have accumulated since the last emission, and is used when a
/// send finally succeeds.
///
/// [`note_failure`]: RetryWarner::note_failure
/// [`warn_if_due`]: RetryWarner::warn_if_due
/// [`drain`]: RetryWarner::drain
#[derive(Default)]
pub struct RetryWarner {
    last_warn: AtomicU64,
    absorbed: AtomicU64,
}

impl RetryWarner {
    /// Create a new [`RetryWarner`]. The first warning can be emitted
    /// immediately.
    pub fn new() -> Self {
        Self {
            last_warn: AtomicU64::new(now_secs().saturating_sub(WARN_RATE_LIMIT_SECS)),
            absorbed: AtomicU64::new(0),
        }
    }

    /// Increment the absorbed-failure counter.
    pub fn note_failure(&self) {
        self.absorbed.fetch_add(1, Ordering::Relaxed);
    }

    /// Emit a warning if the rate limit interval has elapsed.
    pub fn warn_if_due(&self, mut warn: impl FnMut(u64)) {
        let now = now_secs();
        let prev = self.last_warn.load(Ordering::Relaxed);
        if now.saturating_sub(prev) >= WARN_RATE_LIMIT_SECS {
            let count = self.absorbed.swap(0, Ordering::Relaxed);
            if count > 0 {
                warn(count);
            }
            self.last_warn.store(now, Ordering::Relaxed);
        }
    }

    /// Immediately report any accumulated failures.
    pub fn drain(&self, mut warn: impl FnMut(u64)) {
        let count = self.absorbed.swap(0, Ordering::Relaxed);
        if count > 0 {
            warn(count);
            self.last_warn.store(now_secs(), Ordering::Relaxed);
        }
    }
}
