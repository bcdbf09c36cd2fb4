//! Retry policy and the clock it waits on.

use std::time::Duration;

use futures::future::BoxFuture;

/// Bounded retry with a fixed delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts allowed, including the first one.
    pub max_attempts: u32,
    /// Fixed wait between two attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Maximum number of attempts for an image before it is terminally failed.
    pub const MAX_ATTEMPTS: u32 = 3;
    /// Default wait between attempts.
    pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);

    /// Create a policy. `max_attempts` is clamped to `1..=MAX_ATTEMPTS`.
    #[must_use]
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.clamp(1, Self::MAX_ATTEMPTS),
            delay,
        }
    }

    /// Whether another attempt is allowed after `attempts` have been made.
    #[must_use]
    pub const fn allows_another(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::MAX_ATTEMPTS, Self::DEFAULT_DELAY)
    }
}

/// Source of delays for retry loops.
pub trait Clock: Send + Sync {
    /// Wait for `duration`.
    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()>;
}

/// [`Clock`] backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}
