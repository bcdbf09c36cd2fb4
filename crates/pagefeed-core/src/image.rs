//! Per-item image loading with bounded retry.
//!
//! An [`ImageSlot`] belongs to one list item. It drives
//! [`ContentCache::resolve`] through at most `max_attempts` attempts with a
//! fixed delay between them, then settles in [`ImageState::Failed`] until the
//! user asks for [`ImageSlot::retry`]. Only recoverable errors
//! ([`Error::is_recoverable`]) are retried; anything else fails at once.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::content_cache::ContentCache;
use crate::retry::{Clock, RetryPolicy, TokioClock};
use crate::Error;

/// Display state of an item's image.
#[derive(Clone, PartialEq, Eq, Default)]
pub enum ImageState {
    /// Nothing attempted yet.
    #[default]
    Idle,
    /// An attempt is running or waiting for its retry delay.
    Loading,
    /// Image bytes are available.
    Loaded(Vec<u8>),
    /// Terminal failure with a human-readable message.
    Failed(String),
}

impl fmt::Debug for ImageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("Idle"),
            Self::Loading => f.write_str("Loading"),
            Self::Loaded(bytes) => write!(f, "Loaded({} bytes)", bytes.len()),
            Self::Failed(message) => f.debug_tuple("Failed").field(message).finish(),
        }
    }
}

/// Image of one list item, with its retry counter.
pub struct ImageSlot {
    url: String,
    state: ImageState,
    attempts: u32,
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl ImageSlot {
    /// Slot for `url` with the default policy and the tokio clock.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_policy(url, RetryPolicy::default(), Arc::new(TokioClock))
    }

    /// Slot with an explicit policy and clock.
    #[must_use]
    pub fn with_policy(url: impl Into<String>, policy: RetryPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            url: url.into(),
            state: ImageState::Idle,
            attempts: 0,
            policy,
            clock,
        }
    }

    /// Remote URL of the image.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &ImageState {
        &self.state
    }

    /// Attempts made since creation or the last [`retry`](Self::retry).
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Load the image unless it is already loaded or terminally failed.
    pub async fn load(&mut self, cache: &ContentCache) -> &ImageState {
        if matches!(self.state, ImageState::Loaded(_) | ImageState::Failed(_)) {
            return &self.state;
        }

        self.state = ImageState::Loading;
        loop {
            self.attempts += 1;
            match cache.resolve(&self.url).await {
                Ok(bytes) => {
                    debug!("Loaded {} on attempt {}", self.url, self.attempts);
                    self.state = ImageState::Loaded(bytes);
                    break;
                },
                Err(e) if e.is_recoverable() && self.policy.allows_another(self.attempts) => {
                    debug!(
                        "Attempt {}/{} for {} failed ({}): {}",
                        self.attempts,
                        self.policy.max_attempts,
                        self.url,
                        e.category(),
                        e
                    );
                    self.clock.sleep(self.policy.delay).await;
                },
                Err(e) if e.is_recoverable() => {
                    warn!("Giving up on {}: {}", self.url, e);
                    let exhausted = Error::RetryExhausted {
                        url: self.url.clone(),
                        attempts: self.attempts,
                    };
                    self.state = ImageState::Failed(exhausted.to_string());
                    break;
                },
                Err(e) => {
                    warn!("Not retrying {} ({}): {}", self.url, e.category(), e);
                    self.state = ImageState::Failed(e.to_string());
                    break;
                },
            }
        }
        &self.state
    }

    /// Explicit user retry: reset the counter and load again.
    pub async fn retry(&mut self, cache: &ContentCache) -> &ImageState {
        self.attempts = 0;
        self.state = ImageState::Idle;
        self.load(cache).await
    }
}

impl fmt::Debug for ImageSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageSlot")
            .field("url", &self.url)
            .field("state", &self.state)
            .field("attempts", &self.attempts)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
