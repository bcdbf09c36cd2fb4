//! Error types and handling for pagefeed-core operations.
//!
//! One error enum covers the page loader, the page store and the content
//! cache. Errors are categorized for logging and carry a recoverability hint
//! used by the image retry loop.
//!
//! ## Error Categories
//!
//! - **Transport**: non-success HTTP responses, connectivity failures
//! - **Decode**: malformed page payloads
//! - **Invalid cursor**: a next-page reference that is not a usable URL
//! - **Invalid URL**: an image URL that cannot be mapped to a cache path
//! - **Cache I/O**: disk failures while resolving cached content
//! - **Retry exhausted**: an image that failed its bounded attempts
//! - **Storage / Config**: persisted pages and configuration files
//!
//! ```rust
//! use pagefeed_core::Error;
//!
//! let err = Error::Transport("HTTP 503 for https://example.com/api".into());
//! assert_eq!(err.category(), "transport");
//! assert!(err.is_recoverable());
//! ```

use thiserror::Error;

/// The main error type for pagefeed-core operations.
///
/// `Display` is the human-readable message surfaced to the presentation
/// layer (for example as the controller's last error message).
#[derive(Error, Debug)]
pub enum Error {
    /// The remote could not be reached or answered with a non-success status.
    ///
    /// ## Recoverability
    ///
    /// Always considered recoverable: the next attempt may succeed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The remote answered but the payload could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// A next-page reference could not be turned into a fetchable key.
    ///
    /// The pagination controller treats this as "no more pages" rather than
    /// surfacing it.
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    /// A resource URL could not be parsed or mapped to a cache entry.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Disk failure while reading or publishing a cache entry.
    #[error("Cache I/O error: {0}")]
    CacheIo(String),

    /// An image failed every attempt allowed by its retry policy.
    #[error("Failed to load '{url}' after {attempts} attempts")]
    RetryExhausted {
        /// Remote URL of the image.
        url: String,
        /// Number of attempts made.
        attempts: u32,
    },

    /// Persisted pages could not be read or written.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration is invalid or inaccessible.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The serialized worker owning the state has shut down.
    #[error("Serialized executor is closed")]
    ExecutorClosed,

    /// Underlying I/O failure not attributed to a specific component.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl Error {
    /// Check if the error might be recoverable by trying again later.
    ///
    /// Transport failures and cache I/O failures are transient in practice;
    /// decode, cursor and configuration failures are not.
    ///
    /// ```rust
    /// use pagefeed_core::Error;
    ///
    /// assert!(Error::CacheIo("disk busy".into()).is_recoverable());
    /// assert!(!Error::Decode("missing field `info`".into()).is_recoverable());
    /// ```
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::CacheIo(_) => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }

    /// Get the error category as a static identifier for structured logs.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Decode(_) => "decode",
            Self::InvalidCursor(_) => "invalid_cursor",
            Self::InvalidUrl(_) => "invalid_url",
            Self::CacheIo(_) => "cache_io",
            Self::RetryExhausted { .. } => "retry_exhausted",
            Self::Storage(_) => "storage",
            Self::Config(_) => "config",
            Self::ExecutorClosed => "executor",
            Self::Io(_) => "io",
        }
    }
}

/// Convenience type alias for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
