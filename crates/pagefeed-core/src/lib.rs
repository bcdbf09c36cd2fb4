//! # pagefeed-core
//!
//! Core functionality for pagefeed - a client-side pipeline that pages through
//! a remote list resource, persists what it fetched, and caches the images the
//! records point at.
//!
//! ## Architecture
//!
//! The crate is organized around a few components, leaf to root:
//!
//! - **Serialized executor**: one dedicated worker thread owns each piece of
//!   mutable state; operations run one at a time in submission order
//! - **Content cache**: cache-or-download resolution of image URLs with
//!   atomic, write-once publication on disk
//! - **Image slots**: per-item bounded retry (3 attempts, 1 second apart)
//! - **Pagination controller**: deduplicated, stale-safe sequential page
//!   loading with forced reload
//! - **Collaborators**: [`PageFetcher`] / [`ImageFetcher`] and [`PageStore`]
//!   traits, with HTTP, file and in-memory implementations
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pagefeed_core::{Config, FileStore, HttpFetcher, PaginationController, Result};
//!
//! # async fn run() -> Result<()> {
//! let config = Config::load()?;
//! let fetcher = Arc::new(HttpFetcher::from_config(&config.api)?);
//! let store = FileStore::open(config.data_dir()?, &config.api.resource)?;
//! let controller =
//!     PaginationController::new(store, fetcher, config.list.search_text.clone())?;
//!
//! controller.load_initial().await?;
//! let outcome = controller.request_next_page().await?;
//! println!("{outcome}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`]. Page load failures do not
//! surface as `Err`: they are reported through
//! [`RequestOutcome::Failed`] and
//! [`PaginationController::last_error_message`], leaving persisted pages
//! untouched.

/// Configuration management and directory resolution
pub mod config;
/// Cache-or-download resolution of remote images
pub mod content_cache;
/// Error types and result aliases
pub mod error;
/// Single-worker serialization of state mutation
pub mod executor;
/// Page and image fetching collaborators
pub mod fetcher;
/// Per-item image state with bounded retry
pub mod image;
/// Sequential page loading for one list resource
pub mod pagination;
/// Retry policy and injectable clock
pub mod retry;
/// Grouping of items by name initial
pub mod sections;
/// Page persistence
pub mod store;
/// Core data types
pub mod types;

// Re-export commonly used types
pub use config::{ApiConfig, Config, ImageConfig, ListConfig, PathsConfig};
pub use content_cache::{CacheStats, ContentCache};
pub use error::{Error, Result};
pub use executor::SerializedExecutor;
pub use fetcher::{HttpFetcher, ImageFetcher, PageFetcher};
pub use image::{ImageSlot, ImageState};
pub use pagination::{PaginationController, RequestOutcome, SkipReason};
pub use retry::{Clock, RetryPolicy, TokioClock};
pub use sections::{Section, group_by_initial, is_last_item};
pub use store::{FileStore, MemoryStore, PageStore};
pub use types::*;
