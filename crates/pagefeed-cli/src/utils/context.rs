//! Wiring of the core components from configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use pagefeed_core::{Config, ContentCache, FileStore, HttpFetcher, PaginationController};
use tracing::debug;

/// Resolved configuration plus the shared HTTP fetcher.
pub struct AppContext {
    pub config: Config,
    fetcher: Arc<HttpFetcher>,
}

impl AppContext {
    /// Load configuration from `path` or the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Config::load_from(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => Config::load().context("Failed to load config")?,
        };
        let fetcher = HttpFetcher::from_config(&config.api)?
            .with_temp_dir(config.cache_dir()?.join(".downloads"));
        debug!("Using API at {}", fetcher.first_page_url());
        Ok(Self {
            config,
            fetcher: Arc::new(fetcher),
        })
    }

    /// Directory holding persisted pages.
    pub fn data_dir(&self) -> Result<PathBuf> {
        Ok(self.config.data_dir()?)
    }

    /// Directory holding cached images.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        Ok(self.config.cache_dir()?)
    }

    /// Controller over the file store, filtering sections by `search`.
    pub fn controller(&self, search: Option<&str>) -> Result<PaginationController> {
        let store = FileStore::open(self.data_dir()?, &self.config.api.resource)
            .context("Failed to open page store")?;
        let search = search.unwrap_or(&self.config.list.search_text).to_string();
        Ok(PaginationController::new(store, self.fetcher.clone(), search)?)
    }

    /// Image cache under the configured cache directory.
    pub fn content_cache(&self) -> Result<ContentCache> {
        Ok(ContentCache::new(self.cache_dir()?, self.fetcher.clone())?)
    }
}
