use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use url::Url;

use crate::config::ApiConfig;
use crate::{Error, Item, PageKey, PageResult, Result};

/// Source of list pages.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch the page identified by `key`.
    ///
    /// Fails with [`Error::Transport`] or [`Error::Decode`].
    async fn fetch_page(&self, key: &PageKey) -> Result<PageResult>;
}

/// Source of binary assets referenced by list items.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Download `url` into a temporary file and return its path.
    ///
    /// The caller takes ownership of the file.
    async fn fetch_image(&self, url: &str) -> Result<PathBuf>;
}

/// HTTP client for a JSON paging API shaped like
/// `{ "info": { "count", "pages", "next", "prev" }, "results": [...] }`.
pub struct HttpFetcher {
    client: Client,
    first_page_url: Url,
    temp_dir: PathBuf,
}

impl HttpFetcher {
    /// Creates a fetcher whose first page lives at `first_page_url`.
    pub fn new(first_page_url: Url) -> Result<Self> {
        Self::with_timeout(first_page_url, Duration::from_secs(30))
    }

    /// Creates a fetcher with a custom request timeout (primarily for tests)
    pub fn with_timeout(first_page_url: Url, timeout: Duration) -> Result<Self> {
        Self::build(first_page_url, timeout, concat!("pagefeed/", env!("CARGO_PKG_VERSION")))
    }

    /// Creates a fetcher from the `[api]` configuration section.
    pub fn from_config(api: &ApiConfig) -> Result<Self> {
        let first_page_url = api.first_page_url()?;
        Self::build(
            first_page_url,
            Duration::from_secs(api.timeout_secs),
            &api.user_agent,
        )
    }

    fn build(first_page_url: Url, timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| Error::Transport(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            first_page_url,
            temp_dir: std::env::temp_dir(),
        })
    }

    /// Directory receiving downloaded images before they are published.
    ///
    /// Placing it on the cache's filesystem lets the publish be a plain rename.
    #[must_use]
    pub fn with_temp_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.temp_dir = dir.as_ref().to_path_buf();
        self
    }

    /// URL fetched for [`PageKey::first`].
    #[must_use]
    pub const fn first_page_url(&self) -> &Url {
        &self.first_page_url
    }

    async fn get(&self, url: &str) -> Result<Response> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(transport_status(url, status));
        }
        Ok(response)
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_page(&self, key: &PageKey) -> Result<PageResult> {
        let url = key.cursor().unwrap_or_else(|| self.first_page_url.as_str());
        debug!("Fetching page {}", url);

        let body = self.get(url).await?.text().await?;
        let envelope: PageEnvelope = serde_json::from_str(&body)
            .map_err(|e| Error::Decode(format!("Malformed page from {url}: {e}")))?;
        let page = envelope.into_page();

        info!(
            "Fetched {} items from {} (next: {})",
            page.items.len(),
            url,
            page.next_cursor.as_deref().unwrap_or("none")
        );
        Ok(page)
    }
}

#[async_trait]
impl ImageFetcher for HttpFetcher {
    async fn fetch_image(&self, url: &str) -> Result<PathBuf> {
        let mut response = self.get(url).await?;

        tokio::fs::create_dir_all(&self.temp_dir)
            .await
            .map_err(|e| Error::CacheIo(format!("Failed to create download directory: {e}")))?;
        let temp = tempfile::Builder::new()
            .prefix(".pagefeed-")
            .suffix(".download")
            .tempfile_in(&self.temp_dir)
            .map_err(|e| Error::CacheIo(format!("Failed to create temp file: {e}")))?;
        // The temp path deletes the file on drop until it is kept.
        let (file, temp_path) = temp.into_parts();
        let mut file = tokio::fs::File::from_std(file);

        let mut written = 0_usize;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk)
                .await
                .map_err(|e| Error::CacheIo(format!("Failed to write download: {e}")))?;
            written += chunk.len();
        }
        file.flush()
            .await
            .map_err(|e| Error::CacheIo(format!("Failed to flush download: {e}")))?;
        drop(file);

        let path = temp_path
            .keep()
            .map_err(|e| Error::CacheIo(format!("Failed to keep download: {e}")))?;
        debug!("Downloaded {} bytes from {} to {}", written, url, path.display());
        Ok(path)
    }
}

fn transport_status(url: &str, status: StatusCode) -> Error {
    Error::Transport(format!("HTTP {} for '{url}'", status.as_u16()))
}

#[derive(Debug, Deserialize)]
struct PageEnvelope {
    info: PageInfo,
    results: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct PageInfo {
    count: u64,
    #[serde(default)]
    pages: Option<u32>,
    next: Option<String>,
    prev: Option<String>,
}

impl PageEnvelope {
    fn into_page(self) -> PageResult {
        PageResult {
            items: self.results,
            next_cursor: self.info.next,
            prev_cursor: self.info.prev,
            total_count: self.info.count,
            page_count: self.info.pages,
        }
    }
}

// Note: Default is not implemented as HttpFetcher::new() can fail.
