//! Configuration management for pagefeed.
//!
//! Configuration is stored as TOML and falls back to sensible defaults when
//! no file exists. Directory locations honor environment overrides.
//!
//! ## Lookup order
//!
//! 1. `PAGEFEED_CONFIG_DIR/config.toml`
//! 2. `XDG_CONFIG_HOME/pagefeed/config.toml`
//! 3. The platform config directory (`directories::ProjectDirs`)
//!
//! ## Example Configuration File
//!
//! ```toml
//! [api]
//! base_url = "https://rickandmortyapi.com/api"
//! resource = "character"
//! timeout_secs = 30
//! user_agent = "pagefeed/0.3"
//!
//! [paths]
//! data_dir = "/home/user/.local/share/pagefeed"
//! cache_dir = "/home/user/.cache/pagefeed"
//!
//! [images]
//! max_attempts = 3
//! retry_delay_ms = 1000
//!
//! [list]
//! search_text = ""
//! ```
//!
//! ```rust
//! use pagefeed_core::Config;
//!
//! let config = Config::default();
//! assert_eq!(config.images.max_attempts, 3);
//! assert_eq!(config.api.resource, "character");
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Result, RetryPolicy};

const CONFIG_FILE: &str = "config.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote paging API.
    pub api: ApiConfig,
    /// On-disk locations.
    pub paths: PathsConfig,
    /// Image download retry policy.
    pub images: ImageConfig,
    /// List presentation settings.
    pub list: ListConfig,
}

/// Remote API settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the API, without the resource segment.
    pub base_url: String,
    /// Paged resource name appended to `base_url`.
    pub resource: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://rickandmortyapi.com/api".to_string(),
            resource: "character".to_string(),
            timeout_secs: 30,
            user_agent: concat!("pagefeed/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ApiConfig {
    /// Canonical URL of the resource's first page: `<base>/<resource>?page=1`.
    pub fn first_page_url(&self) -> Result<Url> {
        let base = self.base_url.trim_end_matches('/');
        let resource = self.resource.trim_matches('/');
        if resource.is_empty() {
            return Err(Error::Config("api.resource cannot be empty".into()));
        }
        let mut url = Url::parse(&format!("{base}/{resource}"))
            .map_err(|e| Error::Config(format!("Invalid api.base_url '{}': {e}", self.base_url)))?;
        url.query_pairs_mut().append_pair("page", "1");
        Ok(url)
    }
}

/// File system locations. Empty paths mean "use the platform default".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Where persisted pages live.
    pub data_dir: Option<PathBuf>,
    /// Where cached images live.
    pub cache_dir: Option<PathBuf>,
}

/// Image loading settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Total attempts per image before it is marked failed. Values above
    /// [`RetryPolicy::MAX_ATTEMPTS`] are clamped when the policy is built.
    pub max_attempts: u32,
    /// Fixed delay between attempts, in milliseconds.
    pub retry_delay_ms: u64,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_attempts: RetryPolicy::MAX_ATTEMPTS,
            retry_delay_ms: 1000,
        }
    }
}

impl ImageConfig {
    /// Retry policy described by this section.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.retry_delay_ms))
    }
}

/// List presentation settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListConfig {
    /// Case-insensitive name filter applied when grouping items.
    pub search_text: String,
}

impl Config {
    /// Load configuration from the default location or fall back to defaults.
    ///
    /// A missing file is not an error; a malformed one is.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load configuration from an explicit file, defaulting if it is absent.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config: {e}")))?;
        toml::from_str(&content).map_err(|e| Error::Config(format!("Failed to parse config: {e}")))
    }

    /// Save the configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("Failed to create config directory: {e}")))?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| Error::Config(format!("Failed to write config: {e}")))
    }

    /// Path of the configuration file honoring overrides.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    fn config_dir() -> Result<PathBuf> {
        if let Some(dir) = non_empty_env("PAGEFEED_CONFIG_DIR") {
            return Ok(PathBuf::from(dir));
        }
        if let Some(xdg) = non_empty_env("XDG_CONFIG_HOME") {
            return Ok(PathBuf::from(xdg).join("pagefeed"));
        }
        project_dirs()
            .map(|dirs| dirs.config_dir().to_path_buf())
            .ok_or_else(|| Error::Config("Failed to determine configuration directory".into()))
    }

    /// Directory for persisted pages: `PAGEFEED_DATA_DIR`, then
    /// `paths.data_dir`, then the platform data directory.
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = non_empty_env("PAGEFEED_DATA_DIR") {
            return Ok(PathBuf::from(dir));
        }
        if let Some(dir) = &self.paths.data_dir {
            return Ok(dir.clone());
        }
        project_dirs()
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or_else(|| Error::Config("Failed to determine data directory".into()))
    }

    /// Directory for cached images: `PAGEFEED_CACHE_DIR`, then
    /// `paths.cache_dir`, then the platform cache directory.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = non_empty_env("PAGEFEED_CACHE_DIR") {
            return Ok(PathBuf::from(dir));
        }
        if let Some(dir) = &self.paths.cache_dir {
            return Ok(dir.clone());
        }
        project_dirs()
            .map(|dirs| dirs.cache_dir().join("images"))
            .ok_or_else(|| Error::Config("Failed to determine cache directory".into()))
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "pagefeed", "pagefeed")
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
