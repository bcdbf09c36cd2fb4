//! Disk cache for binary assets referenced by list items.
//!
//! A remote URL maps to a deterministic path under the cache root that
//! mirrors the URL's structure:
//!
//! ```text
//! <root>/
//!   rickandmortyapi.com/
//!     api/character/avatar/1.jpeg
//!     api/character/avatar/2_q3f9a0c1d2e4b.jpeg   # same path, with a query
//!   localhost_p8080/
//!     img/a_2520b.png                             # /img/a%20b.png
//! ```
//!
//! Bytes outside `[A-Za-z0-9.-]` are escaped as `_XX`, so distinct URLs
//! never share a file.
//!
//! The file's existence is the cache entry. A fully downloaded file is linked
//! into place without overwriting, so entries are written once and a reader
//! sees either nothing or the complete content.
//!
//! [`ContentCache::resolve`] makes a single attempt. Retrying is the
//! caller's business (see [`ImageSlot`](crate::ImageSlot)).

use std::collections::HashSet;
use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use url::Url;

use crate::executor::SerializedExecutor;
use crate::fetcher::ImageFetcher;
use crate::{Error, Result};

/// Counters describing cache activity since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Resolutions served from disk.
    pub hits: u64,
    /// Resolutions that had to download.
    pub misses: u64,
    /// Downloads this instance published.
    pub downloads: u64,
    /// Distinct URLs resolved by this instance.
    pub entries: usize,
}

#[derive(Debug, Default)]
struct CacheIndex {
    urls: HashSet<String>,
    stats: CacheStats,
}

impl CacheIndex {
    fn remember(&mut self, url: String) {
        self.urls.insert(url);
        self.stats.entries = self.urls.len();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Published {
    Stored,
    AlreadyPresent,
}

/// Cache-or-download resolver for remote binary content.
pub struct ContentCache {
    root: PathBuf,
    fetcher: Arc<dyn ImageFetcher>,
    index: SerializedExecutor<CacheIndex>,
}

impl ContentCache {
    /// Create a cache rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>, fetcher: Arc<dyn ImageFetcher>) -> Result<Self> {
        Ok(Self {
            root: root.into(),
            fetcher,
            index: SerializedExecutor::spawn("pagefeed-content-cache", CacheIndex::default())?,
        })
    }

    /// Root directory of the cache.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic local path for `url`.
    pub fn local_path(&self, url: &str) -> Result<PathBuf> {
        local_path_for(&self.root, url)
    }

    /// Whether `url` is already cached on disk.
    pub async fn contains(&self, url: &str) -> Result<bool> {
        let path = self.local_path(url)?;
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| cache_io("check cache entry", &path, &e))
    }

    /// Resolve `url` to its bytes, downloading and publishing it on a miss.
    pub async fn resolve(&self, url: &str) -> Result<Vec<u8>> {
        let path = self.local_path(url)?;

        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                debug!("Cache hit for {}", url);
                let url = url.to_string();
                self.index.enqueue(move |index| {
                    index.stats.hits += 1;
                    index.remember(url);
                });
                return Ok(bytes);
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {},
            Err(e) => return Err(cache_io("read cache entry", &path, &e)),
        }

        self.index.enqueue(|index| index.stats.misses += 1);
        let temp = self.fetcher.fetch_image(url).await?;

        let dest = path.clone();
        let published = tokio::task::spawn_blocking(move || publish(&temp, &dest))
            .await
            .map_err(|e| Error::CacheIo(format!("Publish task failed: {e}")))??;

        match published {
            Published::Stored => info!("Cached {} at {}", url, path.display()),
            Published::AlreadyPresent => debug!("{} was published concurrently", url),
        }

        let entry_url = url.to_string();
        self.index.enqueue(move |index| {
            if published == Published::Stored {
                index.stats.downloads += 1;
            }
            index.remember(entry_url);
        });

        tokio::fs::read(&path)
            .await
            .map_err(|e| cache_io("read published entry", &path, &e))
    }

    /// Snapshot of the activity counters.
    pub async fn stats(&self) -> Result<CacheStats> {
        self.index.call(|index| index.stats).await
    }
}

/// Publish a downloaded file at `dest` without ever exposing partial content.
///
/// An existing entry wins: the download is discarded either way.
fn publish(temp: &Path, dest: &Path) -> Result<Published> {
    let parent = dest
        .parent()
        .ok_or_else(|| Error::CacheIo(format!("No parent directory for {}", dest.display())))?;
    std::fs::create_dir_all(parent).map_err(|e| cache_io("create cache directory", parent, &e))?;

    // A hard link never replaces an existing entry.
    match std::fs::hard_link(temp, dest) {
        Ok(()) => {
            discard(temp);
            return Ok(Published::Stored);
        },
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            discard(temp);
            return Ok(Published::AlreadyPresent);
        },
        Err(e) => debug!("Linking {} failed ({}), staging a copy", temp.display(), e),
    }

    // Most likely a different filesystem: stage a copy next to the destination.
    let staging = tempfile::Builder::new()
        .prefix(".pagefeed-")
        .suffix(".part")
        .tempfile_in(parent)
        .map_err(|e| cache_io("create staging file", parent, &e))?
        .into_temp_path();
    std::fs::copy(temp, &staging).map_err(|e| cache_io("stage download", temp, &e))?;
    discard(temp);

    match staging.persist_noclobber(dest) {
        Ok(()) => Ok(Published::Stored),
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(Published::AlreadyPresent),
        Err(e) => Err(cache_io("publish cache entry", dest, &e.error)),
    }
}

fn discard(temp: &Path) {
    if let Err(e) = std::fs::remove_file(temp) {
        warn!("Failed to remove download {}: {}", temp.display(), e);
    }
}

fn cache_io(action: &str, path: &Path, err: &io::Error) -> Error {
    Error::CacheIo(format!("Failed to {action} {}: {err}", path.display()))
}

/// Map `url` to `<root>/<host>[_p<port>]/<segments...>`.
///
/// Every path segment, empty ones included, becomes one path component, so
/// `/a//b` and `/a/b` stay apart.
fn local_path_for(root: &Path, url: &str) -> Result<PathBuf> {
    let parsed = Url::parse(url).map_err(|e| Error::InvalidUrl(format!("'{url}': {e}")))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| Error::InvalidUrl(format!("'{url}' has no host")))?;

    // Escaped names never contain `_p`, so the port marker is unambiguous.
    let host_dir = match parsed.port() {
        Some(port) => format!("{}_p{port}", sanitize_segment(host)),
        None => sanitize_segment(host),
    };
    let mut path = root.join(host_dir);

    let mut segments: Vec<String> = parsed
        .path_segments()
        .map(|segments| segments.map(sanitize_segment).collect())
        .unwrap_or_default();
    if segments.is_empty() {
        segments.push(sanitize_segment(""));
    }

    if let Some(query) = parsed.query() {
        if let Some(last) = segments.last_mut() {
            *last = with_query_suffix(last, query);
        }
    }

    for segment in segments {
        path.push(segment);
    }
    Ok(path)
}

/// Escape `segment` into a portable file name.
///
/// `[A-Za-z0-9.-]` is kept and every other byte (including `_`) becomes
/// `_XX`. A name made only of dots is escaped whole, so the result is never
/// `.` or `..`. The empty segment maps to a lone `_`, which no escaped
/// name can equal.
fn sanitize_segment(segment: &str) -> String {
    if segment.is_empty() {
        return "_".to_string();
    }
    let dots_only = segment.bytes().all(|b| b == b'.');

    let mut escaped = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        let keep = byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'.';
        if keep && !dots_only {
            escaped.push(char::from(byte));
        } else {
            // write! to String is infallible
            let _ = write!(escaped, "_{byte:02X}");
        }
    }
    escaped
}

/// `avatar.jpeg` + `size=2` → `avatar_q<hash12>.jpeg`
fn with_query_suffix(file_name: &str, query: &str) -> String {
    let digest = Sha256::digest(query.as_bytes());
    let hash = digest.iter().take(6).fold(String::new(), |mut acc, b| {
        // write! to String is infallible
        let _ = write!(acc, "{b:02x}");
        acc
    });

    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}_q{hash}.{ext}"),
        _ => format!("{file_name}_q{hash}"),
    }
}
