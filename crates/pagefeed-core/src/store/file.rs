//! JSON-file page store.
//!
//! ## Storage Layout
//!
//! ```text
//! <root>/pages/<resource>/
//!   page-000001.json     # first persisted page
//!   page-000002.json
//! ```
//!
//! Every file is written to a `.tmp` sibling and renamed into place, so a
//! crash mid-write never leaves a truncated page behind. `replace_all` builds
//! the new directory next to the live one and swaps it in.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::store::PageStore;
use crate::{Error, PageResult, Result};

/// Maximum allowed resource name length
const MAX_RESOURCE_LEN: usize = 64;
const PAGE_PREFIX: &str = "page-";
const PAGE_SUFFIX: &str = ".json";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredPage {
    sequence: u32,
    stored_at: DateTime<Utc>,
    page: PageResult,
}

/// Pages of one resource persisted as JSON files under a root directory.
#[derive(Debug)]
pub struct FileStore {
    root_dir: PathBuf,
    resource: String,
}

impl FileStore {
    /// Open (creating if needed) the store for `resource` under `root_dir`.
    pub fn open(root_dir: impl Into<PathBuf>, resource: &str) -> Result<Self> {
        Self::validate_resource(resource)?;
        let store = Self {
            root_dir: root_dir.into(),
            resource: resource.to_string(),
        };
        fs::create_dir_all(store.pages_dir())
            .map_err(|e| Error::Storage(format!("Failed to create pages directory: {e}")))?;
        Ok(store)
    }

    /// Returns the root data directory path
    #[must_use]
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Directory holding this resource's page files.
    #[must_use]
    pub fn pages_dir(&self) -> PathBuf {
        self.root_dir.join("pages").join(&self.resource)
    }

    fn staging_dir(&self) -> PathBuf {
        self.root_dir.join("pages").join(format!(".{}.staging", self.resource))
    }

    fn retired_dir(&self) -> PathBuf {
        self.root_dir.join("pages").join(format!(".{}.old", self.resource))
    }

    fn page_file_name(sequence: u32) -> String {
        format!("{PAGE_PREFIX}{sequence:06}{PAGE_SUFFIX}")
    }

    fn parse_sequence(file_name: &str) -> Option<u32> {
        file_name
            .strip_prefix(PAGE_PREFIX)?
            .strip_suffix(PAGE_SUFFIX)?
            .parse()
            .ok()
    }

    /// Validate that a resource name is safe to use as a directory name
    fn validate_resource(resource: &str) -> Result<()> {
        if resource.is_empty() {
            return Err(Error::Storage("Resource name cannot be empty".into()));
        }

        if resource.len() > MAX_RESOURCE_LEN {
            return Err(Error::Storage(format!(
                "Invalid resource '{resource}': exceeds maximum length of {MAX_RESOURCE_LEN} characters"
            )));
        }

        if resource.starts_with('.') || resource.starts_with('-') {
            return Err(Error::Storage(format!(
                "Invalid resource '{resource}': cannot start with '.' or '-'"
            )));
        }

        if !resource
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(Error::Storage(format!(
                "Invalid resource '{resource}': only [A-Za-z0-9_-] are allowed"
            )));
        }

        Ok(())
    }

    /// Sequence numbers of the persisted pages, ascending.
    fn sequences(dir: &Path) -> Result<Vec<u32>> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::Storage(format!("Failed to read pages directory: {e}"))),
        };

        let mut sequences: Vec<u32> = entries
            .flatten()
            .filter_map(|entry| entry.file_name().to_str().and_then(Self::parse_sequence))
            .collect();
        sequences.sort_unstable();
        Ok(sequences)
    }

    fn write_page(dir: &Path, sequence: u32, page: PageResult) -> Result<()> {
        let path = dir.join(Self::page_file_name(sequence));
        let record = StoredPage {
            sequence,
            stored_at: Utc::now(),
            page,
        };
        let json = serde_json::to_string_pretty(&record)
            .map_err(|e| Error::Storage(format!("Failed to serialize page: {e}")))?;

        // Atomic write: temp file + rename
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, json)
            .map_err(|e| Error::Storage(format!("Failed to write temp page file: {e}")))?;

        #[cfg(target_os = "windows")]
        if path.exists() {
            fs::remove_file(&path)
                .map_err(|e| Error::Storage(format!("Failed to remove existing page: {e}")))?;
        }

        fs::rename(&tmp_path, &path)
            .map_err(|e| Error::Storage(format!("Failed to commit page file: {e}")))?;
        Ok(())
    }

    fn read_page(dir: &Path, sequence: u32) -> Result<PageResult> {
        let path = dir.join(Self::page_file_name(sequence));
        let json = fs::read_to_string(&path)
            .map_err(|e| Error::Storage(format!("Failed to read {}: {e}", path.display())))?;
        let record: StoredPage = serde_json::from_str(&json)
            .map_err(|e| Error::Storage(format!("Failed to parse {}: {e}", path.display())))?;
        Ok(record.page)
    }

    fn remove_dir_if_present(dir: &Path) -> Result<()> {
        match fs::remove_dir_all(dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Storage(format!(
                "Failed to remove {}: {e}",
                dir.display()
            ))),
        }
    }
}

impl PageStore for FileStore {
    fn list_persisted_pages(&self) -> Result<Vec<PageResult>> {
        let dir = self.pages_dir();
        Self::sequences(&dir)?
            .into_iter()
            .map(|sequence| Self::read_page(&dir, sequence))
            .collect()
    }

    fn replace_all(&mut self, page: PageResult) -> Result<()> {
        let live = self.pages_dir();
        let staging = self.staging_dir();
        let retired = self.retired_dir();

        // Leftovers from an interrupted swap are never live data.
        Self::remove_dir_if_present(&staging)?;
        Self::remove_dir_if_present(&retired)?;

        fs::create_dir_all(&staging)
            .map_err(|e| Error::Storage(format!("Failed to create staging directory: {e}")))?;
        Self::write_page(&staging, 1, page)?;

        if live.exists() {
            fs::rename(&live, &retired)
                .map_err(|e| Error::Storage(format!("Failed to retire old pages: {e}")))?;
        }
        fs::rename(&staging, &live)
            .map_err(|e| Error::Storage(format!("Failed to publish new pages: {e}")))?;

        if let Err(e) = Self::remove_dir_if_present(&retired) {
            warn!("Replaced pages for {} but could not clean up: {}", self.resource, e);
        }

        info!("Replaced all pages for {}", self.resource);
        Ok(())
    }

    fn append(&mut self, page: PageResult) -> Result<()> {
        let dir = self.pages_dir();
        fs::create_dir_all(&dir)
            .map_err(|e| Error::Storage(format!("Failed to create pages directory: {e}")))?;

        let next = Self::sequences(&dir)?.last().map_or(1, |last| last + 1);
        Self::write_page(&dir, next, page)?;

        debug!("Appended page {} for {}", next, self.resource);
        Ok(())
    }

    fn has_any_pages(&self) -> Result<bool> {
        Ok(!Self::sequences(&self.pages_dir())?.is_empty())
    }

    fn last_page(&self) -> Result<Option<PageResult>> {
        let dir = self.pages_dir();
        Self::sequences(&dir)?
            .last()
            .map(|&sequence| Self::read_page(&dir, sequence))
            .transpose()
    }
}
