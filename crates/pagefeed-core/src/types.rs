use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::{Error, Result};

/// Opaque cursor identifying which page of a resource to fetch.
///
/// The absence of a cursor means "the resource's first page". Equality of
/// keys is what the pagination controller uses to suppress duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageKey(Option<String>);

impl PageKey {
    /// The canonical first-page key (no cursor).
    #[must_use]
    pub const fn first() -> Self {
        Self(None)
    }

    /// Build a key from a remote next/prev reference.
    ///
    /// The reference must be an absolute URL; anything else is
    /// [`Error::InvalidCursor`].
    pub fn from_cursor(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let parsed = Url::parse(trimmed)
            .map_err(|e| Error::InvalidCursor(format!("'{trimmed}': {e}")))?;
        if parsed.cannot_be_a_base() {
            return Err(Error::InvalidCursor(format!(
                "'{trimmed}' is not a hierarchical URL"
            )));
        }
        Ok(Self(Some(parsed.into())))
    }

    /// The cursor URL, or `None` for the first page.
    #[must_use]
    pub fn cursor(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(cursor) => f.write_str(cursor),
            None => f.write_str("<first page>"),
        }
    }
}

/// One record of a list page.
///
/// Only the fields the pipeline itself needs are typed; every other remote
/// field is kept verbatim in `attributes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Remote identifier.
    pub id: u64,
    /// Display name, used for grouping and search.
    pub name: String,
    /// Image URL, if the record has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Remaining remote fields.
    #[serde(flatten)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl Item {
    /// Create an item with no extra attributes.
    #[must_use]
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            image: None,
            attributes: serde_json::Map::new(),
        }
    }

    /// Set the image URL using builder pattern.
    #[must_use]
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Upper-cased first character of the name, or `"#"` for empty names.
    ///
    /// Derived on read; never persisted.
    #[must_use]
    pub fn initial(&self) -> String {
        self.name
            .chars()
            .next()
            .map_or_else(|| "#".to_string(), |c| c.to_uppercase().collect())
    }
}

/// One fetched page. Immutable once produced by a fetcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    /// Records in remote order.
    pub items: Vec<Item>,
    /// Reference to the following page, if any.
    pub next_cursor: Option<String>,
    /// Reference to the preceding page, if any.
    pub prev_cursor: Option<String>,
    /// Total number of records the remote reports for the resource.
    pub total_count: u64,
    /// Total number of pages the remote reports, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
}

impl PageResult {
    /// Create a page with no cursors.
    #[must_use]
    pub const fn new(items: Vec<Item>, total_count: u64) -> Self {
        Self {
            items,
            next_cursor: None,
            prev_cursor: None,
            total_count,
            page_count: None,
        }
    }

    /// Set the next cursor using builder pattern.
    #[must_use]
    pub fn with_next(mut self, next: impl Into<String>) -> Self {
        self.next_cursor = Some(next.into());
        self
    }

    /// Key of the following page.
    ///
    /// `Ok(None)` means this is the last page; a malformed reference is
    /// [`Error::InvalidCursor`].
    pub fn next_key(&self) -> Result<Option<PageKey>> {
        self.next_cursor
            .as_deref()
            .map(PageKey::from_cursor)
            .transpose()
    }

    /// Id of the last record on this page.
    #[must_use]
    pub fn last_item_id(&self) -> Option<u64> {
        self.items.last().map(|item| item.id)
    }
}

/// Loading status exposed to the presentation layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    /// No load has been requested yet.
    #[default]
    Unknown,
    /// A page fetch is in flight.
    Loading,
    /// No fetch is in flight.
    Idle,
}

impl fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unknown => "unknown",
            Self::Loading => "loading",
            Self::Idle => "idle",
        };
        f.write_str(label)
    }
}
