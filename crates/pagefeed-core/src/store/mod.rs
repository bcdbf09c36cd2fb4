//! Persistence of fetched pages.
//!
//! The pagination controller owns its store exclusively and only touches it
//! from its serialized worker, so implementations are plain synchronous code
//! with no internal locking.
//!
//! - [`MemoryStore`]: pages kept in process memory
//! - [`FileStore`]: one JSON file per page with atomic writes

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::{PageResult, Result};

/// Ordered collection of persisted pages for one list resource.
pub trait PageStore: Send + 'static {
    /// All persisted pages in the order they were stored.
    fn list_persisted_pages(&self) -> Result<Vec<PageResult>>;

    /// Erase every persisted page, then persist `page` as the only one.
    fn replace_all(&mut self, page: PageResult) -> Result<()>;

    /// Persist `page` after the existing ones.
    fn append(&mut self, page: PageResult) -> Result<()>;

    /// Whether at least one page is persisted.
    fn has_any_pages(&self) -> Result<bool>;

    /// The most recently persisted page.
    fn last_page(&self) -> Result<Option<PageResult>> {
        Ok(self.list_persisted_pages()?.pop())
    }
}

impl<T: PageStore + ?Sized> PageStore for Box<T> {
    fn list_persisted_pages(&self) -> Result<Vec<PageResult>> {
        (**self).list_persisted_pages()
    }

    fn replace_all(&mut self, page: PageResult) -> Result<()> {
        (**self).replace_all(page)
    }

    fn append(&mut self, page: PageResult) -> Result<()> {
        (**self).append(page)
    }

    fn has_any_pages(&self) -> Result<bool> {
        (**self).has_any_pages()
    }

    fn last_page(&self) -> Result<Option<PageResult>> {
        (**self).last_page()
    }
}
