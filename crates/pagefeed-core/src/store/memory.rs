use crate::store::PageStore;
use crate::{PageResult, Result};

/// Pages kept in memory for the lifetime of the process.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    pages: Vec<PageResult>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `pages`.
    #[must_use]
    pub const fn with_pages(pages: Vec<PageResult>) -> Self {
        Self { pages }
    }
}

impl PageStore for MemoryStore {
    fn list_persisted_pages(&self) -> Result<Vec<PageResult>> {
        Ok(self.pages.clone())
    }

    fn replace_all(&mut self, page: PageResult) -> Result<()> {
        self.pages.clear();
        self.pages.push(page);
        Ok(())
    }

    fn append(&mut self, page: PageResult) -> Result<()> {
        self.pages.push(page);
        Ok(())
    }

    fn has_any_pages(&self) -> Result<bool> {
        Ok(!self.pages.is_empty())
    }

    fn last_page(&self) -> Result<Option<PageResult>> {
        Ok(self.pages.last().cloned())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::Item;

    fn page(id: u64) -> PageResult {
        PageResult::new(vec![Item::new(id, format!("item {id}"))], 10)
    }

    #[test]
    fn append_keeps_order_and_replace_all_resets() {
        let mut store = MemoryStore::new();
        assert!(!store.has_any_pages().unwrap());

        store.append(page(1)).unwrap();
        store.append(page(2)).unwrap();
        assert_eq!(store.list_persisted_pages().unwrap(), vec![page(1), page(2)]);
        assert_eq!(store.last_page().unwrap(), Some(page(2)));

        store.replace_all(page(3)).unwrap();
        assert_eq!(store.list_persisted_pages().unwrap(), vec![page(3)]);
        assert!(store.has_any_pages().unwrap());
    }
}
