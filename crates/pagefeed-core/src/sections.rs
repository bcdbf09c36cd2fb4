//! Read-side grouping of persisted items.

use serde::Serialize;

use crate::{Item, PageResult};

/// Items sharing the same name initial.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    /// Upper-cased first character of every item name in the section.
    pub initial: String,
    /// Items sorted by name.
    pub items: Vec<Item>,
}

/// Group the items of `pages` by name initial.
///
/// Items whose name does not contain `filter` (case-insensitive) are
/// dropped; an empty filter keeps everything. Sections come out in name
/// order.
#[must_use]
pub fn group_by_initial(pages: &[PageResult], filter: &str) -> Vec<Section> {
    let needle = filter.trim().to_lowercase();
    let mut items: Vec<&Item> = pages
        .iter()
        .flat_map(|page| page.items.iter())
        .filter(|item| needle.is_empty() || item.name.to_lowercase().contains(&needle))
        .collect();
    // Stable: equal names keep their fetch order.
    items.sort_by(|a, b| a.name.cmp(&b.name));

    let mut sections: Vec<Section> = Vec::new();
    for item in items {
        let initial = item.initial();
        match sections.last_mut() {
            Some(section) if section.initial == initial => section.items.push(item.clone()),
            _ => sections.push(Section {
                initial,
                items: vec![item.clone()],
            }),
        }
    }
    sections
}

/// Whether `id` is the last item of the last page, i.e. the prefetch trigger.
#[must_use]
pub fn is_last_item(pages: &[PageResult], id: u64) -> bool {
    pages
        .last()
        .and_then(PageResult::last_item_id)
        .is_some_and(|last| last == id)
}
