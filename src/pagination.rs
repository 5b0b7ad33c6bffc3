// Page window arithmetic and the compact page-number strip shown under results

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageWindow {
    pub start_index: usize,
    pub end_index: usize,
    pub total_pages: usize,
    pub clamped_page: usize,
}

impl PageWindow {
    pub fn len(&self) -> usize {
        self.end_index - self.start_index
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Local pagination over an already-filtered list
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let end = self.end_index.min(items.len());
        let start = self.start_index.min(end);
        &items[start..end]
    }
}

// Out-of-range pages are clamped; a zero page size is treated as one.
pub fn paginate(total_count: usize, page: usize, page_size: usize) -> PageWindow {
    let page_size = page_size.max(1);
    let total_pages = total_count.div_ceil(page_size);
    let clamped_page = page.clamp(1, total_pages.max(1));
    let start_index = ((clamped_page - 1) * page_size).min(total_count);
    let end_index = start_index.saturating_add(page_size).min(total_count);
    PageWindow { start_index, end_index, total_pages, clamped_page }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "page", rename_all = "camelCase")]
pub enum PageItem {
    Page(usize),
    Ellipsis,
}

// Every page when they all fit. Otherwise a window of `max_visible` pages
// centred on `current` and shifted at the edges, with the first and last page
// pinned outside it and an ellipsis wherever pages are skipped.
pub fn build_page_sequence(current: usize, total: usize, max_visible: usize) -> Vec<PageItem> {
    if total == 0 {
        return Vec::new();
    }
    let max_visible = max_visible.max(1);
    if total <= max_visible {
        return (1..=total).map(PageItem::Page).collect();
    }

    let current = current.clamp(1, total);
    let half = max_visible / 2;
    let mut start = current.saturating_sub(half).max(1);
    let mut end = start + max_visible - 1;
    if end > total {
        end = total;
        start = total + 1 - max_visible;
    }

    let mut items = Vec::with_capacity(max_visible + 4);
    if start > 1 {
        items.push(PageItem::Page(1));
        if start > 2 {
            items.push(PageItem::Ellipsis);
        }
    }
    items.extend((start..=end).map(PageItem::Page));
    if end < total {
        if end < total - 1 {
            items.push(PageItem::Ellipsis);
        }
        items.push(PageItem::Page(total));
    }
    items
}
