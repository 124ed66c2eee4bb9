//! Page-based result slicing

use serde::{Deserialize, Serialize};

/// Pagination metadata; pages start at 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub total: u64,
    pub per_page: u64,
    pub current_page: u64,
    pub last_page: u64,
    pub first_page: u64,
}

impl PageMeta {
    /// Page 0 reads as page 1 and `per_page` is at least 1
    pub fn new(total: u64, current_page: u64, per_page: u64) -> Self {
        let per_page = per_page.max(1);
        let last_page = total.div_ceil(per_page).max(1);

        Self {
            total,
            per_page,
            current_page: current_page.max(1),
            last_page,
            first_page: 1,
        }
    }

    pub fn has_more_pages(&self) -> bool {
        self.current_page < self.last_page
    }

    /// Offset of the first row on the current page
    ///
    /// Saturates for page numbers far past the end, which then slice nothing.
    pub fn offset(&self) -> u64 {
        self.current_page.saturating_sub(1).saturating_mul(self.per_page)
    }
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Page<T> {
    /// Slice a page out of the full result set
    pub fn from_items(items: Vec<T>, page: u64, per_page: u64) -> Self {
        let meta = PageMeta::new(items.len() as u64, page, per_page);
        let data = items
            .into_iter()
            .skip(usize::try_from(meta.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(meta.per_page).unwrap_or(usize::MAX))
            .collect();

        Self { data, meta }
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            meta: self.meta,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
