//! Pagination utilities for the verse list.
//!
//! Pages are fixed-size slices of the queue. The page that contains the
//! active verse is `floor(index / page_size)`; the follower only recommends
//! a page when that value changes.

use std::ops::Range;
use tracing::debug;

/// Minimum allowed verses per page.
pub const MIN_PAGE_SIZE: usize = 1;
/// Maximum allowed verses per page.
pub const MAX_PAGE_SIZE: usize = 50;

pub fn clamp_page_size(page_size: usize) -> usize {
    page_size.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE)
}

/// Page holding the entry at `index`.
pub fn page_for_index(index: usize, page_size: usize) -> usize {
    index / clamp_page_size(page_size)
}

/// Number of pages for `len` entries; an empty list still has one page.
pub fn total_pages(len: usize, page_size: usize) -> usize {
    len.div_ceil(clamp_page_size(page_size)).max(1)
}

/// Index range of the entries shown on `page`, clamped to the list.
pub fn page_bounds(page: usize, len: usize, page_size: usize) -> Range<usize> {
    let size = clamp_page_size(page_size);
    let last_page = total_pages(len, size) - 1;
    let page = page.min(last_page);
    let start = (page * size).min(len);
    let end = (start + size).min(len);
    start..end
}

/// Emits a page recommendation only when the active page actually changes.
#[derive(Debug, Clone)]
pub struct PageFollower {
    page_size: usize,
    last_emitted: Option<usize>,
}

impl PageFollower {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: clamp_page_size(page_size),
            last_emitted: None,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn reset(&mut self) {
        self.last_emitted = None;
    }

    pub fn current(&self) -> Option<usize> {
        self.last_emitted
    }

    /// Returns `Some(page)` when the active index moved onto a different page.
    pub fn follow(&mut self, active_index: usize) -> Option<usize> {
        let page = page_for_index(active_index, self.page_size);
        if self.last_emitted == Some(page) {
            return None;
        }
        debug!(active_index, page, "Page follow recommendation");
        self.last_emitted = Some(page);
        Some(page)
    }
}
