//! Search result pages.

use krbdir_core::Principal;
use serde::Serialize;
use std::ops::Range;

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchPage {
    /// Fully fetched principals in match order.
    pub principals: Vec<Principal>,
    /// Matches after this page that were not returned.
    pub remaining: usize,
}

/// The slice of a match list selected by a page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    /// Index of the first match in the page.
    pub offset: usize,
    /// Number of matches in the page.
    pub len: usize,
    /// Matches after the page.
    pub remaining: usize,
}

impl PageWindow {
    /// Index range of the page within the match list.
    #[must_use]
    pub const fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.len
    }
}

/// Selects the page of `total` matches starting at `offset`.
///
/// A `page_size` of 0 means unbounded. Returns `None` when `offset` lies beyond the last match;
/// an offset exactly at the end yields an empty window.
#[must_use]
pub fn paginate(total: usize, page_size: usize, offset: usize) -> Option<PageWindow> {
    let available = total.checked_sub(offset)?;
    let len = if page_size == 0 {
        available
    } else {
        page_size.min(available)
    };
    Some(PageWindow {
        offset,
        len,
        remaining: available - len,
    })
}
