//! Pagination for the listing operations.
//!
//! Callers page either with a 1-based `page` + `size` pair or with an
//! inclusive `start`/`end` index pair. Both resolve to a [`PageWindow`]
//! (`offset`, `limit`) that the release index applies.

use serde::{Deserialize, Serialize};

/// Page size used when the caller does not give one.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// A resolved `(offset, limit)` window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageWindow {
    pub offset: usize,
    pub limit: usize,
}

impl PageWindow {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }

    /// Apply the window to an already ordered sequence.
    pub fn slice<T>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset)
            .take(self.limit)
            .collect()
    }
}

impl Default for PageWindow {
    fn default() -> Self {
        Self::new(0, DEFAULT_PAGE_SIZE)
    }
}

/// How the caller asked to page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageRequest {
    /// 1-based page number and page size.
    Page { page: usize, size: usize },
    /// Inclusive start and end indices.
    Range { start: usize, end: usize },
}

impl PageRequest {
    /// Resolve into an offset/limit window.
    ///
    /// Page numbers below 1 are treated as 1 and a zero size as the default.
    /// An `end` before `start` yields a single-item window at `start`.
    pub fn window(&self) -> PageWindow {
        match *self {
            Self::Page { page, size } => {
                let size = if size == 0 { DEFAULT_PAGE_SIZE } else { size };
                let page = page.max(1);
                PageWindow::new((page - 1).saturating_mul(size), size)
            }
            Self::Range { start, end } => {
                let limit = if end < start {
                    1
                } else {
                    end.saturating_sub(start).saturating_add(1)
                };
                PageWindow::new(start, limit)
            }
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::Page {
            page: 1,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Raw pagination parameters, e.g. from a query string or CLI flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageParams {
    pub page: Option<usize>,
    pub size: Option<usize>,
    pub start: Option<usize>,
    pub end: Option<usize>,
}

impl PageParams {
    /// `start`/`end` win when either is present; otherwise `page`/`size`.
    pub fn into_request(self, default_size: usize) -> PageRequest {
        match (self.start, self.end) {
            (None, None) => PageRequest::Page {
                page: self.page.unwrap_or(1),
                size: self.size.unwrap_or(default_size),
            },
            (start, end) => {
                let start = start.unwrap_or(0);
                let end = end.unwrap_or_else(|| start.saturating_add(default_size.max(1) - 1));
                PageRequest::Range { start, end }
            }
        }
    }
}

/// One page of results plus the total count across all pages.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub total: u64,
    pub offset: usize,
    pub limit: usize,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(total: u64, window: PageWindow, items: Vec<T>) -> Self {
        Self {
            total,
            offset: window.offset,
            limit: window.limit,
            items,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            total: self.total,
            offset: self.offset,
            limit: self.limit,
            items: self.items.into_iter().map(f).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn first_page_default() {
        assert_eq!(PageRequest::default().window(), PageWindow::new(0, 20));
    }

    #[test]
    fn page_to_offset() {
        let w = PageRequest::Page { page: 3, size: 10 }.window();
        assert_eq!(w, PageWindow::new(20, 10));
    }

    #[test]
    fn page_zero_is_first_page() {
        let w = PageRequest::Page { page: 0, size: 5 }.window();
        assert_eq!(w, PageWindow::new(0, 5));
    }

    #[test]
    fn inclusive_range() {
        let w = PageRequest::Range { start: 5, end: 9 }.window();
        assert_eq!(w, PageWindow::new(5, 5));
    }

    #[test]
    fn inverted_range_is_single_item() {
        let w = PageRequest::Range { start: 7, end: 2 }.window();
        assert_eq!(w, PageWindow::new(7, 1));
    }

    #[test]
    fn params_prefer_range() {
        let params = PageParams {
            page: Some(4),
            size: Some(3),
            start: Some(2),
            end: Some(4),
        };
        assert_eq!(
            params.into_request(DEFAULT_PAGE_SIZE),
            PageRequest::Range { start: 2, end: 4 }
        );
    }

    #[test]
    fn params_default_to_first_page() {
        assert_eq!(
            PageParams::default().into_request(DEFAULT_PAGE_SIZE),
            PageRequest::Page { page: 1, size: 20 }
        );
    }

    #[test]
    fn params_start_only_uses_default_size() {
        let params = PageParams {
            start: Some(10),
            ..Default::default()
        };
        assert_eq!(
            params.into_request(20).window(),
            PageWindow::new(10, 20)
        );
    }

    #[test]
    fn slice_applies_window() {
        let items: Vec<u32> = (0..10).collect();
        assert_eq!(PageWindow::new(8, 5).slice(items.clone()), vec![8, 9]);
        assert!(PageWindow::new(20, 5).slice(items).is_empty());
    }

    #[test]
    fn extreme_bounds_saturate() {
        let full = PageParams {
            start: Some(0),
            end: Some(usize::MAX),
            ..Default::default()
        };
        assert_eq!(
            full.into_request(20).window(),
            PageWindow::new(0, usize::MAX)
        );

        let tail = PageParams {
            start: Some(usize::MAX),
            ..Default::default()
        };
        assert_eq!(
            tail.into_request(20),
            PageRequest::Range {
                start: usize::MAX,
                end: usize::MAX
            }
        );
        assert_eq!(
            tail.into_request(20).window(),
            PageWindow::new(usize::MAX, 1)
        );
        assert!(PageWindow::new(usize::MAX, 1).slice(0..10).is_empty());
    }

    proptest! {
        #[test]
        fn page_windows_tile_without_gaps(page in 1usize..1000, size in 1usize..500) {
            let this = PageRequest::Page { page, size }.window();
            let next = PageRequest::Page { page: page + 1, size }.window();
            prop_assert_eq!(this.offset + this.limit, next.offset);
            prop_assert_eq!(this.limit, size);
        }

        #[test]
        fn range_limit_is_never_zero(start in 0usize..10_000, end in 0usize..10_000) {
            let w = PageRequest::Range { start, end }.window();
            prop_assert!(w.limit >= 1);
            prop_assert_eq!(w.offset, start);
            if end >= start {
                prop_assert_eq!(w.limit, end - start + 1);
            }
        }

        #[test]
        fn range_near_usize_max_never_wraps(start in any::<usize>(), end in any::<usize>()) {
            let w = PageRequest::Range { start, end }.window();
            prop_assert!(w.limit >= 1);
            prop_assert_eq!(w.offset, start);
        }
    }
}
