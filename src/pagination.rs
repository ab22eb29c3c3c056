//! Page/limit/all resolution and the "Showing a-b of N" display line.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 100;
pub const MAX_LIMIT: u32 = 500;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaginationError {
    #[error("limit {limit} exceeds the maximum of {max}")]
    LimitTooLarge { limit: u32, max: u32 },
}

/// Pagination as requested on the command line. Zero means "not set".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationOptions {
    pub page: u32,
    pub limit: u32,
    pub all: bool,
}

impl PaginationOptions {
    pub fn new(page: u32, limit: u32, all: bool) -> Self {
        Self { page, limit, all }
    }

    /// `all` wins over page and limit; unset values take the defaults.
    pub fn resolve(&self) -> Result<ResolvedPagination, PaginationError> {
        if self.all {
            return Ok(ResolvedPagination {
                page: DEFAULT_PAGE,
                limit: MAX_LIMIT,
                all: true,
            });
        }
        if self.limit > MAX_LIMIT {
            return Err(PaginationError::LimitTooLarge {
                limit: self.limit,
                max: MAX_LIMIT,
            });
        }
        Ok(ResolvedPagination {
            page: if self.page == 0 { DEFAULT_PAGE } else { self.page },
            limit: if self.limit == 0 { DEFAULT_LIMIT } else { self.limit },
            all: false,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedPagination {
    pub page: u32,
    pub limit: u32,
    pub all: bool,
}

impl ResolvedPagination {
    /// Items to skip before this page.
    pub fn skip(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaginationInfo {
    pub page: u32,
    pub limit: u32,
    pub all: bool,
    pub total: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl PaginationInfo {
    pub fn new(resolved: ResolvedPagination, total: u64) -> Self {
        let limit = u64::from(resolved.limit.max(1));
        let total_pages = total.div_ceil(limit);
        let page = u64::from(resolved.page);
        Self {
            page: resolved.page,
            limit: resolved.limit,
            all: resolved.all,
            total,
            total_pages,
            has_next: page < total_pages,
            has_previous: page > 1,
        }
    }

    pub fn display(&self) -> String {
        if self.total == 0 {
            return "No items found".to_string();
        }
        if self.all && self.total_pages <= 1 {
            return format!("Showing all {} items", self.total);
        }

        let start = u64::from(self.page.saturating_sub(1)) * u64::from(self.limit) + 1;
        if start > self.total {
            return format!("No items on page {} ({} items total)", self.page, self.total);
        }
        let end = (start + u64::from(self.limit) - 1).min(self.total);
        format!(
            "Showing {}-{} of {} items (page {} of {})",
            start, end, self.total, self.page, self.total_pages
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_third_page_of_twenty_five() {
        let resolved = PaginationOptions::new(3, 10, false).resolve().unwrap();
        assert_eq!(resolved.skip(), 20);

        let info = PaginationInfo::new(resolved, 25);
        assert_eq!(info.display(), "Showing 21-25 of 25 items (page 3 of 3)");
        assert!(!info.has_next);
        assert!(info.has_previous);
    }

    #[test]
    fn test_defaults_and_all() {
        let resolved = PaginationOptions::default().resolve().unwrap();
        assert_eq!((resolved.page, resolved.limit), (DEFAULT_PAGE, DEFAULT_LIMIT));

        let resolved = PaginationOptions::new(7, 20, true).resolve().unwrap();
        assert_eq!((resolved.page, resolved.limit), (1, MAX_LIMIT));
        assert_eq!(resolved.skip(), 0);
        assert_eq!(
            PaginationInfo::new(resolved, 42).display(),
            "Showing all 42 items"
        );
    }

    #[test]
    fn test_all_with_more_than_one_page() {
        let resolved = PaginationOptions::new(0, 0, true).resolve().unwrap();
        let info = PaginationInfo::new(resolved, 1200);
        assert_eq!(info.total_pages, 3);
        assert_eq!(info.display(), "Showing 1-500 of 1200 items (page 1 of 3)");
    }

    #[test]
    fn test_limit_too_large() {
        assert_eq!(
            PaginationOptions::new(1, 501, false).resolve(),
            Err(PaginationError::LimitTooLarge {
                limit: 501,
                max: MAX_LIMIT
            })
        );
    }

    #[test]
    fn test_empty_and_past_the_end() {
        let resolved = PaginationOptions::new(2, 10, false).resolve().unwrap();
        assert_eq!(PaginationInfo::new(resolved, 0).display(), "No items found");
        assert_eq!(
            PaginationInfo::new(resolved, 5).display(),
            "No items on page 2 (5 items total)"
        );
    }

    proptest! {
        #[test]
        fn prop_skip_matches_page_and_limit(page in 1u32..10_000, limit in 1u32..=MAX_LIMIT) {
            let resolved = PaginationOptions::new(page, limit, false).resolve().unwrap();
            prop_assert_eq!(resolved.page, page);
            prop_assert_eq!(resolved.limit, limit);
            prop_assert_eq!(resolved.skip(), u64::from(page - 1) * u64::from(limit));
        }

        #[test]
        fn prop_all_ignores_page_and_limit(page in 0u32..10_000, limit in 0u32..10_000) {
            let resolved = PaginationOptions::new(page, limit, true).resolve().unwrap();
            prop_assert_eq!((resolved.page, resolved.limit), (1, MAX_LIMIT));
        }
    }
}
