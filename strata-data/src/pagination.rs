use serde::Deserialize;

use crate::query::{QueryBuilder, MAX_ROW_COUNT};

pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// A page window over an ordered result set.
///
/// `page` and `page_size` are clamped to at least 1. With
/// `fetch_one_more`, one extra row beyond the page is requested so callers
/// can tell whether a next page exists without a count query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "PaginationParams")]
pub struct Pagination {
    page: u64,
    page_size: u64,
    fetch_one_more: bool,
}

impl Pagination {
    pub fn new(page: u64, page_size: u64) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.max(1),
            fetch_one_more: false,
        }
    }

    pub fn with_page(self, page: u64) -> Self {
        Self {
            page: page.max(1),
            ..self
        }
    }

    pub fn with_page_size(self, page_size: u64) -> Self {
        Self {
            page_size: page_size.max(1),
            ..self
        }
    }

    pub fn with_fetch_one_more(self, fetch_one_more: bool) -> Self {
        Self {
            fetch_one_more,
            ..self
        }
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn fetch_one_more(&self) -> bool {
        self.fetch_one_more
    }

    /// Rows skipped before the page, capped at [`MAX_ROW_COUNT`].
    pub fn offset(&self) -> u64 {
        (self.page - 1)
            .saturating_mul(self.page_size)
            .min(MAX_ROW_COUNT)
    }

    /// Rows requested, capped at [`MAX_ROW_COUNT`].
    pub fn limit(&self) -> u64 {
        let limit = if self.fetch_one_more {
            self.page_size.saturating_add(1)
        } else {
            self.page_size
        };
        limit.min(MAX_ROW_COUNT)
    }

    pub fn apply(&self, query: QueryBuilder) -> QueryBuilder {
        query.offset(self.offset()).limit(self.limit())
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}

impl std::fmt::Display for Pagination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Pagination(page={}, page_size={}, fetch_one_more={})",
            self.page, self.page_size, self.fetch_one_more
        )
    }
}

/// Raw pagination parameters, e.g. from a query string, before clamping.
#[derive(Debug, Clone, Deserialize)]
struct PaginationParams {
    #[serde(default = "default_page")]
    page: u64,
    #[serde(default = "default_page_size")]
    page_size: u64,
}

fn default_page() -> u64 {
    1
}

fn default_page_size() -> u64 {
    DEFAULT_PAGE_SIZE
}

impl From<PaginationParams> for Pagination {
    fn from(params: PaginationParams) -> Self {
        Pagination::new(params.page, params.page_size)
    }
}
