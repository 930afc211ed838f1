use serde::{Deserialize, Serialize};

const DEFAULT_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 100;

/// `?page=&limit=` query parameters shared by every listing endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageParams {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.limit()
    }
}

/// Pagination metadata returned alongside every listed collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageMeta {
    pub current_page: i64,
    pub total_pages: i64,
    pub total_items: i64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl PageMeta {
    pub fn new(params: &PageParams, total_items: i64) -> Self {
        let page = params.page();
        let limit = params.limit();
        let total_pages = if total_items == 0 {
            0
        } else {
            (total_items + limit - 1) / limit
        };

        Self {
            current_page: page,
            total_pages,
            total_items,
            has_next_page: page < total_pages,
            has_prev_page: page > 1,
        }
    }
}
