//! List pagination: query parameters in, response envelope out.

use serde::{Deserialize, Serialize};

use crate::config::PaginationConfig;
use portcullis_core::store::{Page, PageResult};

/// Pagination query parameters, both optional.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl PageQuery {
    /// Resolve to a concrete page. A missing page means the first, a missing
    /// size means the default, and an oversized request is clamped rather
    /// than rejected.
    pub fn resolve(&self, bounds: PaginationConfig) -> Page {
        let size = self
            .page_size
            .unwrap_or(bounds.default_page_size)
            .clamp(1, bounds.max_page_size);
        Page::new(self.page.unwrap_or(1), size)
    }
}

/// The envelope every list endpoint returns.
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total_count: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> PaginatedResponse<T> {
    pub fn new(result: PageResult<T>, page: Page) -> Self {
        let has_next = page.offset() + (result.items.len() as u64) < result.total;
        Self {
            data: result.items,
            page: page.number,
            page_size: page.size,
            total_count: result.total,
            has_next,
            has_prev: page.number > 1,
        }
    }
}
