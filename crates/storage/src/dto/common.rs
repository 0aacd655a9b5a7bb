use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Largest page a standings list may return. Big enough for a whole fleet.
pub const MAX_PAGE_SIZE: u32 = 500;

/// Page through a standings table in rank order.
#[derive(Debug, Clone, Deserialize, IntoParams, ToSchema)]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: u32,
    /// Rows per page; defaults to a full results sheet.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    100
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}

impl PaginationParams {
    pub fn validate(&self) -> Result<(), String> {
        if self.page < 1 {
            return Err("page must be >= 1".to_string());
        }
        if self.page_size < 1 || self.page_size > MAX_PAGE_SIZE {
            return Err(format!("page_size must be between 1 and {}", MAX_PAGE_SIZE));
        }
        Ok(())
    }

    /// Row offset as bound into `OFFSET`.
    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.page_size)
    }

    /// Row count as bound into `LIMIT`.
    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaginationMeta {
    pub page: u32,
    pub page_size: u32,
    /// Standings rows stored for the division.
    pub total_items: i64,
    pub total_pages: u32,
}

impl PaginationMeta {
    pub fn new(params: &PaginationParams, total_items: i64) -> Self {
        let total = total_items.max(0) as u64;
        let total_pages = total.div_ceil(u64::from(params.page_size.max(1))) as u32;
        Self {
            page: params.page,
            page_size: params.page_size,
            total_items,
            total_pages,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, params: &PaginationParams, total_items: i64) -> Self {
        Self {
            data,
            pagination: PaginationMeta::new(params, total_items),
        }
    }
}
