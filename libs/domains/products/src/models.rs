use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Upper bound for `size` on the paged listing
pub const MAX_PAGE_SIZE: u64 = 100;

/// Product entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Product {
    /// Identifier chosen by the client
    #[schema(example = 1)]
    pub id: i32,
    #[schema(example = "Keyboard")]
    pub name: String,
}

impl Product {
    pub fn new(id: i32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

fn default_page() -> u64 {
    1
}

fn default_size() -> u64 {
    10
}

/// 1-based page request
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate, IntoParams, ToSchema,
)]
#[into_params(parameter_in = Query)]
pub struct PageRequest {
    /// Page number, starting at 1
    #[serde(default = "default_page")]
    #[validate(range(min = 1))]
    #[param(default = 1, minimum = 1)]
    pub page: u64,

    /// Items per page
    #[serde(default = "default_size")]
    #[validate(range(min = 1, max = MAX_PAGE_SIZE))]
    #[param(default = 10, minimum = 1, maximum = 100)]
    pub size: u64,
}

impl PageRequest {
    pub fn new(page: u64, size: u64) -> Self {
        Self { page, size }
    }

    /// Number of items before this page
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(default_page(), default_size())
    }
}

/// One page of an id-ordered listing plus paging metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub size: u64,
    pub total_items: u64,
    pub total_pages: u64,
    pub has_previous_page: bool,
    pub has_next_page: bool,
}

impl<T> Page<T> {
    /// A page past the end keeps its totals and has no items.
    pub fn new(items: Vec<T>, request: &PageRequest, total_items: u64) -> Self {
        let total_pages = total_items.div_ceil(request.size.max(1));

        Self {
            items,
            page: request.page,
            size: request.size,
            total_items,
            total_pages,
            has_previous_page: request.page > 1,
            has_next_page: request.page < total_pages,
        }
    }
}
