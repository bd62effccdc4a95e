//! Domain models for the storefront.
//!
//! These are validated domain objects, separate from the database row types
//! in [`crate::db`].

pub mod cart;
pub mod order;
pub mod product;
pub mod session;
pub mod user;

use serde::{Deserialize, Serialize};

pub use cart::{
    AddToCart, CartItemView, CartView, GuestCartLine, RemoveCartLine, SkippedLine, SyncCart,
    SyncOutcome, UpdateCartLine,
};
pub use order::{Order, OrderFilter, OrderItem, PlaceOrder, ShippingAddress, StatusUpdate};
pub use product::{
    LowStock, Product, ProductFilter, ProductInput, ProductPatch, ProductRecord,
    ProductSort,
};
pub use session::{CurrentUser, keys as session_keys};
pub use user::User;

/// Default page size for listings.
pub const DEFAULT_PAGE_SIZE: u32 = 12;
/// Largest page size a client may request.
pub const MAX_PAGE_SIZE: u32 = 48;

/// Page request, as received in a query string.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageRequest {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// A normalized page request: `page >= 1`, `1 <= limit <= 48`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Pagination {
    /// Row offset of the first item on the page.
    #[must_use]
    pub const fn offset(self) -> i64 {
        (self.page as i64 - 1) * self.limit as i64
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl From<PageRequest> for Pagination {
    fn from(req: PageRequest) -> Self {
        Self {
            page: req.page.unwrap_or(1).max(1),
            limit: req.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }
}

/// One page of results plus the total count.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub pages: u64,
}

impl<T> Page<T> {
    #[must_use]
    pub fn new(items: Vec<T>, total: u64, pagination: Pagination) -> Self {
        let limit = u64::from(pagination.limit);
        Self {
            items,
            total,
            page: pagination.page,
            limit: pagination.limit,
            pages: total.div_ceil(limit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_clamps() {
        let p = Pagination::from(PageRequest {
            page: Some(0),
            limit: Some(500),
        });
        assert_eq!(p, Pagination { page: 1, limit: 48 });

        let p = Pagination::from(PageRequest {
            page: None,
            limit: Some(0),
        });
        assert_eq!(p.limit, 1);
        assert_eq!(Pagination::from(PageRequest::default()).limit, 12);
    }

    #[test]
    fn test_offset() {
        assert_eq!(Pagination { page: 3, limit: 12 }.offset(), 24);
    }

    #[test]
    fn test_page_count_rounds_up() {
        let page = Page::new(vec![1, 2], 25, Pagination { page: 1, limit: 12 });
        assert_eq!(page.pages, 3);
        let empty: Page<u8> = Page::new(vec![], 0, Pagination::default());
        assert_eq!(empty.pages, 0);
    }
}
