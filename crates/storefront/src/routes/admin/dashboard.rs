//! Admin dashboard.

use axum::extract::State;
use serde::Serialize;
use tracing::instrument;

use solemate_core::{OrderStatus, Price};

use crate::db::{OrderRepository, ProductRepository};
use crate::error::{ApiResponse, Result};
use crate::middleware::RequireAdmin;
use crate::models::{LowStock, Order, OrderFilter, Pagination};
use crate::state::AppState;

/// Sizes with this many units or fewer are reported as low on stock.
pub const LOW_STOCK_THRESHOLD: u32 = 3;

/// Number of recent orders shown.
const RECENT_ORDERS: u32 = 5;

/// Orders in one status.
#[derive(Debug, Serialize)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: u64,
}

/// Dashboard summary.
#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub orders_by_status: Vec<StatusCount>,
    pub total_orders: u64,
    /// Sum of order totals, cancelled orders excluded.
    pub revenue: Price,
    pub active_products: u64,
    pub low_stock: Vec<LowStock>,
    pub recent_orders: Vec<Order>,
}

/// GET /api/admin/dashboard
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> Result<ApiResponse<Dashboard>> {
    let orders = OrderRepository::new(state.pool());
    let products = ProductRepository::new(state.pool());

    let orders_by_status: Vec<StatusCount> = orders
        .status_counts()
        .await?
        .into_iter()
        .map(|(status, count)| StatusCount { status, count })
        .collect();
    let total_orders = orders_by_status.iter().map(|s| s.count).sum();

    let (recent_orders, _) = orders
        .list(
            OrderFilter::default(),
            Pagination {
                page: 1,
                limit: RECENT_ORDERS,
            },
        )
        .await?;

    Ok(ApiResponse::ok(Dashboard {
        orders_by_status,
        total_orders,
        revenue: orders.revenue().await?,
        active_products: products.count_active().await?,
        low_stock: products.low_stock(LOW_STOCK_THRESHOLD).await?,
        recent_orders,
    }))
}
