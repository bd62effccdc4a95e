//! Admin order management.

use axum::extract::State;
use tracing::instrument;

use solemate_core::OrderId;

use crate::error::{ApiJson, ApiPath, ApiQuery, ApiResponse, Result};
use crate::middleware::RequireAdmin;
use crate::models::{Order, OrderFilter, Page, PageRequest, StatusUpdate};
use crate::services::OrderService;
use crate::state::AppState;

/// GET /api/admin/orders
#[instrument(skip(state, _admin))]
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    ApiQuery(filter): ApiQuery<OrderFilter>,
    ApiQuery(page): ApiQuery<PageRequest>,
) -> Result<ApiResponse<Page<Order>>> {
    let orders = OrderService::new(state.pool())
        .list(filter, page.into())
        .await?;
    Ok(ApiResponse::ok(orders))
}

/// GET /api/admin/orders/{id}
#[instrument(skip(state, _admin))]
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<ApiResponse<Order>> {
    let order = OrderService::new(state.pool()).get(id).await?;
    Ok(ApiResponse::ok(order))
}

/// Move an order to a given status.
///
/// POST /api/admin/orders/{id}/status
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn set_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<OrderId>,
    ApiJson(body): ApiJson<StatusUpdate>,
) -> Result<ApiResponse<Order>> {
    let order = OrderService::new(state.pool())
        .set_status(id, body.status)
        .await?;
    Ok(ApiResponse::ok(order))
}

/// Move an order to the next status.
///
/// POST /api/admin/orders/{id}/advance
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn advance(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<ApiResponse<Order>> {
    let order = OrderService::new(state.pool()).advance(id).await?;
    Ok(ApiResponse::ok(order))
}

/// POST /api/admin/orders/{id}/mark-paid
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn mark_paid(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<ApiResponse<Order>> {
    let order = OrderService::new(state.pool()).mark_paid(id).await?;
    Ok(ApiResponse::ok(order))
}
