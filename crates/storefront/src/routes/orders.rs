//! Customer order route handlers.

use axum::{
    extract::State,
    http::StatusCode,
};
use tracing::instrument;

use solemate_core::OrderId;

use crate::error::{ApiJson, ApiPath, ApiQuery, ApiResponse, Result};
use crate::middleware::RequireAuth;
use crate::models::{Order, Page, PageRequest, PlaceOrder};
use crate::services::{CheckoutService, OrderService};
use crate::state::AppState;

/// The user's orders, newest first.
///
/// GET /api/orders
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiQuery(page): ApiQuery<PageRequest>,
) -> Result<ApiResponse<Page<Order>>> {
    let orders = OrderService::new(state.pool())
        .list_mine(&user, page.into())
        .await?;
    Ok(ApiResponse::ok(orders))
}

/// Place an order from the user's cart.
///
/// POST /api/orders
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn place(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<PlaceOrder>,
) -> Result<(StatusCode, ApiResponse<Order>)> {
    let order = CheckoutService::new(state.pool(), state.pricing(), state.catalog())
        .place(user.id, body)
        .await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(order)))
}

/// One of the user's orders. Admins may view any order.
///
/// GET /api/orders/{id}
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<ApiResponse<Order>> {
    let order = OrderService::new(state.pool()).get_for(&user, id).await?;
    Ok(ApiResponse::ok(order))
}
