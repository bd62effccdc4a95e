//! Cart route handlers.
//!
//! The cart belongs to the logged-in user. Guest carts live on the client
//! and are merged with `POST /api/cart/sync` after login.

use axum::extract::State;
use serde::Serialize;
use tracing::instrument;

use crate::error::{ApiJson, ApiResponse, Result, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::models::cart::{AddToCart, RemoveCartLine, SyncCart, SyncOutcome, UpdateCartLine};
use crate::models::CartView;
use crate::services::CartService;
use crate::state::AppState;

/// Body of `GET /api/cart/count`.
#[derive(Debug, Serialize)]
pub struct CartCount {
    pub count: u32,
}

/// GET /api/cart
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<ApiResponse<CartView>> {
    let cart = CartService::new(state.pool(), state.pricing()).view(user.id).await?;
    Ok(ApiResponse::ok(cart))
}

/// GET /api/cart/count
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn count(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<ApiResponse<CartCount>> {
    let count = CartService::new(state.pool(), state.pricing()).count(user.id).await?;
    Ok(ApiResponse::ok(CartCount { count }))
}

/// POST /api/cart/add
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<AddToCart>,
) -> Result<ApiResponse<CartView>> {
    let cart = CartService::new(state.pool(), state.pricing())
        .add(user.id, &body)
        .await?;
    let product_id = body.product_id.to_string();
    add_breadcrumb(
        "cart",
        "Added to cart",
        Some(&[("product_id", product_id.as_str()), ("size", body.size.as_str())]),
    );
    Ok(ApiResponse::ok(cart))
}

/// POST /api/cart/update
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<UpdateCartLine>,
) -> Result<ApiResponse<CartView>> {
    let cart = CartService::new(state.pool(), state.pricing())
        .update(user.id, &body)
        .await?;
    Ok(ApiResponse::ok(cart))
}

/// POST /api/cart/remove
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<RemoveCartLine>,
) -> Result<ApiResponse<CartView>> {
    let cart = CartService::new(state.pool(), state.pricing())
        .remove(user.id, &body)
        .await?;
    Ok(ApiResponse::ok(cart))
}

/// DELETE /api/cart
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn clear(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<ApiResponse<CartView>> {
    let cart = CartService::new(state.pool(), state.pricing()).clear(user.id).await?;
    Ok(ApiResponse::ok(cart))
}

/// Merge the client-side guest cart into the user's cart.
///
/// POST /api/cart/sync
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn sync(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<SyncCart>,
) -> Result<ApiResponse<SyncOutcome>> {
    let outcome = CartService::new(state.pool(), state.pricing())
        .sync(user.id, &body)
        .await?;
    Ok(ApiResponse::ok(outcome))
}
