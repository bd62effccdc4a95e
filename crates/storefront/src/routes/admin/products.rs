//! Admin product management.
//!
//! Every write clears the catalog cache.

use axum::{
    extract::State,
    http::StatusCode,
};
use tracing::instrument;

use solemate_core::ProductId;

use crate::db::ProductRepository;
use crate::error::{ApiJson, ApiPath, ApiQuery, ApiResponse, AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{Page, PageRequest, Product, ProductFilter, ProductInput, ProductPatch};
use crate::state::AppState;

/// All products, inactive included.
///
/// GET /api/admin/products
#[instrument(skip(state, _admin))]
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    ApiQuery(mut filter): ApiQuery<ProductFilter>,
    ApiQuery(page): ApiQuery<PageRequest>,
) -> Result<ApiResponse<Page<Product>>> {
    filter.include_inactive = true;
    let pagination = page.into();
    let (items, total) = ProductRepository::new(state.pool())
        .list(&filter, pagination)
        .await?;
    Ok(ApiResponse::ok(Page::new(items, total, pagination)))
}

/// GET /api/admin/products/{id}
#[instrument(skip(state, _admin))]
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<ApiResponse<Product>> {
    let product = get(&state, id).await?;
    Ok(ApiResponse::ok(product))
}

/// POST /api/admin/products
#[instrument(skip(state, admin, input), fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(input): ApiJson<ProductInput>,
) -> Result<(StatusCode, ApiResponse<Product>)> {
    let record = input.validate()?;
    let product = ProductRepository::new(state.pool()).create(&record).await?;
    state.catalog().invalidate_all().await;

    tracing::info!(product_id = %product.id, slug = %product.slug, "Product created");
    Ok((StatusCode::CREATED, ApiResponse::ok(product)))
}

/// PATCH /api/admin/products/{id}
#[instrument(skip(state, admin, patch), fields(admin_id = %admin.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<ProductId>,
    ApiJson(patch): ApiJson<ProductPatch>,
) -> Result<ApiResponse<Product>> {
    let current = get(&state, id).await?;
    let record = patch.apply(ProductInput::from(&current)).validate()?;
    let product = ProductRepository::new(state.pool())
        .update(id, &record)
        .await?;
    state.catalog().invalidate_all().await;

    tracing::info!(product_id = %product.id, "Product updated");
    Ok(ApiResponse::ok(product))
}

/// Deactivate a product. Orders keep their snapshots.
///
/// DELETE /api/admin/products/{id}
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn deactivate(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<ApiResponse<Product>> {
    let product = ProductRepository::new(state.pool()).deactivate(id).await?;
    state.catalog().invalidate_all().await;

    tracing::info!(product_id = %product.id, "Product deactivated");
    Ok(ApiResponse::ok(product))
}

async fn get(state: &AppState, id: ProductId) -> Result<Product> {
    ProductRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
}
