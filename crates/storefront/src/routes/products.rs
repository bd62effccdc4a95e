//! Public catalog route handlers.

use std::sync::Arc;

use axum::extract::State;
use serde::Serialize;
use tracing::instrument;

use crate::db::ProductRepository;
use crate::error::{ApiPath, ApiQuery, ApiResponse, AppError, Result};
use crate::middleware::OptionalAuth;
use crate::models::{CurrentUser, Page, PageRequest, Product, ProductFilter};
use crate::services::catalog::ProductRef;
use crate::state::AppState;

/// Product detail with its related products.
#[derive(Debug, Serialize)]
pub struct ProductDetail {
    pub product: Arc<Product>,
    pub related: Arc<Vec<Product>>,
}

/// List active products.
///
/// GET /api/products?category=&min_price=&max_price=&size=&q=&tag=&on_sale=&sort=&page=&limit=
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    ApiQuery(mut filter): ApiQuery<ProductFilter>,
    ApiQuery(page): ApiQuery<PageRequest>,
) -> Result<ApiResponse<Arc<Page<Product>>>> {
    filter.include_inactive = false;
    let page = state
        .catalog()
        .list(state.pool(), &filter, page.into())
        .await?;
    Ok(ApiResponse::ok(page))
}

/// An active product by numeric ID or slug, with related products.
///
/// Admins can also preview inactive products here.
///
/// GET /api/products/{id_or_slug}
#[instrument(skip(state, viewer))]
pub async fn show(
    State(state): State<AppState>,
    OptionalAuth(viewer): OptionalAuth,
    ApiPath(id_or_slug): ApiPath<String>,
) -> Result<ApiResponse<ProductDetail>> {
    let product = find(&state, &id_or_slug, viewer.as_ref()).await?;
    let related = state.catalog().related(state.pool(), &product).await?;
    Ok(ApiResponse::ok(ProductDetail { product, related }))
}

/// Related products only.
///
/// GET /api/products/{id_or_slug}/related
#[instrument(skip(state))]
pub async fn related(
    State(state): State<AppState>,
    ApiPath(id_or_slug): ApiPath<String>,
) -> Result<ApiResponse<Arc<Vec<Product>>>> {
    let product = find(&state, &id_or_slug, None).await?;
    let related = state.catalog().related(state.pool(), &product).await?;
    Ok(ApiResponse::ok(related))
}

async fn find(
    state: &AppState,
    id_or_slug: &str,
    viewer: Option<&CurrentUser>,
) -> Result<Arc<Product>> {
    if let Some(product) = state.catalog().product(state.pool(), id_or_slug).await? {
        return Ok(product);
    }

    // Inactive products bypass the cache.
    if viewer.is_some_and(|user| user.role.is_admin()) {
        let repo = ProductRepository::new(state.pool());
        let product = match ProductRef::parse(id_or_slug) {
            ProductRef::Id(id) => repo.get_by_id(id).await?,
            ProductRef::Slug(slug) => repo.get_by_slug(slug).await?,
        };
        if let Some(product) = product {
            return Ok(Arc::new(product));
        }
    }

    Err(AppError::NotFound("Product not found".to_string()))
}
