//! Catalog reads with an in-memory cache.
//!
//! Product detail, related products and unsearched listing pages are cached
//! with `moka` (5-minute TTL). Admin writes and order placement call
//! [`Catalog::invalidate_all`] so stock and prices never lag by more than a
//! request.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use tracing::{debug, instrument};

use solemate_core::ProductId;

use crate::db::{ProductRepository, RepositoryError};
use crate::models::{Page, Pagination, Product, ProductFilter};

/// Number of related products shown on a product page.
pub const RELATED_LIMIT: u32 = 4;

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
enum CacheKey {
    Product(String),
    Related(ProductId),
    Listing(String),
}

#[derive(Debug, Clone)]
enum CacheValue {
    Product(Arc<Product>),
    Products(Arc<Vec<Product>>),
    Page(Arc<Page<Product>>),
}

/// How a product is addressed in a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductRef<'a> {
    Id(ProductId),
    Slug(&'a str),
}

impl<'a> ProductRef<'a> {
    /// Numeric path segments are IDs, anything else is a slug.
    #[must_use]
    pub fn parse(segment: &'a str) -> Self {
        segment
            .parse::<i32>()
            .map_or(Self::Slug(segment), |id| Self::Id(ProductId::new(id)))
    }
}

/// Cached, storefront-facing catalog.
#[derive(Clone)]
pub struct Catalog {
    cache: Cache<CacheKey, CacheValue>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    /// Create a catalog with an empty cache.
    #[must_use]
    pub fn new() -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();
        Self { cache }
    }

    /// Get an active product by ID or slug.
    ///
    /// Inactive products are reported as missing.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the database query fails.
    #[instrument(skip(self, pool))]
    pub async fn product(
        &self,
        pool: &PgPool,
        id_or_slug: &str,
    ) -> Result<Option<Arc<Product>>, RepositoryError> {
        let key = CacheKey::Product(id_or_slug.to_owned());
        if let Some(CacheValue::Product(product)) = self.cache.get(&key).await {
            debug!("Cache hit for product");
            return Ok(Some(product));
        }

        let repo = ProductRepository::new(pool);
        let product = match ProductRef::parse(id_or_slug) {
            ProductRef::Id(id) => repo.get_by_id(id).await?,
            ProductRef::Slug(slug) => repo.get_by_slug(slug).await?,
        };
        let Some(product) = product.filter(|p| p.is_active) else {
            return Ok(None);
        };

        let product = Arc::new(product);
        self.cache
            .insert(key, CacheValue::Product(Arc::clone(&product)))
            .await;
        Ok(Some(product))
    }

    /// Active products in the same category as `product`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the database query fails.
    #[instrument(skip(self, pool, product), fields(product_id = %product.id))]
    pub async fn related(
        &self,
        pool: &PgPool,
        product: &Product,
    ) -> Result<Arc<Vec<Product>>, RepositoryError> {
        let key = CacheKey::Related(product.id);
        if let Some(CacheValue::Products(products)) = self.cache.get(&key).await {
            debug!("Cache hit for related products");
            return Ok(products);
        }

        let products = Arc::new(
            ProductRepository::new(pool)
                .related(product, RELATED_LIMIT)
                .await?,
        );
        self.cache
            .insert(key, CacheValue::Products(Arc::clone(&products)))
            .await;
        Ok(products)
    }

    /// One page of active products.
    ///
    /// Searches are not cached.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the database query fails.
    #[instrument(skip(self, pool, filter))]
    pub async fn list(
        &self,
        pool: &PgPool,
        filter: &ProductFilter,
        pagination: Pagination,
    ) -> Result<Arc<Page<Product>>, RepositoryError> {
        let cacheable = filter.search_term().is_none() && !filter.include_inactive;
        let key = CacheKey::Listing(format!("{filter:?}:{pagination:?}"));
        if cacheable && let Some(CacheValue::Page(page)) = self.cache.get(&key).await {
            debug!("Cache hit for product listing");
            return Ok(page);
        }

        let (items, total) = ProductRepository::new(pool).list(filter, pagination).await?;
        let page = Arc::new(Page::new(items, total, pagination));

        if cacheable {
            self.cache
                .insert(key, CacheValue::Page(Arc::clone(&page)))
                .await;
        }
        Ok(page)
    }

    /// Invalidate all cached data.
    pub async fn invalidate_all(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }
}
