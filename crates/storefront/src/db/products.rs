//! Product repository: catalog queries, admin writes and stock updates.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use solemate_core::{Category, Price, ProductId, Size, Stock};

use super::{RepositoryError, to_i32, to_u64};
use crate::models::product::effective_price;
use crate::models::{LowStock, Pagination, Product, ProductFilter, ProductRecord};

const PRODUCT_COLUMNS: &str = "p.id, p.name, p.slug, p.description, p.price, p.discount_price, \
     p.category, p.images, p.features, p.sizes, p.stock, p.tags, p.badge, p.is_active, \
     p.created_at, p.updated_at";

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    name: String,
    slug: String,
    description: String,
    price: Price,
    discount_price: Option<Price>,
    category: Category,
    images: Vec<String>,
    features: Vec<String>,
    sizes: Vec<String>,
    stock: Option<Json<BTreeMap<Size, u32>>>,
    tags: Vec<String>,
    badge: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let sizes = row
            .sizes
            .iter()
            .map(|s| Size::parse(s))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("product {}: invalid size: {e}", row.id))
            })?;
        let stock = row
            .stock
            .map_or_else(Stock::untracked, |Json(counts)| Stock::tracked(counts));
        let effective = effective_price(row.price, row.discount_price);

        Ok(Self {
            id: ProductId::new(row.id),
            name: row.name,
            slug: row.slug,
            description: row.description,
            price: row.price,
            discount_price: row.discount_price,
            effective_price: effective,
            on_sale: effective < row.price,
            category: row.category,
            images: row.images,
            features: row.features,
            sizes,
            stock,
            tags: row.tags,
            badge: row.badge,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Escape `LIKE` wildcards in user input.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Append the `WHERE` conditions for a filter.
fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) {
    builder.push(" WHERE TRUE");
    if !filter.include_inactive {
        builder.push(" AND p.is_active");
    }
    if let Some(category) = filter.category {
        builder.push(" AND p.category = ").push_bind(category);
    }
    if let Some(min) = filter.min_price {
        builder.push(" AND p.effective_price >= ").push_bind(min);
    }
    if let Some(max) = filter.max_price {
        builder.push(" AND p.effective_price <= ").push_bind(max);
    }
    if let Some(size) = &filter.size {
        builder
            .push(" AND ")
            .push_bind(size.as_str().to_owned())
            .push(" = ANY(p.sizes)");
    }
    if let Some(term) = filter.search_term() {
        let pattern = like_pattern(term);
        builder
            .push(" AND (p.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR p.description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(tag) = filter.tag.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        builder
            .push(" AND ")
            .push_bind(tag.to_lowercase())
            .push(" = ANY(p.tags)");
    }
    match filter.on_sale {
        Some(true) => {
            builder.push(" AND p.effective_price < p.price");
        }
        Some(false) => {
            builder.push(" AND p.effective_price = p.price");
        }
        None => {}
    }
}

/// Decrement a tracked stock count, refusing to go below zero.
///
/// Untracked products (`stock IS NULL`) always succeed and stay untracked.
/// Returns `false` when the product is missing or the count is too low.
pub(crate) async fn decrement_stock(
    conn: &mut PgConnection,
    product_id: ProductId,
    size: &Size,
    quantity: u32,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE shop.product
        SET stock = CASE
            WHEN stock IS NULL THEN NULL
            ELSE jsonb_set(stock, ARRAY[$2], to_jsonb(COALESCE((stock ->> $2)::int, 0) - $3))
        END
        WHERE id = $1
          AND (stock IS NULL OR COALESCE((stock ->> $2)::int, 0) >= $3)
        ",
    )
    .bind(product_id)
    .bind(size.as_str())
    .bind(to_i32(quantity)?)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List one page of products matching a filter, with the total match count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(
        &self,
        filter: &ProductFilter,
        pagination: Pagination,
    ) -> Result<(Vec<Product>, u64), RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM shop.product p");
        push_filters(&mut count, filter);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(self.pool)
            .await?;

        let mut select =
            QueryBuilder::<Postgres>::new(format!("SELECT {PRODUCT_COLUMNS} FROM shop.product p"));
        push_filters(&mut select, filter);
        select
            .push(" ORDER BY ")
            .push(filter.sort.order_by())
            .push(" LIMIT ")
            .push_bind(i64::from(pagination.limit))
            .push(" OFFSET ")
            .push_bind(pagination.offset());

        let rows = select
            .build_query_as::<ProductRow>()
            .fetch_all(self.pool)
            .await?;
        let products = rows
            .into_iter()
            .map(Product::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((products, to_u64(total)))
    }

    /// Get a product by ID, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.product p WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    /// Get a product by slug, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.product p WHERE p.slug = $1"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    /// Get all products with the given IDs. Missing IDs are skipped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();

        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.product p WHERE p.id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Product::try_from).collect()
    }

    /// Active products in the same category, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn related(
        &self,
        product: &Product,
        limit: u32,
    ) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            SELECT {PRODUCT_COLUMNS} FROM shop.product p
            WHERE p.is_active AND p.category = $1 AND p.id <> $2
            ORDER BY p.created_at DESC, p.id DESC
            LIMIT $3
            "
        ))
        .bind(product.category)
        .bind(product.id)
        .bind(i64::from(limit))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Product::try_from).collect()
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(&self, record: &ProductRecord) -> Result<Product, RepositoryError> {
        let row = bind_record(
            sqlx::query_as::<_, ProductRow>(&format!(
                r"
                INSERT INTO shop.product AS p
                    (name, slug, description, price, discount_price, category, images,
                     features, sizes, stock, tags, badge, is_active)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                RETURNING {PRODUCT_COLUMNS}
                "
            )),
            record,
        )
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "slug already in use"))?;

        Product::try_from(row)
    }

    /// Replace every editable field of a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Conflict` if the new slug is taken.
    pub async fn update(
        &self,
        id: ProductId,
        record: &ProductRecord,
    ) -> Result<Product, RepositoryError> {
        let row = bind_record(
            sqlx::query_as::<_, ProductRow>(&format!(
                r"
                UPDATE shop.product AS p SET
                    name = $1, slug = $2, description = $3, price = $4, discount_price = $5,
                    category = $6, images = $7, features = $8, sizes = $9, stock = $10,
                    tags = $11, badge = $12, is_active = $13
                WHERE p.id = $14
                RETURNING {PRODUCT_COLUMNS}
                "
            )),
            record,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "slug already in use"))?
        .ok_or(RepositoryError::NotFound)?;

        Product::try_from(row)
    }

    /// Insert a product or overwrite the one with the same slug.
    ///
    /// Returns the product and whether it was newly created.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert_by_slug(
        &self,
        record: &ProductRecord,
    ) -> Result<(Product, bool), RepositoryError> {
        #[derive(sqlx::FromRow)]
        struct UpsertRow {
            #[sqlx(flatten)]
            product: ProductRow,
            inserted: bool,
        }

        let row = bind_record(
            sqlx::query_as::<_, UpsertRow>(&format!(
                r"
                INSERT INTO shop.product AS p
                    (name, slug, description, price, discount_price, category, images,
                     features, sizes, stock, tags, badge, is_active)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                ON CONFLICT (slug) DO UPDATE SET
                    name = EXCLUDED.name, description = EXCLUDED.description,
                    price = EXCLUDED.price, discount_price = EXCLUDED.discount_price,
                    category = EXCLUDED.category, images = EXCLUDED.images,
                    features = EXCLUDED.features, sizes = EXCLUDED.sizes,
                    stock = EXCLUDED.stock, tags = EXCLUDED.tags, badge = EXCLUDED.badge,
                    is_active = EXCLUDED.is_active
                RETURNING {PRODUCT_COLUMNS}, (xmax = 0) AS inserted
                "
            )),
            record,
        )
        .fetch_one(self.pool)
        .await?;

        Ok((Product::try_from(row.product)?, row.inserted))
    }

    /// Mark a product inactive. It stays on existing orders and carts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn deactivate(&self, id: ProductId) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            UPDATE shop.product AS p SET is_active = FALSE
            WHERE p.id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Product::try_from(row)
    }

    /// Number of active products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_active(&self) -> Result<u64, RepositoryError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM shop.product p WHERE p.is_active")
                .fetch_one(self.pool)
                .await?;
        Ok(to_u64(count))
    }

    /// Sizes of active products with at most `threshold` units left.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn low_stock(&self, threshold: u32) -> Result<Vec<LowStock>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            SELECT {PRODUCT_COLUMNS} FROM shop.product p
            WHERE p.is_active AND p.stock IS NOT NULL
            ORDER BY p.name
            "
        ))
        .fetch_all(self.pool)
        .await?;

        let mut low = Vec::new();
        for row in rows {
            let product = Product::try_from(row)?;
            for (size, remaining) in product.stock.low(threshold) {
                // Only sizes still offered matter on the dashboard.
                if product.offers_size(&size) {
                    low.push(LowStock {
                        product_id: product.id,
                        name: product.name.clone(),
                        slug: product.slug.clone(),
                        size,
                        remaining,
                    });
                }
            }
        }
        Ok(low)
    }
}

/// Bind the thirteen record columns in `INSERT`/`UPDATE` order.
fn bind_record<'q, O>(
    query: sqlx::query::QueryAs<'q, Postgres, O, sqlx::postgres::PgArguments>,
    record: &'q ProductRecord,
) -> sqlx::query::QueryAs<'q, Postgres, O, sqlx::postgres::PgArguments> {
    let sizes: Vec<String> = record.sizes.iter().map(|s| s.as_str().to_owned()).collect();
    query
        .bind(&record.name)
        .bind(&record.slug)
        .bind(&record.description)
        .bind(record.price)
        .bind(record.discount_price)
        .bind(record.category)
        .bind(&record.images)
        .bind(&record.features)
        .bind(sizes)
        .bind(record.stock.counts().map(Json))
        .bind(&record.tags)
        .bind(&record.badge)
        .bind(record.is_active)
}
