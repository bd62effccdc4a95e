//! Order repository.
//!
//! Order creation runs in a single transaction: the order row and its items
//! are inserted, every tracked stock count is decremented with a guarded
//! update, and the cart is emptied. Any failure rolls everything back.

use std::collections::HashMap;

use chrono::{DateTime, Days, NaiveDate, Utc};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use thiserror::Error;

use solemate_core::order::format_order_number;
use solemate_core::{
    CartLines, OrderDraft, OrderId, OrderStatus, PaymentMethod, PaymentStatus, Price,
    PriceBreakdown, ProductId, Size, StatusChange, StatusTimestamp, UserId,
};

use super::products::decrement_stock;
use super::{RepositoryError, carts, to_i32, to_u32, to_u64};
use crate::models::order::OrderFilter;
use crate::models::{Order, OrderItem, Pagination, ShippingAddress};

/// Attempts at finding a free order number before giving up.
const ORDER_NUMBER_ATTEMPTS: usize = 5;

const ORDER_COLUMNS: &str = "o.id, o.order_number, o.user_id, o.status, o.payment_method, \
     o.payment_status, o.paid_at, o.items_total, o.shipping, o.tax, o.total, o.ship_full_name, \
     o.ship_phone, o.ship_street, o.ship_city, o.ship_state, o.ship_postal_code, o.ship_country, \
     o.note, o.delivered_at, o.cancelled_at, o.created_at, o.updated_at";

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    order_number: String,
    user_id: i32,
    status: OrderStatus,
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
    paid_at: Option<DateTime<Utc>>,
    items_total: Price,
    shipping: Price,
    tax: Price,
    total: Price,
    ship_full_name: String,
    ship_phone: String,
    ship_street: String,
    ship_city: String,
    ship_state: String,
    ship_postal_code: String,
    ship_country: String,
    note: Option<String>,
    delivered_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order, RepositoryError> {
        if self.total != self.items_total + self.shipping + self.tax {
            return Err(RepositoryError::DataCorruption(format!(
                "order {}: total does not match its breakdown",
                self.order_number
            )));
        }

        Ok(Order {
            id: OrderId::new(self.id),
            order_number: self.order_number,
            user_id: UserId::new(self.user_id),
            status: self.status,
            payment_method: self.payment_method,
            payment_status: self.payment_status,
            paid_at: self.paid_at,
            pricing: PriceBreakdown {
                items: self.items_total,
                shipping: self.shipping,
                tax: self.tax,
                total: self.total,
            },
            shipping_address: ShippingAddress {
                full_name: self.ship_full_name,
                phone: self.ship_phone,
                street: self.ship_street,
                city: self.ship_city,
                state: self.ship_state,
                postal_code: self.ship_postal_code,
                country: self.ship_country,
            },
            note: self.note,
            items,
            delivered_at: self.delivered_at,
            cancelled_at: self.cancelled_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    order_id: i32,
    product_id: i32,
    name: String,
    slug: String,
    size: String,
    quantity: i32,
    unit_price: Price,
    image: Option<String>,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = RepositoryError;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        let quantity = to_u32(row.quantity, "order item quantity")?;
        Ok(Self {
            product_id: ProductId::new(row.product_id),
            name: row.name,
            slug: row.slug,
            size: Size::parse(&row.size).map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid order item size: {e}"))
            })?,
            quantity,
            unit_price: row.unit_price,
            subtotal: row.unit_price.times(quantity),
            image: row.image,
        })
    }
}

/// Everything needed to write a new order.
#[derive(Debug, Clone, Copy)]
pub struct NewOrder<'a> {
    pub user_id: UserId,
    /// The cart lines the draft was planned from.
    pub lines: &'a CartLines,
    pub draft: &'a OrderDraft,
    pub shipping_address: &'a ShippingAddress,
    pub payment_method: PaymentMethod,
    pub note: Option<&'a str>,
}

/// Why an order could not be written.
#[derive(Debug, Error)]
pub enum CreateOrderError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// A stock count dropped below the ordered quantity after planning.
    #[error("insufficient stock for {name} (size {size}): requested {requested}, available {available}")]
    OutOfStock {
        product_id: ProductId,
        name: String,
        size: Size,
        requested: u32,
        available: u32,
    },

    /// The cart was modified (or already ordered) while the order was placed.
    #[error("cart changed while placing the order")]
    CartChanged,
}

impl From<sqlx::Error> for CreateOrderError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

/// First instant of the UTC day and of the next one.
fn day_bounds(day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = day.and_time(chrono::NaiveTime::MIN).and_utc();
    let end = day
        .checked_add_days(Days::new(1))
        .map_or(DateTime::<Utc>::MAX_UTC, |d| {
            d.and_time(chrono::NaiveTime::MIN).and_utc()
        });
    (start, end)
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Write a planned order, decrement stock and clear the cart atomically.
    ///
    /// # Errors
    ///
    /// Returns `CreateOrderError::CartChanged` if the stored cart no longer
    /// matches the planned lines, `CreateOrderError::OutOfStock` if a guarded
    /// stock decrement fails, and `CreateOrderError::Repository` otherwise.
    /// No changes are persisted on error.
    #[tracing::instrument(skip(self, order), fields(user_id = %order.user_id))]
    pub async fn create(&self, order: NewOrder<'_>) -> Result<Order, CreateOrderError> {
        let mut tx = self.pool.begin().await?;

        // Serialize concurrent checkouts of the same cart.
        sqlx::query("SELECT id FROM shop.cart WHERE user_id = $1 FOR UPDATE")
            .bind(order.user_id)
            .fetch_optional(&mut *tx)
            .await?;
        let current = carts::load_lines(&mut tx, order.user_id).await?;
        if &current != order.lines {
            return Err(CreateOrderError::CartChanged);
        }

        let now = Utc::now();
        let order_id = insert_order_row(&mut tx, &order, now).await?;

        for (position, item) in order.draft.items.iter().enumerate() {
            sqlx::query(
                r"
                INSERT INTO shop.order_item
                    (order_id, product_id, name, slug, size, quantity, unit_price, image, position)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ",
            )
            .bind(order_id)
            .bind(item.product_id)
            .bind(&item.name)
            .bind(&item.slug)
            .bind(&item.size)
            .bind(to_i32(item.quantity)?)
            .bind(item.unit_price)
            .bind(&item.image)
            .bind(i32::try_from(position).unwrap_or(i32::MAX))
            .execute(&mut *tx)
            .await?;

            if !decrement_stock(&mut tx, item.product_id, &item.size, item.quantity).await? {
                let available = available_stock(&mut tx, item.product_id, &item.size).await?;
                tracing::warn!(
                    product_id = %item.product_id,
                    size = %item.size,
                    requested = item.quantity,
                    available,
                    "Stock decrement refused, rolling back order"
                );
                return Err(CreateOrderError::OutOfStock {
                    product_id: item.product_id,
                    name: item.name.clone(),
                    size: item.size.clone(),
                    requested: item.quantity,
                    available,
                });
            }
        }

        carts::clear_lines(&mut tx, order.user_id).await?;

        let created = fetch_order(&mut tx, OrderId::new(order_id))
            .await?
            .ok_or(RepositoryError::NotFound)?;
        tx.commit().await?;

        tracing::info!(order_number = %created.order_number, "Order created");
        Ok(created)
    }

    /// Get an order with its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch_order(&mut conn, id).await
    }

    /// One page of a user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        pagination: Pagination,
    ) -> Result<(Vec<Order>, u64), RepositoryError> {
        self.list_where(Some(user_id), None, pagination).await
    }

    /// One page of all orders, optionally filtered by status, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(
        &self,
        filter: OrderFilter,
        pagination: Pagination,
    ) -> Result<(Vec<Order>, u64), RepositoryError> {
        self.list_where(None, filter.status, pagination).await
    }

    async fn list_where(
        &self,
        user_id: Option<UserId>,
        status: Option<OrderStatus>,
        pagination: Pagination,
    ) -> Result<(Vec<Order>, u64), RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM shop.order o");
        push_order_filters(&mut count, user_id, status);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(self.pool)
            .await?;

        let mut select =
            QueryBuilder::<Postgres>::new(format!("SELECT {ORDER_COLUMNS} FROM shop.order o"));
        push_order_filters(&mut select, user_id, status);
        select
            .push(" ORDER BY o.created_at DESC, o.id DESC LIMIT ")
            .push_bind(i64::from(pagination.limit))
            .push(" OFFSET ")
            .push_bind(pagination.offset());

        let rows = select
            .build_query_as::<OrderRow>()
            .fetch_all(self.pool)
            .await?;

        let mut conn = self.pool.acquire().await?;
        let orders = attach_items(&mut conn, rows).await?;
        Ok((orders, to_u64(total)))
    }

    /// Apply a validated status change, guarded against concurrent updates.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist and
    /// `RepositoryError::Conflict` if its status is no longer `change.from`.
    pub async fn update_status(
        &self,
        id: OrderId,
        change: &StatusChange,
    ) -> Result<Order, RepositoryError> {
        let (delivered_at, cancelled_at) = match change.stamp {
            Some(StatusTimestamp::Delivered(at)) => (Some(at), None),
            Some(StatusTimestamp::Cancelled(at)) => (None, Some(at)),
            None => (None, None),
        };

        let updated: Option<i32> = sqlx::query_scalar(
            r"
            UPDATE shop.order SET
                status = $2,
                delivered_at = COALESCE($3, delivered_at),
                cancelled_at = COALESCE($4, cancelled_at)
            WHERE id = $1 AND status = $5
            RETURNING id
            ",
        )
        .bind(id)
        .bind(change.to)
        .bind(delivered_at)
        .bind(cancelled_at)
        .bind(change.from)
        .fetch_optional(self.pool)
        .await?;

        self.after_guarded_update(id, updated, "order status changed concurrently")
            .await
    }

    /// Record payment for an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist and
    /// `RepositoryError::Conflict` if it is cancelled or already paid or refunded.
    pub async fn mark_paid(
        &self,
        id: OrderId,
        now: DateTime<Utc>,
    ) -> Result<Order, RepositoryError> {
        let updated: Option<i32> = sqlx::query_scalar(
            r"
            UPDATE shop.order SET payment_status = 'paid', paid_at = $2
            WHERE id = $1
              AND payment_status IN ('pending', 'failed')
              AND status <> 'cancelled'
            RETURNING id
            ",
        )
        .bind(id)
        .bind(now)
        .fetch_optional(self.pool)
        .await?;

        self.after_guarded_update(id, updated, "order cannot be marked as paid")
            .await
    }

    async fn after_guarded_update(
        &self,
        id: OrderId,
        updated: Option<i32>,
        conflict: &str,
    ) -> Result<Order, RepositoryError> {
        let order = self.get(id).await?.ok_or(RepositoryError::NotFound)?;
        if updated.is_none() {
            return Err(RepositoryError::Conflict(conflict.to_owned()));
        }
        Ok(order)
    }

    /// Number of orders in each status. Statuses without orders report 0.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn status_counts(&self) -> Result<Vec<(OrderStatus, u64)>, RepositoryError> {
        let rows: Vec<(OrderStatus, i64)> =
            sqlx::query_as("SELECT o.status, COUNT(*) FROM shop.order o GROUP BY o.status")
                .fetch_all(self.pool)
                .await?;
        let counts: HashMap<OrderStatus, i64> = rows.into_iter().collect();

        Ok(OrderStatus::ALL
            .iter()
            .map(|s| (*s, to_u64(counts.get(s).copied().unwrap_or_default())))
            .collect())
    }

    /// Sum of totals of all orders that were not cancelled.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn revenue(&self) -> Result<Price, RepositoryError> {
        let revenue: Price = sqlx::query_scalar(
            "SELECT COALESCE(SUM(o.total), 0) FROM shop.order o WHERE o.status <> 'cancelled'",
        )
        .fetch_one(self.pool)
        .await?;
        Ok(revenue)
    }
}

fn push_order_filters(
    builder: &mut QueryBuilder<'_, Postgres>,
    user_id: Option<UserId>,
    status: Option<OrderStatus>,
) {
    builder.push(" WHERE TRUE");
    if let Some(user_id) = user_id {
        builder.push(" AND o.user_id = ").push_bind(user_id);
    }
    if let Some(status) = status {
        builder.push(" AND o.status = ").push_bind(status);
    }
}

/// Insert the order row under a fresh order number.
///
/// The number is the count of the day's orders plus one; on a collision the
/// next sequence value is tried.
async fn insert_order_row(
    conn: &mut PgConnection,
    order: &NewOrder<'_>,
    now: DateTime<Utc>,
) -> Result<i32, CreateOrderError> {
    let today = now.date_naive();
    let (start, end) = day_bounds(today);
    let todays: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM shop.order o WHERE o.created_at >= $1 AND o.created_at < $2",
    )
    .bind(start)
    .bind(end)
    .fetch_one(&mut *conn)
    .await?;
    let first = u32::try_from(todays).unwrap_or(u32::MAX).saturating_add(1);

    let pricing = &order.draft.pricing;
    let address = order.shipping_address;
    for sequence in (first..).take(ORDER_NUMBER_ATTEMPTS) {
        let order_number = format_order_number(today, sequence);
        let id: Option<i32> = sqlx::query_scalar(
            r"
            INSERT INTO shop.order
                (order_number, user_id, payment_method, items_total, shipping, tax, total,
                 ship_full_name, ship_phone, ship_street, ship_city, ship_state,
                 ship_postal_code, ship_country, note, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $16)
            ON CONFLICT (order_number) DO NOTHING
            RETURNING id
            ",
        )
        .bind(&order_number)
        .bind(order.user_id)
        .bind(order.payment_method)
        .bind(pricing.items)
        .bind(pricing.shipping)
        .bind(pricing.tax)
        .bind(pricing.total)
        .bind(&address.full_name)
        .bind(&address.phone)
        .bind(&address.street)
        .bind(&address.city)
        .bind(&address.state)
        .bind(&address.postal_code)
        .bind(&address.country)
        .bind(order.note)
        .bind(now)
        .fetch_optional(&mut *conn)
        .await?;

        if let Some(id) = id {
            return Ok(id);
        }
        tracing::debug!(%order_number, "Order number taken, trying next");
    }

    Err(RepositoryError::Conflict("could not allocate an order number".to_owned()).into())
}

async fn fetch_order(
    conn: &mut PgConnection,
    id: OrderId,
) -> Result<Option<Order>, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM shop.order o WHERE o.id = $1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => Ok(attach_items(conn, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

/// Load the items of the given orders and build the domain values.
async fn attach_items(
    conn: &mut PgConnection,
    rows: Vec<OrderRow>,
) -> Result<Vec<Order>, RepositoryError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();

    let item_rows = sqlx::query_as::<_, OrderItemRow>(
        r"
        SELECT oi.order_id, oi.product_id, oi.name, oi.slug, oi.size, oi.quantity,
               oi.unit_price, oi.image
        FROM shop.order_item oi
        WHERE oi.order_id = ANY($1)
        ORDER BY oi.order_id, oi.position
        ",
    )
    .bind(ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut items: HashMap<i32, Vec<OrderItem>> = HashMap::new();
    for row in item_rows {
        let order_id = row.order_id;
        items
            .entry(order_id)
            .or_default()
            .push(OrderItem::try_from(row)?);
    }

    rows.into_iter()
        .map(|row| {
            let order_items = items.remove(&row.id).unwrap_or_default();
            row.into_order(order_items)
        })
        .collect()
}

async fn available_stock(
    conn: &mut PgConnection,
    product_id: ProductId,
    size: &Size,
) -> Result<u32, RepositoryError> {
    let count: Option<i32> = sqlx::query_scalar(
        "SELECT COALESCE((p.stock ->> $2)::int, 0) FROM shop.product p WHERE p.id = $1",
    )
    .bind(product_id)
    .bind(size.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    Ok(count.map_or(0, |c| u32::try_from(c).unwrap_or(0)))
}
