//! Cart repository.
//!
//! A cart is loaded as [`CartLines`], changed in memory by the core cart
//! rules, and saved back by replacing all of its items in one transaction.

use sqlx::{PgConnection, PgPool};

use solemate_core::{CartLine, CartLines, Price, ProductId, Size, UserId};

use super::{RepositoryError, to_i32, to_u32};

#[derive(Debug, sqlx::FromRow)]
struct CartItemRow {
    product_id: i32,
    size: String,
    quantity: i32,
    unit_price: Price,
}

impl TryFrom<CartItemRow> for CartLine {
    type Error = RepositoryError;

    fn try_from(row: CartItemRow) -> Result<Self, Self::Error> {
        Ok(Self {
            product_id: ProductId::new(row.product_id),
            size: Size::parse(&row.size).map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid cart size: {e}"))
            })?,
            quantity: to_u32(row.quantity, "cart quantity")?,
            unit_price: row.unit_price,
        })
    }
}

/// Repository for per-user carts.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Load a user's cart lines in insertion order. A user without a cart
    /// has an empty one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn load(&self, user_id: UserId) -> Result<CartLines, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        load_lines(&mut conn, user_id).await
    }

    /// Replace a user's cart with the given lines, creating the cart if needed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails; nothing
    /// is written in that case.
    pub async fn save(&self, user_id: UserId, lines: &CartLines) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let cart_id: i32 = sqlx::query_scalar(
            r"
            INSERT INTO shop.cart (user_id) VALUES ($1)
            ON CONFLICT (user_id) DO UPDATE SET updated_at = NOW()
            RETURNING id
            ",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM shop.cart_item WHERE cart_id = $1")
            .bind(cart_id)
            .execute(&mut *tx)
            .await?;

        for (position, line) in lines.iter().enumerate() {
            sqlx::query(
                r"
                INSERT INTO shop.cart_item (cart_id, product_id, size, quantity, unit_price, position)
                VALUES ($1, $2, $3, $4, $5, $6)
                ",
            )
            .bind(cart_id)
            .bind(line.product_id)
            .bind(&line.size)
            .bind(to_i32(line.quantity)?)
            .bind(line.unit_price)
            .bind(i32::try_from(position).unwrap_or(i32::MAX))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Remove every line from a user's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear(&self, user_id: UserId) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        clear_lines(&mut conn, user_id).await
    }
}

/// Load cart lines on an existing connection or transaction.
pub(crate) async fn load_lines(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<CartLines, RepositoryError> {
    let rows = sqlx::query_as::<_, CartItemRow>(
        r"
        SELECT ci.product_id, ci.size, ci.quantity, ci.unit_price
        FROM shop.cart_item ci
        JOIN shop.cart c ON c.id = ci.cart_id
        WHERE c.user_id = $1
        ORDER BY ci.position, ci.id
        ",
    )
    .bind(user_id)
    .fetch_all(conn)
    .await?;

    let lines = rows
        .into_iter()
        .map(CartLine::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CartLines::from_lines(lines))
}

/// Delete all cart lines on an existing connection or transaction.
pub(crate) async fn clear_lines(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        DELETE FROM shop.cart_item ci
        USING shop.cart c
        WHERE c.id = ci.cart_id AND c.user_id = $1
        ",
    )
    .bind(user_id)
    .execute(conn)
    .await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_row_conversion() {
        let line = CartLine::try_from(CartItemRow {
            product_id: 5,
            size: "m".to_string(),
            quantity: 2,
            unit_price: Price::from_cents(45_50),
        })
        .unwrap();
        assert_eq!(line.size.as_str(), "M");
        assert_eq!(line.subtotal(), Price::from_cents(91_00));
    }

    #[test]
    fn test_negative_quantity_is_corruption() {
        let result = CartLine::try_from(CartItemRow {
            product_id: 5,
            size: "M".to_string(),
            quantity: -1,
            unit_price: Price::ZERO,
        });
        assert!(matches!(result, Err(RepositoryError::DataCorruption(_))));
    }
}
