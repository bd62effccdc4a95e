//! Order placement.
//!
//! The cart and its products are loaded, checked with
//! [`solemate_core::plan_order`], and written by
//! [`OrderRepository::create`], which re-checks stock inside its
//! transaction. Nothing is changed unless the whole order is accepted.

use sqlx::PgPool;
use tracing::instrument;

use solemate_core::{
    PlacementError, PricingPolicy, ProductId, ProductSnapshot, Size, UserId, plan_order,
};

use crate::db::{
    CartRepository, CreateOrderError, NewOrder, OrderRepository, ProductRepository,
    RepositoryError,
};
use crate::models::order::AddressError;
use crate::models::{Order, PlaceOrder};
use crate::services::catalog::Catalog;

/// Errors from placing an order.
#[derive(thiserror::Error, Debug)]
pub enum CheckoutError {
    #[error(transparent)]
    Placement(#[from] PlacementError),

    #[error("invalid shipping details: {0}")]
    Address(#[from] AddressError),

    /// Stock ran out between planning and writing.
    #[error(
        "insufficient stock for {name} (size {size}): requested {requested}, available {available}"
    )]
    OutOfStock {
        product_id: ProductId,
        name: String,
        size: Size,
        requested: u32,
        available: u32,
    },

    #[error("your cart changed while the order was being placed, please review it")]
    CartChanged,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<CreateOrderError> for CheckoutError {
    fn from(err: CreateOrderError) -> Self {
        match err {
            CreateOrderError::Repository(e) => Self::Repository(e),
            CreateOrderError::OutOfStock {
                product_id,
                name,
                size,
                requested,
                available,
            } => Self::OutOfStock {
                product_id,
                name,
                size,
                requested,
                available,
            },
            CreateOrderError::CartChanged => Self::CartChanged,
        }
    }
}

/// Checkout service.
pub struct CheckoutService<'a> {
    carts: CartRepository<'a>,
    products: ProductRepository<'a>,
    orders: OrderRepository<'a>,
    policy: &'a PricingPolicy,
    catalog: &'a Catalog,
}

impl<'a> CheckoutService<'a> {
    /// Create a new checkout service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, policy: &'a PricingPolicy, catalog: &'a Catalog) -> Self {
        Self {
            carts: CartRepository::new(pool),
            products: ProductRepository::new(pool),
            orders: OrderRepository::new(pool),
            policy,
            catalog,
        }
    }

    /// Turn the user's cart into an order.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Address` for invalid shipping details,
    /// `CheckoutError::Placement` if the cart cannot be ordered as is,
    /// `CheckoutError::OutOfStock` or `CheckoutError::CartChanged` if a
    /// concurrent request got there first.
    #[instrument(skip(self, request), fields(payment_method = %request.payment_method))]
    pub async fn place(&self, user_id: UserId, request: PlaceOrder) -> Result<Order, CheckoutError> {
        let note = request.clean_note()?;
        let shipping_address = request.shipping_address.validate()?;

        let lines = self.carts.load(user_id).await?;
        if lines.is_empty() {
            return Err(PlacementError::EmptyCart.into());
        }

        let mut ids: Vec<ProductId> = lines.iter().map(|l| l.product_id).collect();
        ids.sort_unstable();
        ids.dedup();
        let snapshots: Vec<ProductSnapshot> = self
            .products
            .get_many(&ids)
            .await?
            .iter()
            .map(crate::models::Product::snapshot)
            .collect();

        let draft = plan_order(&lines, &snapshots, self.policy)?;

        let order = self
            .orders
            .create(NewOrder {
                user_id,
                lines: &lines,
                draft: &draft,
                shipping_address: &shipping_address,
                payment_method: request.payment_method,
                note: note.as_deref(),
            })
            .await?;

        // Stock counts changed.
        self.catalog.invalidate_all().await;

        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = %order.pricing.total,
            "Order placed"
        );
        Ok(order)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_create_error_mapping() {
        assert!(matches!(
            CheckoutError::from(CreateOrderError::CartChanged),
            CheckoutError::CartChanged
        ));

        let err = CheckoutError::from(CreateOrderError::OutOfStock {
            product_id: ProductId::new(3),
            name: "Loafer".to_string(),
            size: Size::parse("40").unwrap(),
            requested: 2,
            available: 1,
        });
        assert_eq!(
            err.to_string(),
            "insufficient stock for Loafer (size 40): requested 2, available 1"
        );
    }
}
