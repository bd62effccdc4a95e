//! Order lookup and the admin status workflow.

use chrono::Utc;
use sqlx::PgPool;
use tracing::instrument;

use solemate_core::{OrderId, OrderStatus, PaymentStatus, TransitionError};

use crate::db::{OrderRepository, RepositoryError};
use crate::models::order::OrderFilter;
use crate::models::{CurrentUser, Order, Page, Pagination};

/// Errors from order operations.
#[derive(thiserror::Error, Debug)]
pub enum OrderError {
    #[error("order not found")]
    NotFound,

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("order is already {0}")]
    Final(OrderStatus),

    #[error("order is already marked {0}")]
    AlreadySettled(PaymentStatus),

    #[error("cancelled orders cannot be marked paid")]
    Cancelled,

    /// Another request changed the order first.
    #[error("order was updated by someone else, reload and try again")]
    Conflict,

    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for OrderError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => Self::NotFound,
            RepositoryError::Conflict(_) => Self::Conflict,
            other => Self::Repository(other),
        }
    }
}

/// Order service.
pub struct OrderService<'a> {
    orders: OrderRepository<'a>,
}

impl<'a> OrderService<'a> {
    /// Create a new order service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            orders: OrderRepository::new(pool),
        }
    }

    /// An order as seen by `viewer`. Customers only see their own orders;
    /// anyone else's is reported as missing.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the order does not exist or belongs
    /// to another customer.
    #[instrument(skip(self, viewer), fields(user_id = %viewer.id))]
    pub async fn get_for(&self, viewer: &CurrentUser, id: OrderId) -> Result<Order, OrderError> {
        let order = self.get(id).await?;
        if order.user_id != viewer.id && !viewer.role.is_admin() {
            return Err(OrderError::NotFound);
        }
        Ok(order)
    }

    /// An order by ID.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the order does not exist.
    pub async fn get(&self, id: OrderId) -> Result<Order, OrderError> {
        self.orders.get(id).await?.ok_or(OrderError::NotFound)
    }

    /// The viewer's own orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the query fails.
    pub async fn list_mine(
        &self,
        viewer: &CurrentUser,
        pagination: Pagination,
    ) -> Result<Page<Order>, OrderError> {
        let (orders, total) = self.orders.list_for_user(viewer.id, pagination).await?;
        Ok(Page::new(orders, total, pagination))
    }

    /// All orders, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the query fails.
    pub async fn list(
        &self,
        filter: OrderFilter,
        pagination: Pagination,
    ) -> Result<Page<Order>, OrderError> {
        let (orders, total) = self.orders.list(filter, pagination).await?;
        Ok(Page::new(orders, total, pagination))
    }

    /// Move an order to `target`.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Transition` if the workflow does not allow the
    /// move and `OrderError::Conflict` if the order changed concurrently.
    #[instrument(skip(self))]
    pub async fn set_status(&self, id: OrderId, target: OrderStatus) -> Result<Order, OrderError> {
        let order = self.get(id).await?;
        let change = order.status.transition(target, Utc::now())?;
        let updated = self.orders.update_status(id, &change).await?;

        tracing::info!(
            order_number = %updated.order_number,
            from = %change.from,
            to = %change.to,
            "Order status changed"
        );
        Ok(updated)
    }

    /// Move an order to the next status in the workflow.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Final` if the order is delivered or cancelled.
    #[instrument(skip(self))]
    pub async fn advance(&self, id: OrderId) -> Result<Order, OrderError> {
        let order = self.get(id).await?;
        let next = order.next_status().ok_or(OrderError::Final(order.status))?;
        self.set_status(id, next).await
    }

    /// Record payment for an order.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::AlreadySettled` if the order is paid or
    /// refunded and `OrderError::Cancelled` for cancelled orders.
    #[instrument(skip(self))]
    pub async fn mark_paid(&self, id: OrderId) -> Result<Order, OrderError> {
        let order = self.get(id).await?;
        check_payable(&order)?;

        let updated = self.orders.mark_paid(id, Utc::now()).await?;
        tracing::info!(order_number = %updated.order_number, "Order marked paid");
        Ok(updated)
    }
}

fn check_payable(order: &Order) -> Result<(), OrderError> {
    if order.status == OrderStatus::Cancelled {
        return Err(OrderError::Cancelled);
    }
    match order.payment_status {
        PaymentStatus::Paid | PaymentStatus::Refunded => {
            Err(OrderError::AlreadySettled(order.payment_status))
        }
        PaymentStatus::Pending | PaymentStatus::Failed => Ok(()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use solemate_core::{PaymentMethod, Price, PriceBreakdown, PricingPolicy, UserId};

    use super::*;
    use crate::models::ShippingAddress;

    fn order(status: OrderStatus, payment_status: PaymentStatus) -> Order {
        Order {
            id: OrderId::new(1),
            order_number: "SM-250301-00001".to_string(),
            user_id: UserId::new(1),
            status,
            payment_method: PaymentMethod::CashOnDelivery,
            payment_status,
            paid_at: None,
            pricing: PriceBreakdown::compute(Price::from_cents(200_00), &PricingPolicy::default()),
            shipping_address: ShippingAddress {
                full_name: "Sam Doe".to_string(),
                phone: "+15550100".to_string(),
                street: "1 Main St".to_string(),
                city: "Springfield".to_string(),
                state: String::new(),
                postal_code: "12345".to_string(),
                country: "US".to_string(),
            },
            note: None,
            items: vec![],
            delivered_at: None,
            cancelled_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_payable_states() {
        assert!(check_payable(&order(OrderStatus::Pending, PaymentStatus::Pending)).is_ok());
        assert!(check_payable(&order(OrderStatus::Shipped, PaymentStatus::Failed)).is_ok());
        assert!(matches!(
            check_payable(&order(OrderStatus::Delivered, PaymentStatus::Paid)),
            Err(OrderError::AlreadySettled(PaymentStatus::Paid))
        ));
        assert!(matches!(
            check_payable(&order(OrderStatus::Cancelled, PaymentStatus::Pending)),
            Err(OrderError::Cancelled)
        ));
    }

    #[test]
    fn test_repository_error_mapping() {
        assert!(matches!(
            OrderError::from(RepositoryError::NotFound),
            OrderError::NotFound
        ));
        assert!(matches!(
            OrderError::from(RepositoryError::Conflict("status".to_string())),
            OrderError::Conflict
        ));
    }
}
