//! Order placement planning.
//!
//! [`plan_order`] turns cart lines and the current state of the products they
//! reference into an [`OrderDraft`]: frozen item snapshots plus the price
//! breakdown. It is a pure function. Persisting the draft, decrementing
//! stock and clearing the cart happen together in the storefront's order
//! repository.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::cart::CartLines;
use crate::pricing::{PriceBreakdown, PricingPolicy};
use crate::stock::{Availability, Stock};
use crate::types::{Price, ProductId, Size};

/// Prefix of every order number.
pub const ORDER_NUMBER_PREFIX: &str = "SM";

/// Format an order number as `SM-YYMMDD-NNNNN`.
///
/// `sequence` is the 1-based position of the order within its UTC day.
///
/// ```
/// use chrono::NaiveDate;
/// use solemate_core::order::format_order_number;
///
/// let day = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
/// assert_eq!(format_order_number(day, 12), "SM-240307-00012");
/// ```
#[must_use]
pub fn format_order_number(date: NaiveDate, sequence: u32) -> String {
    format!(
        "{ORDER_NUMBER_PREFIX}-{}-{sequence:05}",
        date.format("%y%m%d")
    )
}

/// The parts of a product that order placement reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub is_active: bool,
    pub sizes: Vec<Size>,
    pub images: Vec<String>,
    pub stock: Stock,
}

/// A frozen order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemSnapshot {
    pub product_id: ProductId,
    pub name: String,
    pub slug: String,
    pub size: Size,
    pub quantity: u32,
    pub unit_price: Price,
    pub image: Option<String>,
}

impl OrderItemSnapshot {
    /// `unit_price x quantity`.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.unit_price.times(self.quantity)
    }
}

/// Everything needed to persist a new order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
    pub items: Vec<OrderItemSnapshot>,
    pub pricing: PriceBreakdown,
}

/// Why an order cannot be placed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PlacementError {
    #[error("cart is empty")]
    EmptyCart,

    /// The product was deleted or deactivated.
    #[error("product {product_id} is no longer available")]
    ProductUnavailable { product_id: ProductId },

    /// The product no longer offers the size.
    #[error("{product} is not available in size {size}")]
    SizeUnavailable { product: String, size: Size },

    #[error("insufficient stock for {product} (size {size}): requested {requested}, available {available}")]
    InsufficientStock {
        product: String,
        size: Size,
        requested: u32,
        available: u32,
    },
}

/// Validate cart lines against current products and price the result.
///
/// Lines are checked in cart order and the first failure is returned.
/// Nothing is produced unless every line passes. The unit price captured in
/// each cart line is kept; the product's current price is not consulted.
///
/// # Errors
///
/// Returns `PlacementError` if the cart is empty, a product is missing or
/// inactive, a size is no longer offered, or stock is insufficient.
pub fn plan_order<'a>(
    lines: &CartLines,
    products: impl IntoIterator<Item = &'a ProductSnapshot>,
    policy: &PricingPolicy,
) -> Result<OrderDraft, PlacementError> {
    if lines.is_empty() {
        return Err(PlacementError::EmptyCart);
    }

    let products: HashMap<ProductId, &ProductSnapshot> =
        products.into_iter().map(|p| (p.id, p)).collect();

    let mut items = Vec::with_capacity(lines.len());
    for line in lines {
        let product = products
            .get(&line.product_id)
            .filter(|p| p.is_active)
            .ok_or(PlacementError::ProductUnavailable {
                product_id: line.product_id,
            })?;

        if !product.sizes.contains(&line.size) {
            return Err(PlacementError::SizeUnavailable {
                product: product.name.clone(),
                size: line.size.clone(),
            });
        }

        if let Availability::Count(available) = product.stock.available(&line.size)
            && available < line.quantity
        {
            return Err(PlacementError::InsufficientStock {
                product: product.name.clone(),
                size: line.size.clone(),
                requested: line.quantity,
                available,
            });
        }

        items.push(OrderItemSnapshot {
            product_id: product.id,
            name: product.name.clone(),
            slug: product.slug.clone(),
            size: line.size.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
            image: product.images.first().cloned(),
        });
    }

    let subtotal = items.iter().map(OrderItemSnapshot::subtotal).sum();
    Ok(OrderDraft {
        items,
        pricing: PriceBreakdown::compute(subtotal, policy),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::cart::{CartLine, MergeMode};

    fn size(s: &str) -> Size {
        Size::parse(s).unwrap()
    }

    fn product(id: i32, stock: Stock) -> ProductSnapshot {
        ProductSnapshot {
            id: ProductId::new(id),
            name: format!("Runner {id}"),
            slug: format!("runner-{id}"),
            is_active: true,
            sizes: vec![size("M"), size("L")],
            images: vec![format!("https://cdn.example.com/{id}/front.jpg"), format!("https://cdn.example.com/{id}/side.jpg")],
            stock,
        }
    }

    fn cart(lines: &[(i32, &str, u32, i64)]) -> CartLines {
        let mut cart = CartLines::new();
        for &(id, s, quantity, cents) in lines {
            cart.upsert(
                CartLine {
                    product_id: ProductId::new(id),
                    size: size(s),
                    quantity,
                    unit_price: Price::from_cents(cents),
                },
                MergeMode::Increment,
            );
        }
        cart
    }

    #[test]
    fn test_order_number_format() {
        let day = NaiveDate::from_ymd_opt(2025, 12, 31).unwrap();
        assert_eq!(format_order_number(day, 1), "SM-251231-00001");
    }

    #[test]
    fn test_plan_prices_order() {
        let products = [product(1, Stock::untracked())];
        let draft = plan_order(&cart(&[(1, "M", 2, 100_00)]), &products, &PricingPolicy::default()).unwrap();

        assert_eq!(draft.items.len(), 1);
        assert_eq!(draft.pricing.items, Price::from_cents(200_00));
        assert_eq!(draft.pricing.shipping, Price::from_cents(10_00));
        assert_eq!(draft.pricing.tax, Price::from_cents(20_00));
        assert_eq!(draft.pricing.total, Price::from_cents(230_00));
    }

    #[test]
    fn test_snapshot_copies_product_fields() {
        let products = [product(7, Stock::untracked())];
        let draft = plan_order(&cart(&[(7, "L", 1, 59_90)]), &products, &PricingPolicy::default()).unwrap();

        let item = &draft.items[0];
        assert_eq!(item.name, "Runner 7");
        assert_eq!(item.slug, "runner-7");
        assert_eq!(item.unit_price, Price::from_cents(59_90));
        assert_eq!(item.image.as_deref(), Some("https://cdn.example.com/7/front.jpg"));
    }

    #[test]
    fn test_empty_cart_rejected() {
        let err = plan_order(&CartLines::new(), std::iter::empty(), &PricingPolicy::default()).unwrap_err();
        assert_eq!(err, PlacementError::EmptyCart);
    }

    #[test]
    fn test_inactive_or_missing_product_rejected() {
        let mut inactive = product(1, Stock::untracked());
        inactive.is_active = false;
        let err = plan_order(&cart(&[(1, "M", 1, 10_00)]), &[inactive], &PricingPolicy::default()).unwrap_err();
        assert_eq!(err, PlacementError::ProductUnavailable { product_id: ProductId::new(1) });

        let err = plan_order(&cart(&[(2, "M", 1, 10_00)]), std::iter::empty(), &PricingPolicy::default()).unwrap_err();
        assert_eq!(err, PlacementError::ProductUnavailable { product_id: ProductId::new(2) });
    }

    #[test]
    fn test_insufficient_stock_names_product() {
        let products = [
            product(1, Stock::untracked()),
            product(2, Stock::tracked([(size("M"), 1)])),
        ];
        let err = plan_order(
            &cart(&[(1, "M", 5, 10_00), (2, "M", 2, 20_00)]),
            &products,
            &PricingPolicy::default(),
        )
        .unwrap_err();

        assert_eq!(
            err,
            PlacementError::InsufficientStock {
                product: "Runner 2".to_owned(),
                size: size("M"),
                requested: 2,
                available: 1,
            }
        );
        // Planning never touches stock
        assert_eq!(products[1].stock.available(&size("M")), Availability::Count(1));
    }

    #[test]
    fn test_size_no_longer_offered() {
        let products = [product(1, Stock::untracked())];
        let err = plan_order(&cart(&[(1, "XS", 1, 10_00)]), &products, &PricingPolicy::default()).unwrap_err();
        assert!(matches!(err, PlacementError::SizeUnavailable { .. }));
    }
}
