//! Pricing, cart and order rules exercised across `solemate-core` types.
//!
//! Run with: cargo test -p solemate-integration-tests

#![allow(clippy::unwrap_used)]

use chrono::Utc;

use solemate_core::{
    Availability, CartLine, CartLines, MergeMode, OrderStatus, PlacementError, Price, PricingPolicy,
    ProductId, ProductSnapshot, Size, Stock, plan_order,
};

fn size(s: &str) -> Size {
    Size::parse(s).unwrap()
}

fn line(product: i32, s: &str, quantity: u32, cents: i64) -> CartLine {
    CartLine {
        product_id: ProductId::new(product),
        size: size(s),
        quantity,
        unit_price: Price::from_cents(cents),
    }
}

fn product(id: i32, sizes: &[&str], stock: Stock) -> ProductSnapshot {
    ProductSnapshot {
        id: ProductId::new(id),
        name: format!("Shoe {id}"),
        slug: format!("shoe-{id}"),
        is_active: true,
        sizes: sizes.iter().map(|s| size(s)).collect(),
        images: vec![format!("/img/{id}.jpg")],
        stock,
    }
}

#[test]
fn test_order_total_includes_shipping_and_tax() {
    let lines = CartLines::from_lines([line(1, "M", 2, 100_00)]);
    let products = [product(1, &["M"], Stock::untracked())];

    let draft = plan_order(&lines, &products, &PricingPolicy::default()).unwrap();

    assert_eq!(draft.pricing.items, Price::from_cents(200_00));
    assert_eq!(draft.pricing.shipping, Price::from_cents(10_00));
    assert_eq!(draft.pricing.tax, Price::from_cents(20_00));
    assert_eq!(draft.pricing.total, Price::from_cents(230_00));
    assert_eq!(draft.items.len(), 1);
}

#[test]
fn test_free_shipping_at_threshold() {
    let lines = CartLines::from_lines([line(1, "42", 5, 100_00)]);
    let products = [product(1, &["42"], Stock::untracked())];

    let draft = plan_order(&lines, &products, &PricingPolicy::default()).unwrap();
    assert_eq!(draft.pricing.shipping, Price::ZERO);
    assert_eq!(draft.pricing.total, Price::from_cents(550_00));
}

#[test]
fn test_order_keeps_captured_prices() {
    // The cart captured 80.00; whatever the product costs now is irrelevant.
    let lines = CartLines::from_lines([line(1, "41", 1, 80_00)]);
    let products = [product(1, &["41"], Stock::untracked())];

    let draft = plan_order(&lines, &products, &PricingPolicy::default()).unwrap();
    assert_eq!(draft.items.first().map(|i| i.unit_price), Some(Price::from_cents(80_00)));
}

#[test]
fn test_guest_merge_is_deterministic() {
    let server = CartLines::from_lines([line(1, "40", 1, 50_00), line(2, "41", 2, 70_00)]);
    let guest = vec![line(2, "41", 5, 70_00), line(3, "42", 1, 90_00), line(3, "42", 2, 90_00)];

    let first = CartLines::merge_guest(&server, guest.clone());
    let second = CartLines::merge_guest(&server, guest);
    assert_eq!(first, second);

    let lines = first.into_vec();
    assert_eq!(lines.len(), 3);
    // Server lines keep their position, guest quantities replace.
    assert_eq!(lines.iter().map(|l| l.quantity).collect::<Vec<_>>(), vec![1, 5, 2]);
}

#[test]
fn test_add_increments_and_sync_replaces() {
    let mut cart = CartLines::new();
    cart.upsert(line(1, "40", 2, 50_00), MergeMode::Increment);
    cart.upsert(line(1, "40", 3, 50_00), MergeMode::Increment);
    assert_eq!(cart.item_count(), 5);

    cart.upsert(line(1, "40", 1, 50_00), MergeMode::Replace);
    assert_eq!(cart.item_count(), 1);
    assert_eq!(cart.len(), 1);
}

#[test]
fn test_zero_stock_size_is_unavailable() {
    let stock = Stock::tracked([(size("40"), 0), (size("41"), 3)]);
    assert_eq!(stock.available(&size("40")), Availability::Count(0));
    assert!(!stock.can_fulfil(&size("40"), 1));
    assert!(stock.can_fulfil(&size("41"), 3));
    assert!(!stock.can_fulfil(&size("41"), 4));
}

#[test]
fn test_insufficient_stock_blocks_placement() {
    let lines = CartLines::from_lines([line(1, "40", 1, 50_00), line(2, "41", 4, 60_00)]);
    let products = [
        product(1, &["40"], Stock::untracked()),
        product(2, &["41"], Stock::tracked([(size("41"), 3)])),
    ];

    let err = plan_order(&lines, &products, &PricingPolicy::default()).unwrap_err();
    assert!(matches!(
        err,
        PlacementError::InsufficientStock {
            requested: 4,
            available: 3,
            ..
        }
    ));
}

#[test]
fn test_empty_cart_cannot_be_placed() {
    let err = plan_order(&CartLines::new(), std::iter::empty(), &PricingPolicy::default()).unwrap_err();
    assert_eq!(err, PlacementError::EmptyCart);
}

#[test]
fn test_status_workflow() {
    let now = Utc::now();

    let mut status = OrderStatus::Pending;
    let mut visited = vec![status];
    while let Some(next) = status.next() {
        let change = status.transition(next, now).unwrap();
        assert_eq!(change.to, next);
        status = next;
        visited.push(status);
    }
    assert_eq!(
        visited,
        vec![
            OrderStatus::Pending,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ]
    );

    assert!(OrderStatus::Delivered.transition(OrderStatus::Cancelled, now).is_err());
    assert!(OrderStatus::Cancelled.transition(OrderStatus::Pending, now).is_err());
    assert!(OrderStatus::Processing.transition(OrderStatus::Cancelled, now).is_ok());
}
