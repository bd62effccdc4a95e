//! Cart view types returned by the cart API.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use solemate_core::{
    Availability, CartLines, PriceBreakdown, PricingPolicy, Price, ProductId, Size,
};

use super::Product;

/// One cart line joined with its product.
#[derive(Debug, Clone, Serialize)]
pub struct CartItemView {
    pub product_id: ProductId,
    pub name: String,
    pub slug: String,
    pub image: Option<String>,
    pub size: Size,
    pub quantity: u32,
    pub unit_price: Price,
    pub subtotal: Price,
    /// Units on hand for the size; `None` when stock is not tracked.
    pub in_stock: Option<u32>,
    /// False when the product was deactivated or cannot cover the quantity.
    pub purchasable: bool,
}

/// A cart with its lines, counts and a price preview.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub item_count: u32,
    pub total: Price,
    pub summary: PriceBreakdown,
}

impl CartView {
    /// Join cart lines with their products.
    ///
    /// Lines whose product no longer exists are kept with placeholder
    /// details and marked not purchasable.
    #[must_use]
    pub fn build(lines: &CartLines, products: &[Product], policy: &PricingPolicy) -> Self {
        let by_id: HashMap<ProductId, &Product> = products.iter().map(|p| (p.id, p)).collect();

        let items = lines
            .iter()
            .map(|line| {
                let product = by_id.get(&line.product_id);
                let availability = product.map(|p| p.availability(&line.size));
                CartItemView {
                    product_id: line.product_id,
                    name: product.map(|p| p.name.clone()).unwrap_or_default(),
                    slug: product.map(|p| p.slug.clone()).unwrap_or_default(),
                    image: product.and_then(|p| p.images.first().cloned()),
                    size: line.size.clone(),
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    subtotal: line.subtotal(),
                    in_stock: match availability {
                        Some(Availability::Count(n)) => Some(n),
                        _ => None,
                    },
                    purchasable: product.is_some_and(|p| p.is_active && p.offers_size(&line.size))
                        && availability.is_some_and(|a| a.covers(line.quantity)),
                }
            })
            .collect();

        let total = lines.total();
        Self {
            items,
            item_count: lines.item_count(),
            total,
            summary: PriceBreakdown::compute(total, policy),
        }
    }
}

/// Body of `POST /api/cart/add`.
#[derive(Debug, Clone, Deserialize)]
pub struct AddToCart {
    pub product_id: ProductId,
    pub size: Size,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

/// Body of `POST /api/cart/update`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateCartLine {
    pub product_id: ProductId,
    pub size: Size,
    pub quantity: u32,
}

/// Body of `POST /api/cart/remove`.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoveCartLine {
    pub product_id: ProductId,
    pub size: Size,
}

/// A guest cart line sent at login. Any client-side price is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct GuestCartLine {
    pub product_id: ProductId,
    pub size: Size,
    pub quantity: u32,
}

/// Body of `POST /api/cart/sync`.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncCart {
    pub items: Vec<GuestCartLine>,
}

/// A guest line that could not be merged.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedLine {
    pub product_id: ProductId,
    pub size: Size,
    pub reason: String,
}

/// Result of a guest cart sync.
#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    pub cart: CartView,
    pub skipped: Vec<SkippedLine>,
}

const fn default_quantity() -> u32 {
    1
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use solemate_core::{CartLine, Category, Stock};

    use super::*;

    fn product(id: i32, stock: Stock, active: bool) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Shoe {id}"),
            slug: format!("shoe-{id}"),
            description: String::new(),
            price: Price::from_cents(100_00),
            discount_price: None,
            effective_price: Price::from_cents(100_00),
            on_sale: false,
            category: Category::Casual,
            images: vec!["https://img.test/1.jpg".to_string()],
            features: vec![],
            sizes: vec![Size::parse("M").unwrap()],
            stock,
            tags: vec![],
            badge: None,
            is_active: active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn line(id: i32, quantity: u32) -> CartLine {
        CartLine {
            product_id: ProductId::new(id),
            size: Size::parse("M").unwrap(),
            quantity,
            unit_price: Price::from_cents(100_00),
        }
    }

    #[test]
    fn test_build_totals_and_flags() {
        let lines = CartLines::from_lines([line(1, 2), line(2, 1), line(3, 1)]);
        let products = [
            product(1, Stock::untracked(), true),
            product(2, Stock::tracked([(Size::parse("M").unwrap(), 0)]), true),
        ];

        let view = CartView::build(&lines, &products, &PricingPolicy::default());

        assert_eq!(view.item_count, 4);
        assert_eq!(view.total, Price::from_cents(400_00));
        assert_eq!(view.summary.total, Price::from_cents(450_00));

        let flags: Vec<bool> = view.items.iter().map(|i| i.purchasable).collect();
        assert_eq!(flags, vec![true, false, false]);
        assert_eq!(view.items.get(1).unwrap().in_stock, Some(0));
        assert!(view.items.get(2).unwrap().name.is_empty());
    }

    #[test]
    fn test_inactive_product_not_purchasable() {
        let lines = CartLines::from_lines([line(1, 1)]);
        let products = [product(1, Stock::untracked(), false)];
        let view = CartView::build(&lines, &products, &PricingPolicy::default());
        assert!(!view.items.first().unwrap().purchasable);
    }

    #[test]
    fn test_add_defaults_quantity() {
        let add: AddToCart = serde_json::from_str(r#"{"product_id": 4, "size": "m"}"#).unwrap();
        assert_eq!(add.quantity, 1);
        assert_eq!(add.size.as_str(), "M");
    }
}
