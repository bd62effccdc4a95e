//! Shipping and tax policy, and the order price breakdown.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::Price;

/// Store-wide shipping and tax settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingPolicy {
    /// Flat shipping fee charged below the free-shipping threshold.
    pub shipping_flat: Price,
    /// Items total at or above which shipping is free. `None` disables
    /// free shipping.
    pub free_shipping_threshold: Option<Price>,
    /// Tax rate applied to the items total, e.g. `0.10` for 10%.
    pub tax_rate: Decimal,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            shipping_flat: Price::from_cents(10_00),
            free_shipping_threshold: Some(Price::from_cents(500_00)),
            tax_rate: Decimal::new(10, 2),
        }
    }
}

impl PricingPolicy {
    /// Shipping fee for an items total.
    #[must_use]
    pub fn shipping_for(&self, items: Price) -> Price {
        if items.is_zero() {
            return Price::ZERO;
        }
        match self.free_shipping_threshold {
            Some(threshold) if items >= threshold => Price::ZERO,
            _ => self.shipping_flat,
        }
    }

    /// Tax for an items total.
    #[must_use]
    pub fn tax_for(&self, items: Price) -> Price {
        items.percent_of(self.tax_rate)
    }
}

/// Items, shipping, tax and total of an order.
///
/// Only [`PriceBreakdown::compute`] builds one, so `total` is always
/// `items + shipping + tax`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub items: Price,
    pub shipping: Price,
    pub tax: Price,
    pub total: Price,
}

impl PriceBreakdown {
    /// Price an items total under a policy.
    #[must_use]
    pub fn compute(items: Price, policy: &PricingPolicy) -> Self {
        let shipping = policy.shipping_for(items);
        let tax = policy.tax_for(items);
        Self {
            items,
            shipping,
            tax,
            total: items + shipping + tax,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_shipping_and_tax() {
        let b = PriceBreakdown::compute(Price::from_cents(200_00), &PricingPolicy::default());
        assert_eq!(b.items, Price::from_cents(200_00));
        assert_eq!(b.shipping, Price::from_cents(10_00));
        assert_eq!(b.tax, Price::from_cents(20_00));
        assert_eq!(b.total, Price::from_cents(230_00));
    }

    #[test]
    fn test_free_shipping_at_threshold() {
        let policy = PricingPolicy::default();
        assert!(policy.shipping_for(Price::from_cents(500_00)).is_zero());
        assert_eq!(
            policy.shipping_for(Price::from_cents(499_99)),
            Price::from_cents(10_00)
        );
    }

    #[test]
    fn test_no_threshold_always_charges_shipping() {
        let policy = PricingPolicy {
            free_shipping_threshold: None,
            ..PricingPolicy::default()
        };
        assert_eq!(
            policy.shipping_for(Price::from_cents(10_000_00)),
            Price::from_cents(10_00)
        );
    }

    #[test]
    fn test_empty_items_cost_nothing() {
        let b = PriceBreakdown::compute(Price::ZERO, &PricingPolicy::default());
        assert!(b.total.is_zero());
    }

    #[test]
    fn test_total_is_sum_of_parts() {
        let policy = PricingPolicy {
            shipping_flat: Price::from_cents(7_50),
            free_shipping_threshold: None,
            tax_rate: Decimal::new(825, 4),
        };
        for cents in [1, 99, 12_345, 99_999] {
            let b = PriceBreakdown::compute(Price::from_cents(cents), &policy);
            assert_eq!(b.total, b.items + b.shipping + b.tax);
        }
    }
}
