//! Per-size stock counts.
//!
//! Stock tracking is optional per product. An untracked product can be sold
//! in any quantity; a tracked product can only be sold up to the count
//! recorded for the requested size, and a size missing from the map has no
//! stock at all.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::Size;

/// Errors from stock operations.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StockError {
    /// Not enough units of the size.
    #[error("only {available} left in size {size}, requested {requested}")]
    Insufficient {
        /// Requested size.
        size: Size,
        /// Requested quantity.
        requested: u32,
        /// Units on hand.
        available: u32,
    },
}

/// How many units of a size can be sold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    /// Stock is not tracked for this product.
    Untracked,
    /// Exactly this many units are on hand.
    Count(u32),
}

impl Availability {
    /// Whether at least `quantity` units can be sold.
    #[must_use]
    pub const fn covers(self, quantity: u32) -> bool {
        match self {
            Self::Untracked => true,
            Self::Count(n) => quantity <= n,
        }
    }

    /// Whether nothing can be sold.
    #[must_use]
    pub const fn is_sold_out(self) -> bool {
        matches!(self, Self::Count(0))
    }
}

/// Optional per-size stock counts for a product.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stock(Option<BTreeMap<Size, u32>>);

impl Stock {
    /// Stock that is not tracked.
    #[must_use]
    pub const fn untracked() -> Self {
        Self(None)
    }

    /// Tracked stock from `(size, count)` pairs.
    #[must_use]
    pub fn tracked(counts: impl IntoIterator<Item = (Size, u32)>) -> Self {
        Self(Some(counts.into_iter().collect()))
    }

    /// Whether counts are recorded for this product.
    #[must_use]
    pub const fn is_tracked(&self) -> bool {
        self.0.is_some()
    }

    /// Availability of a size.
    #[must_use]
    pub fn available(&self, size: &Size) -> Availability {
        self.0.as_ref().map_or(Availability::Untracked, |counts| {
            Availability::Count(counts.get(size).copied().unwrap_or(0))
        })
    }

    /// Whether `quantity` units of `size` can be sold.
    #[must_use]
    pub fn can_fulfil(&self, size: &Size, quantity: u32) -> bool {
        quantity > 0 && self.available(size).covers(quantity)
    }

    /// Cap a requested quantity at what is on hand.
    #[must_use]
    pub fn clamp(&self, size: &Size, quantity: u32) -> u32 {
        match self.available(size) {
            Availability::Untracked => quantity,
            Availability::Count(n) => quantity.min(n),
        }
    }

    /// Remove `quantity` units of `size`.
    ///
    /// Untracked stock is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns `StockError::Insufficient` if fewer than `quantity` units are on hand.
    pub fn decrement(&mut self, size: &Size, quantity: u32) -> Result<(), StockError> {
        let Some(counts) = self.0.as_mut() else {
            return Ok(());
        };

        let available = counts.get(size).copied().unwrap_or(0);
        if available < quantity {
            return Err(StockError::Insufficient {
                size: size.clone(),
                requested: quantity,
                available,
            });
        }

        counts.insert(size.clone(), available - quantity);
        Ok(())
    }

    /// Sizes at or below `threshold` units, in size order.
    #[must_use]
    pub fn low(&self, threshold: u32) -> Vec<(Size, u32)> {
        self.0
            .iter()
            .flatten()
            .filter(|(_, count)| **count <= threshold)
            .map(|(size, count)| (size.clone(), *count))
            .collect()
    }

    /// Recorded counts, if tracked.
    #[must_use]
    pub const fn counts(&self) -> Option<&BTreeMap<Size, u32>> {
        self.0.as_ref()
    }
}
