//! Cart lines, totals and the guest cart merge.
//!
//! A cart is an ordered list of lines keyed by `(product, size)`. Two merge
//! behaviours exist for a line whose key is already present:
//!
//! - [`MergeMode::Increment`] adds the incoming quantity (the add-to-cart path)
//! - [`MergeMode::Replace`] overwrites the quantity (the guest sync path)
//!
//! Both refresh the captured unit price to the incoming one.

use serde::{Deserialize, Serialize};

use crate::types::{Price, ProductId, Size};

/// One `(product, size, quantity, captured price)` line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Product being bought.
    pub product_id: ProductId,
    /// Selected size.
    pub size: Size,
    /// Number of pairs, always at least 1.
    pub quantity: u32,
    /// Unit price captured when the line was added.
    pub unit_price: Price,
}

impl CartLine {
    /// Line subtotal (`unit_price x quantity`).
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.unit_price.times(self.quantity)
    }

    fn same_key(&self, product_id: ProductId, size: &Size) -> bool {
        self.product_id == product_id && &self.size == size
    }
}

/// How an incoming line combines with an existing one for the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// Add the quantities.
    Increment,
    /// Keep the incoming quantity.
    Replace,
}

/// The lines of a cart.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartLines(Vec<CartLine>);

impl CartLines {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Build from lines, collapsing duplicates with [`MergeMode::Replace`]
    /// and dropping zero-quantity lines.
    #[must_use]
    pub fn from_lines(lines: impl IntoIterator<Item = CartLine>) -> Self {
        let mut cart = Self::new();
        for line in lines {
            cart.upsert(line, MergeMode::Replace);
        }
        cart
    }

    /// Sum of line subtotals.
    #[must_use]
    pub fn total(&self) -> Price {
        self.0.iter().map(CartLine::subtotal).sum()
    }

    /// Total number of pairs across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.0.iter().map(|l| l.quantity).sum()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of distinct lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over lines in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, CartLine> {
        self.0.iter()
    }

    /// Look up the line for a product and size.
    #[must_use]
    pub fn get(&self, product_id: ProductId, size: &Size) -> Option<&CartLine> {
        self.0.iter().find(|l| l.same_key(product_id, size))
    }

    /// Insert a line or combine it with the existing line for its key.
    ///
    /// Lines with a zero quantity are ignored on insert; under
    /// [`MergeMode::Replace`] a zero quantity removes the existing line.
    /// Returns the resulting quantity for the key.
    pub fn upsert(&mut self, line: CartLine, mode: MergeMode) -> u32 {
        if let Some(existing) = self
            .0
            .iter_mut()
            .find(|l| l.same_key(line.product_id, &line.size))
        {
            existing.quantity = match mode {
                MergeMode::Increment => existing.quantity.saturating_add(line.quantity),
                MergeMode::Replace => line.quantity,
            };
            existing.unit_price = line.unit_price;
            let quantity = existing.quantity;
            if quantity == 0 {
                self.remove(line.product_id, &line.size);
            }
            return quantity;
        }

        if line.quantity == 0 {
            return 0;
        }
        let quantity = line.quantity;
        self.0.push(line);
        quantity
    }

    /// Set the quantity of an existing line. Zero removes it.
    ///
    /// Returns `false` if there is no line for the key.
    pub fn set_quantity(&mut self, product_id: ProductId, size: &Size, quantity: u32) -> bool {
        if quantity == 0 {
            return self.remove(product_id, size);
        }
        match self.0.iter_mut().find(|l| l.same_key(product_id, size)) {
            Some(line) => {
                line.quantity = quantity;
                true
            }
            None => false,
        }
    }

    /// Remove the line for a product and size. Returns whether one existed.
    pub fn remove(&mut self, product_id: ProductId, size: &Size) -> bool {
        let before = self.0.len();
        self.0.retain(|l| !l.same_key(product_id, size));
        self.0.len() != before
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Fold a guest cart into a server cart.
    ///
    /// Every guest line replaces the quantity of the matching server line or
    /// is appended after the existing lines; server-only lines are kept.
    /// Duplicate guest lines collapse, last one wins. The result depends only
    /// on the two inputs.
    #[must_use]
    pub fn merge_guest(server: &Self, guest: impl IntoIterator<Item = CartLine>) -> Self {
        let mut merged = server.clone();
        for line in guest {
            merged.upsert(line, MergeMode::Replace);
        }
        merged
    }

    /// Consume into the underlying lines.
    #[must_use]
    pub fn into_vec(self) -> Vec<CartLine> {
        self.0
    }
}

impl<'a> IntoIterator for &'a CartLines {
    type Item = &'a CartLine;
    type IntoIter = std::slice::Iter<'a, CartLine>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for CartLines {
    type Item = CartLine;
    type IntoIter = std::vec::IntoIter<CartLine>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(product: i32, size: &str, quantity: u32, cents: i64) -> CartLine {
        CartLine {
            product_id: ProductId::new(product),
            size: Size::parse(size).unwrap(),
            quantity,
            unit_price: Price::from_cents(cents),
        }
    }

    #[test]
    fn test_total_is_sum_of_subtotals() {
        let mut cart = CartLines::new();
        cart.upsert(line(1, "M", 2, 100_00), MergeMode::Increment);
        cart.upsert(line(2, "42", 1, 59_90), MergeMode::Increment);
        cart.upsert(line(1, "M", 1, 100_00), MergeMode::Increment);

        let expected: Price = cart.iter().map(|l| l.unit_price.times(l.quantity)).sum();
        assert_eq!(cart.total(), expected);
        assert_eq!(cart.total(), Price::from_cents(359_90));
        assert_eq!(cart.item_count(), 4);
    }

    #[test]
    fn test_increment_adds_quantity() {
        let mut cart = CartLines::new();
        cart.upsert(line(1, "M", 2, 100_00), MergeMode::Increment);
        let qty = cart.upsert(line(1, "m", 3, 100_00), MergeMode::Increment);
        assert_eq!(qty, 5);
        assert_eq!(cart.len(), 1);
    }

    #[test]
    fn test_replace_overwrites_quantity() {
        let mut cart = CartLines::new();
        cart.upsert(line(1, "M", 2, 100_00), MergeMode::Increment);
        let qty = cart.upsert(line(1, "M", 3, 100_00), MergeMode::Replace);
        assert_eq!(qty, 3);
    }

    #[test]
    fn test_upsert_refreshes_price() {
        let mut cart = CartLines::new();
        cart.upsert(line(1, "M", 1, 100_00), MergeMode::Increment);
        cart.upsert(line(1, "M", 1, 80_00), MergeMode::Increment);
        let stored = cart.get(ProductId::new(1), &Size::parse("M").unwrap()).unwrap();
        assert_eq!(stored.unit_price, Price::from_cents(80_00));
    }

    #[test]
    fn test_same_product_different_size_is_separate_line() {
        let mut cart = CartLines::new();
        cart.upsert(line(1, "41", 1, 100_00), MergeMode::Increment);
        cart.upsert(line(1, "42", 1, 100_00), MergeMode::Increment);
        assert_eq!(cart.len(), 2);
    }

    #[test]
    fn test_set_quantity_zero_removes() {
        let mut cart = CartLines::from_lines([line(1, "M", 2, 10_00)]);
        let size = Size::parse("M").unwrap();
        assert!(cart.set_quantity(ProductId::new(1), &size, 0));
        assert!(cart.is_empty());
        assert!(!cart.set_quantity(ProductId::new(1), &size, 1));
    }

    #[test]
    fn test_merge_guest_replaces_and_appends() {
        let server = CartLines::from_lines([line(1, "M", 2, 10_00), line(2, "L", 1, 20_00)]);
        let guest = [line(2, "L", 4, 20_00), line(3, "S", 1, 5_00)];

        let merged = CartLines::merge_guest(&server, guest);
        let lines = merged.into_vec();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], line(1, "M", 2, 10_00));
        assert_eq!(lines[1], line(2, "L", 4, 20_00));
        assert_eq!(lines[2], line(3, "S", 1, 5_00));
    }

    #[test]
    fn test_merge_guest_is_deterministic() {
        let server = CartLines::from_lines([line(1, "M", 2, 10_00)]);
        let guest = vec![line(1, "M", 1, 10_00), line(4, "9", 2, 70_00), line(4, "9", 3, 70_00)];

        let a = CartLines::merge_guest(&server, guest.clone());
        let b = CartLines::merge_guest(&server, guest);
        assert_eq!(a, b);
        assert_eq!(a.item_count(), 1 + 3);
    }

    #[test]
    fn test_merge_guest_into_empty_server_cart() {
        let merged = CartLines::merge_guest(&CartLines::new(), [line(1, "M", 2, 10_00)]);
        assert_eq!(merged.item_count(), 2);
    }

    #[test]
    fn test_zero_quantity_guest_line_is_ignored() {
        let merged = CartLines::merge_guest(&CartLines::new(), [line(1, "M", 0, 10_00)]);
        assert!(merged.is_empty());
    }
}
