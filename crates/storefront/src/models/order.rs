//! Order domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use solemate_core::{
    OrderId, OrderItemSnapshot, OrderStatus, PaymentMethod, PaymentStatus, Phone, PhoneError,
    Price, PriceBreakdown, ProductId, Size, UserId,
};

/// Longest accepted value for a single address field.
const MAX_ADDRESS_FIELD: usize = 200;
/// Longest accepted customer note.
const MAX_NOTE_LENGTH: usize = 1000;

/// A placed order with its frozen items.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub pricing: PriceBreakdown,
    pub shipping_address: ShippingAddress,
    pub note: Option<String>,
    pub items: Vec<OrderItem>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// The status the "advance" action would move to.
    #[must_use]
    pub fn next_status(&self) -> Option<OrderStatus> {
        self.status.next()
    }
}

/// An order line as stored on the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub name: String,
    pub slug: String,
    pub size: Size,
    pub quantity: u32,
    pub unit_price: Price,
    pub subtotal: Price,
    pub image: Option<String>,
}

impl From<OrderItemSnapshot> for OrderItem {
    fn from(item: OrderItemSnapshot) -> Self {
        Self {
            subtotal: item.subtotal(),
            product_id: item.product_id,
            name: item.name,
            slug: item.slug,
            size: item.size,
            quantity: item.quantity,
            unit_price: item.unit_price,
            image: item.image,
        }
    }
}

/// Validation failures for a shipping address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{0} is too long")]
    TooLong(&'static str),
    #[error("invalid phone number: {0}")]
    Phone(#[from] PhoneError),
}

/// Where an order ships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub full_name: String,
    pub phone: String,
    pub street: String,
    pub city: String,
    #[serde(default)]
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

impl ShippingAddress {
    /// Trim every field, require all but `state`, and normalize the phone.
    ///
    /// # Errors
    ///
    /// Returns the first missing, oversized or malformed field.
    pub fn validate(self) -> Result<Self, AddressError> {
        let full_name = required("full_name", &self.full_name)?;
        let phone = Phone::parse(&self.phone)?.into_inner();
        let street = required("street", &self.street)?;
        let city = required("city", &self.city)?;
        let state = optional("state", &self.state)?;
        let postal_code = required("postal_code", &self.postal_code)?;
        let country = required("country", &self.country)?;

        Ok(Self {
            full_name,
            phone,
            street,
            city,
            state,
            postal_code,
            country,
        })
    }
}

fn required(field: &'static str, value: &str) -> Result<String, AddressError> {
    let value = optional(field, value)?;
    if value.is_empty() {
        return Err(AddressError::Missing(field));
    }
    Ok(value)
}

fn optional(field: &'static str, value: &str) -> Result<String, AddressError> {
    let value = value.trim();
    if value.chars().count() > MAX_ADDRESS_FIELD {
        return Err(AddressError::TooLong(field));
    }
    Ok(value.to_owned())
}

/// Body of `POST /api/orders`.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrder {
    pub shipping_address: ShippingAddress,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    pub note: Option<String>,
}

impl PlaceOrder {
    /// The trimmed note, or `None` when blank.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::TooLong` for an oversized note.
    pub fn clean_note(&self) -> Result<Option<String>, AddressError> {
        let Some(note) = self.note.as_deref().map(str::trim).filter(|n| !n.is_empty()) else {
            return Ok(None);
        };
        if note.chars().count() > MAX_NOTE_LENGTH {
            return Err(AddressError::TooLong("note"));
        }
        Ok(Some(note.to_owned()))
    }
}

/// Admin order listing filter.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
}

/// Body of `POST /api/admin/orders/{id}/status`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn address() -> ShippingAddress {
        ShippingAddress {
            full_name: " Ada Lovelace ".to_string(),
            phone: "+1 (555) 010-2030".to_string(),
            street: "1 Analytical Way".to_string(),
            city: "London".to_string(),
            state: String::new(),
            postal_code: "N1 9GU".to_string(),
            country: "UK".to_string(),
        }
    }

    #[test]
    fn test_address_normalizes() {
        let address = address().validate().unwrap();
        assert_eq!(address.full_name, "Ada Lovelace");
        assert_eq!(address.phone, "+15550102030");
        assert!(address.state.is_empty());
    }

    #[test]
    fn test_address_requires_fields() {
        let mut bad = address();
        bad.city = "   ".to_string();
        assert_eq!(bad.validate().unwrap_err(), AddressError::Missing("city"));

        let mut bad = address();
        bad.phone = "call me".to_string();
        assert!(matches!(bad.validate(), Err(AddressError::Phone(_))));

        let mut bad = address();
        bad.street = "x".repeat(201);
        assert_eq!(bad.validate().unwrap_err(), AddressError::TooLong("street"));
    }

    #[test]
    fn test_place_order_defaults() {
        let body: PlaceOrder = serde_json::from_value(serde_json::json!({
            "shipping_address": address(),
            "note": "   ",
        }))
        .unwrap();
        assert_eq!(body.payment_method, PaymentMethod::CashOnDelivery);
        assert_eq!(body.clean_note().unwrap(), None);
    }

    #[test]
    fn test_item_subtotal_from_snapshot() {
        let item = OrderItem::from(OrderItemSnapshot {
            product_id: ProductId::new(1),
            name: "Runner".to_string(),
            slug: "runner".to_string(),
            size: Size::parse("42").unwrap(),
            quantity: 2,
            unit_price: Price::from_cents(100_00),
            image: None,
        });
        assert_eq!(item.subtotal, Price::from_cents(200_00));
    }
}
