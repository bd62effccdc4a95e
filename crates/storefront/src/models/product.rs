//! Catalog product types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use solemate_core::{Availability, Category, Price, ProductId, ProductSnapshot, Size, Stock};

/// Longest accepted product name.
const MAX_NAME_LENGTH: usize = 200;

/// A catalog product.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price: Price,
    pub discount_price: Option<Price>,
    /// Price charged when the product is added to a cart.
    pub effective_price: Price,
    pub on_sale: bool,
    pub category: Category,
    pub images: Vec<String>,
    pub features: Vec<String>,
    pub sizes: Vec<Size>,
    pub stock: Stock,
    pub tags: Vec<String>,
    pub badge: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The discount price when present and lower than the price, otherwise the price.
#[must_use]
pub fn effective_price(price: Price, discount_price: Option<Price>) -> Price {
    match discount_price {
        Some(discount) if discount < price => discount,
        _ => price,
    }
}

impl Product {
    /// Whether the product offers the given size.
    #[must_use]
    pub fn offers_size(&self, size: &Size) -> bool {
        self.sizes.contains(size)
    }

    /// Stock available for a size.
    #[must_use]
    pub fn availability(&self, size: &Size) -> Availability {
        self.stock.available(size)
    }

    /// Snapshot used when planning an order.
    #[must_use]
    pub fn snapshot(&self) -> ProductSnapshot {
        ProductSnapshot {
            id: self.id,
            name: self.name.clone(),
            slug: self.slug.clone(),
            is_active: self.is_active,
            sizes: self.sizes.clone(),
            images: self.images.clone(),
            stock: self.stock.clone(),
        }
    }
}

/// A size running low on stock, for the admin dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct LowStock {
    pub product_id: ProductId,
    pub name: String,
    pub slug: String,
    pub size: Size,
    pub remaining: u32,
}

/// Catalog sort order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Name,
}

impl ProductSort {
    /// SQL `ORDER BY` clause. `id` breaks ties so pages are stable.
    #[must_use]
    pub const fn order_by(self) -> &'static str {
        match self {
            Self::Newest => "p.created_at DESC, p.id DESC",
            Self::PriceAsc => "p.effective_price ASC, p.id ASC",
            Self::PriceDesc => "p.effective_price DESC, p.id DESC",
            Self::Name => "p.name ASC, p.id ASC",
        }
    }
}

/// Catalog filter, as received in a query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    pub category: Option<Category>,
    pub min_price: Option<Price>,
    pub max_price: Option<Price>,
    pub size: Option<Size>,
    #[serde(rename = "q")]
    pub search: Option<String>,
    pub tag: Option<String>,
    pub on_sale: Option<bool>,
    #[serde(default)]
    pub sort: ProductSort,
    /// Admin listings only: include inactive products.
    #[serde(skip)]
    pub include_inactive: bool,
}

impl ProductFilter {
    /// The search term, trimmed, or `None` when blank.
    #[must_use]
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Validation failures for product input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProductInputError {
    #[error("product name is required")]
    EmptyName,
    #[error("product name must be at most {MAX_NAME_LENGTH} characters")]
    NameTooLong,
    #[error("slug must contain only lowercase letters, digits and dashes")]
    InvalidSlug,
    #[error("at least one size is required")]
    NoSizes,
    #[error("discount price must be lower than the price")]
    DiscountNotLower,
    #[error("stock lists size {0} which the product does not offer")]
    StockForUnknownSize(Size),
}

/// A complete product, as written by an admin.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub name: String,
    /// Derived from the name when omitted.
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
    pub price: Price,
    pub discount_price: Option<Price>,
    pub category: Category,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub features: Vec<String>,
    pub sizes: Vec<Size>,
    /// `None` leaves stock untracked.
    pub stock: Option<BTreeMap<Size, u32>>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub badge: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

const fn default_active() -> bool {
    true
}

/// Validated product fields ready to be written.
#[derive(Debug, Clone)]
pub struct ProductRecord {
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price: Price,
    pub discount_price: Option<Price>,
    pub category: Category,
    pub images: Vec<String>,
    pub features: Vec<String>,
    pub sizes: Vec<Size>,
    pub stock: Stock,
    pub tags: Vec<String>,
    pub badge: Option<String>,
    pub is_active: bool,
}

impl ProductInput {
    /// Validate and normalize the input.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure found.
    pub fn validate(self) -> Result<ProductRecord, ProductInputError> {
        let name = self.name.trim().to_owned();
        if name.is_empty() {
            return Err(ProductInputError::EmptyName);
        }
        if name.chars().count() > MAX_NAME_LENGTH {
            return Err(ProductInputError::NameTooLong);
        }

        let slug = match self.slug.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => {
                if !is_valid_slug(s) {
                    return Err(ProductInputError::InvalidSlug);
                }
                s.to_owned()
            }
            _ => slugify(&name),
        };
        if slug.is_empty() {
            return Err(ProductInputError::InvalidSlug);
        }

        let mut sizes = Vec::with_capacity(self.sizes.len());
        for size in self.sizes {
            if !sizes.contains(&size) {
                sizes.push(size);
            }
        }
        if sizes.is_empty() {
            return Err(ProductInputError::NoSizes);
        }

        if let Some(discount) = self.discount_price
            && discount >= self.price
        {
            return Err(ProductInputError::DiscountNotLower);
        }

        let stock = match self.stock {
            Some(counts) => {
                if let Some(size) = counts.keys().find(|s| !sizes.contains(s)) {
                    return Err(ProductInputError::StockForUnknownSize(size.clone()));
                }
                Stock::tracked(counts)
            }
            None => Stock::untracked(),
        };

        Ok(ProductRecord {
            name,
            slug,
            description: self.description.trim().to_owned(),
            price: self.price,
            discount_price: self.discount_price,
            category: self.category,
            images: clean_list(self.images),
            features: clean_list(self.features),
            sizes,
            stock,
            tags: clean_list(self.tags)
                .into_iter()
                .map(|t| t.to_lowercase())
                .collect(),
            badge: self
                .badge
                .map(|b| b.trim().to_owned())
                .filter(|b| !b.is_empty()),
            is_active: self.is_active,
        })
    }
}

impl From<&Product> for ProductInput {
    fn from(product: &Product) -> Self {
        Self {
            name: product.name.clone(),
            slug: Some(product.slug.clone()),
            description: product.description.clone(),
            price: product.price,
            discount_price: product.discount_price,
            category: product.category,
            images: product.images.clone(),
            features: product.features.clone(),
            sizes: product.sizes.clone(),
            stock: product.stock.counts().cloned(),
            tags: product.tags.clone(),
            badge: product.badge.clone(),
            is_active: product.is_active,
        }
    }
}

/// Partial product update. Nullable fields use `Some(None)` to clear.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub price: Option<Price>,
    #[serde(default, deserialize_with = "nullable")]
    pub discount_price: Option<Option<Price>>,
    pub category: Option<Category>,
    pub images: Option<Vec<String>>,
    pub features: Option<Vec<String>>,
    pub sizes: Option<Vec<Size>>,
    #[serde(default, deserialize_with = "nullable")]
    pub stock: Option<Option<BTreeMap<Size, u32>>>,
    pub tags: Option<Vec<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub badge: Option<Option<String>>,
    pub is_active: Option<bool>,
}

impl ProductPatch {
    /// Apply the patch on top of an existing product's fields.
    #[must_use]
    pub fn apply(self, mut input: ProductInput) -> ProductInput {
        if let Some(name) = self.name {
            input.name = name;
        }
        if let Some(slug) = self.slug {
            input.slug = Some(slug);
        }
        if let Some(description) = self.description {
            input.description = description;
        }
        if let Some(price) = self.price {
            input.price = price;
        }
        if let Some(discount_price) = self.discount_price {
            input.discount_price = discount_price;
        }
        if let Some(category) = self.category {
            input.category = category;
        }
        if let Some(images) = self.images {
            input.images = images;
        }
        if let Some(features) = self.features {
            input.features = features;
        }
        if let Some(sizes) = self.sizes {
            input.sizes = sizes;
        }
        if let Some(stock) = self.stock {
            input.stock = stock;
        }
        if let Some(tags) = self.tags {
            input.tags = tags;
        }
        if let Some(badge) = self.badge {
            input.badge = badge;
        }
        if let Some(is_active) = self.is_active {
            input.is_active = is_active;
        }
        input
    }
}

/// Distinguish an absent field from an explicit `null`.
fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn clean_list(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
        .collect()
}

fn is_valid_slug(s: &str) -> bool {
    !s.starts_with('-')
        && !s.ends_with('-')
        && s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Build a URL slug from a product name.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn size(s: &str) -> Size {
        Size::parse(s).unwrap()
    }

    fn input() -> ProductInput {
        ProductInput {
            name: "  Trail Runner 2 ".to_string(),
            slug: None,
            description: "Grippy".to_string(),
            price: Price::from_cents(120_00),
            discount_price: Some(Price::from_cents(99_00)),
            category: Category::Running,
            images: vec!["https://img.test/a.jpg".to_string(), " ".to_string()],
            features: vec![],
            sizes: vec![size("42"), size("43"), size("42")],
            stock: Some(BTreeMap::from([(size("42"), 3)])),
            tags: vec!["New ".to_string()],
            badge: Some(String::new()),
            is_active: true,
        }
    }

    #[test]
    fn test_effective_price() {
        let price = Price::from_cents(100_00);
        assert_eq!(effective_price(price, None), price);
        assert_eq!(
            effective_price(price, Some(Price::from_cents(80_00))),
            Price::from_cents(80_00)
        );
        assert_eq!(effective_price(price, Some(Price::from_cents(120_00))), price);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Trail Runner 2"), "trail-runner-2");
        assert_eq!(slugify("  Café -- Loafer! "), "caf-loafer");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_validate_normalizes() {
        let record = input().validate().unwrap();
        assert_eq!(record.name, "Trail Runner 2");
        assert_eq!(record.slug, "trail-runner-2");
        assert_eq!(record.sizes, vec![size("42"), size("43")]);
        assert_eq!(record.images.len(), 1);
        assert_eq!(record.tags, vec!["new".to_string()]);
        assert!(record.badge.is_none());
        assert!(record.stock.is_tracked());
    }

    #[test]
    fn test_validate_rejects() {
        let mut bad = input();
        bad.name = "  ".to_string();
        assert_eq!(bad.validate().unwrap_err(), ProductInputError::EmptyName);

        let mut bad = input();
        bad.slug = Some("Bad Slug".to_string());
        assert_eq!(bad.validate().unwrap_err(), ProductInputError::InvalidSlug);

        let mut bad = input();
        bad.sizes.clear();
        assert_eq!(bad.validate().unwrap_err(), ProductInputError::NoSizes);

        let mut bad = input();
        bad.discount_price = Some(Price::from_cents(120_00));
        assert_eq!(
            bad.validate().unwrap_err(),
            ProductInputError::DiscountNotLower
        );

        let mut bad = input();
        bad.stock = Some(BTreeMap::from([(size("45"), 1)]));
        assert_eq!(
            bad.validate().unwrap_err(),
            ProductInputError::StockForUnknownSize(size("45"))
        );
    }

    #[test]
    fn test_patch_distinguishes_null_from_absent() {
        let patch: ProductPatch =
            serde_json::from_str(r#"{"discount_price": null, "price": "150.00"}"#).unwrap();
        assert_eq!(patch.discount_price, Some(None));
        assert!(patch.badge.is_none());

        let patched = patch.apply(input());
        assert_eq!(patched.price, Price::from_cents(150_00));
        assert!(patched.discount_price.is_none());
        assert_eq!(patched.badge, Some(String::new()));
    }

    #[test]
    fn test_sort_parses_snake_case() {
        let filter: ProductFilter =
            serde_json::from_str(r#"{"sort": "price_desc", "q": "  "}"#).unwrap();
        assert_eq!(filter.sort, ProductSort::PriceDesc);
        assert!(filter.search_term().is_none());
    }
}
