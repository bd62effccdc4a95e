//! Seed the product catalog from a YAML (or JSON) file.
//!
//! ```bash
//! sm-cli seed catalog data/catalog.yaml
//! ```
//!
//! The file holds a `products` list in the same shape the admin API
//! accepts. Products are matched by slug, so re-running a seed updates
//! existing rows instead of duplicating them.
//!
//! ```yaml
//! products:
//!   - name: Trail Runner
//!     price: "89.99"
//!     category: running
//!     sizes: ["41", "42", "43"]
//!     stock: { "41": 4, "42": 0, "43": 7 }
//! ```

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};

use solemate_storefront::db::{ProductRepository, RepositoryError};
use solemate_storefront::models::{ProductInput, ProductRecord};

use super::{CommandError, connect};

/// Errors that can occur while seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid catalog file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("{0} invalid products in catalog file")]
    Invalid(usize),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    products: Vec<ProductInput>,
}

/// Parse and validate a catalog document.
///
/// Every product is checked before anything is written; validation
/// failures are logged with the product's position and name.
fn parse_catalog(content: &str) -> Result<Vec<ProductRecord>, SeedError> {
    let file: CatalogFile = serde_yaml::from_str(content)?;

    let mut records = Vec::with_capacity(file.products.len());
    let mut invalid = 0;
    for (index, input) in file.products.into_iter().enumerate() {
        let name = input.name.clone();
        match input.validate() {
            Ok(record) => records.push(record),
            Err(e) => {
                error!("  - product #{} ({name}): {e}", index + 1);
                invalid += 1;
            }
        }
    }

    if invalid > 0 {
        return Err(SeedError::Invalid(invalid));
    }
    Ok(records)
}

/// Upsert every product in `file_path` by slug.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, any product is
/// invalid, or a database write fails.
pub async fn catalog(file_path: &Path) -> Result<(), SeedError> {
    let content = tokio::fs::read_to_string(file_path)
        .await
        .map_err(|source| SeedError::Read {
            path: file_path.display().to_string(),
            source,
        })?;

    info!(path = %file_path.display(), "Loading catalog");
    let records = parse_catalog(&content)?;
    info!(products = records.len(), "Catalog validated");

    let pool = connect().await?;
    let products = ProductRepository::new(&pool);

    let mut created = 0;
    let mut updated = 0;
    for record in &records {
        let (product, inserted) = products.upsert_by_slug(record).await?;
        if inserted {
            created += 1;
        } else {
            updated += 1;
        }
        info!(id = %product.id, slug = %product.slug, inserted, "Product saved");
    }

    info!("Seeding complete!");
    info!("  Products created: {created}");
    info!("  Products updated: {updated}");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_catalog_yaml() {
        let records = parse_catalog(
            r#"
products:
  - name: Trail Runner
    price: "89.99"
    discount_price: "69.99"
    category: running
    sizes: ["41", "42"]
    stock: { "41": 4, "42": 0 }
  - name: City Loafer
    slug: city-loafer-classic
    price: "120.00"
    category: formal
    sizes: ["38"]
"#,
        )
        .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].slug, "trail-runner");
        assert_eq!(records[1].slug, "city-loafer-classic");
        assert!(records[1].is_active);
    }

    #[test]
    fn test_parse_catalog_json() {
        let records = parse_catalog(
            r#"{"products": [{"name": "Kids Sneaker", "price": "35.00", "category": "casual", "sizes": ["30"]}]}"#,
        )
        .unwrap();
        assert_eq!(records[0].slug, "kids-sneaker");
    }

    #[test]
    fn test_parse_catalog_rejects_invalid_products() {
        let err = parse_catalog(
            r#"
products:
  - name: No Sizes
    price: "10.00"
    category: running
    sizes: []
  - name: ""
    price: "10.00"
    category: running
    sizes: ["40"]
"#,
        )
        .unwrap_err();
        assert!(matches!(err, SeedError::Invalid(2)));
    }

    #[test]
    fn test_parse_catalog_requires_products_key() {
        assert!(matches!(
            parse_catalog("- name: Loose"),
            Err(SeedError::Parse(_))
        ));
    }
}
