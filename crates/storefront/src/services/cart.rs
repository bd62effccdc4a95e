//! Cart service.
//!
//! Every write loads the cart, applies one of the core cart operations and
//! saves the whole cart back. Unit prices are always taken from the
//! product's current effective price; prices sent by clients are ignored.

use sqlx::PgPool;
use tracing::instrument;

use solemate_core::{
    Availability, CartLine, CartLines, MergeMode, PricingPolicy, ProductId, Size, UserId,
};

use crate::db::{CartRepository, ProductRepository, RepositoryError};
use crate::models::{
    AddToCart, CartView, GuestCartLine, Product, RemoveCartLine, SkippedLine, SyncCart,
    SyncOutcome, UpdateCartLine,
};

/// Largest quantity a single cart line may hold.
pub const MAX_LINE_QUANTITY: u32 = 99;

/// Errors from cart operations.
#[derive(thiserror::Error, Debug)]
pub enum CartError {
    #[error("product not found")]
    ProductNotFound,

    #[error("product is no longer available")]
    ProductInactive,

    #[error("size {0} is not available for this product")]
    SizeUnavailable(Size),

    #[error("size {0} is out of stock")]
    OutOfStock(Size),

    #[error("only {available} left in size {size}")]
    InsufficientStock { size: Size, available: u32 },

    #[error("quantity must be between 1 and {MAX_LINE_QUANTITY}")]
    InvalidQuantity,

    #[error("item is not in the cart")]
    LineNotFound,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Check that a size of a product can go into a cart at all.
fn check_purchasable(product: &Product, size: &Size) -> Result<(), CartError> {
    if !product.is_active {
        return Err(CartError::ProductInactive);
    }
    if !product.offers_size(size) {
        return Err(CartError::SizeUnavailable(size.clone()));
    }
    if product.availability(size).is_sold_out() {
        return Err(CartError::OutOfStock(size.clone()));
    }
    Ok(())
}

/// Check that `quantity` units of a size can be held in a cart line.
fn check_quantity(product: &Product, size: &Size, quantity: u32) -> Result<(), CartError> {
    if quantity == 0 || quantity > MAX_LINE_QUANTITY {
        return Err(CartError::InvalidQuantity);
    }
    match product.availability(size) {
        Availability::Count(available) if available < quantity => {
            Err(CartError::InsufficientStock {
                size: size.clone(),
                available,
            })
        }
        _ => Ok(()),
    }
}

/// Turn a guest line into a cart line, clamping to stock.
fn accept_guest_line(
    product: Option<&Product>,
    line: &GuestCartLine,
) -> Result<CartLine, CartError> {
    let product = product.ok_or(CartError::ProductNotFound)?;
    check_purchasable(product, &line.size)?;
    if line.quantity == 0 {
        return Err(CartError::InvalidQuantity);
    }

    let quantity = product
        .stock
        .clamp(&line.size, line.quantity)
        .min(MAX_LINE_QUANTITY);
    Ok(CartLine {
        product_id: product.id,
        size: line.size.clone(),
        quantity,
        unit_price: product.effective_price,
    })
}

/// Cart service bound to a pool and a pricing policy.
pub struct CartService<'a> {
    carts: CartRepository<'a>,
    products: ProductRepository<'a>,
    policy: &'a PricingPolicy,
}

impl<'a> CartService<'a> {
    /// Create a new cart service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, policy: &'a PricingPolicy) -> Self {
        Self {
            carts: CartRepository::new(pool),
            products: ProductRepository::new(pool),
            policy,
        }
    }

    /// The user's cart joined with current product details.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if a query fails.
    #[instrument(skip(self))]
    pub async fn view(&self, user_id: UserId) -> Result<CartView, CartError> {
        let lines = self.carts.load(user_id).await?;
        self.render(&lines).await
    }

    /// Number of pairs in the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the query fails.
    pub async fn count(&self, user_id: UserId) -> Result<u32, CartError> {
        Ok(self.carts.load(user_id).await?.item_count())
    }

    /// Add pairs of a product size, incrementing an existing line.
    ///
    /// # Errors
    ///
    /// Returns a `CartError` if the product is missing or inactive, the size
    /// is not offered or sold out, or the resulting quantity exceeds stock
    /// or the per-line limit.
    #[instrument(skip(self, add), fields(product_id = %add.product_id, size = %add.size))]
    pub async fn add(&self, user_id: UserId, add: &AddToCart) -> Result<CartView, CartError> {
        let product = self.product(add.product_id).await?;
        check_purchasable(&product, &add.size)?;
        if add.quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }

        let mut lines = self.carts.load(user_id).await?;
        let existing = lines
            .get(add.product_id, &add.size)
            .map_or(0, |l| l.quantity);
        check_quantity(&product, &add.size, existing.saturating_add(add.quantity))?;

        lines.upsert(
            CartLine {
                product_id: product.id,
                size: add.size.clone(),
                quantity: add.quantity,
                unit_price: product.effective_price,
            },
            MergeMode::Increment,
        );
        self.carts.save(user_id, &lines).await?;
        self.render(&lines).await
    }

    /// Set the quantity of a line. Zero removes it.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` if the line is not in the cart and
    /// a stock or limit error if the quantity cannot be held.
    #[instrument(skip(self, update), fields(product_id = %update.product_id, size = %update.size))]
    pub async fn update(
        &self,
        user_id: UserId,
        update: &UpdateCartLine,
    ) -> Result<CartView, CartError> {
        let mut lines = self.carts.load(user_id).await?;
        if lines.get(update.product_id, &update.size).is_none() {
            return Err(CartError::LineNotFound);
        }

        if update.quantity > 0 {
            let product = self.product(update.product_id).await?;
            check_purchasable(&product, &update.size)?;
            check_quantity(&product, &update.size, update.quantity)?;
        }

        lines.set_quantity(update.product_id, &update.size, update.quantity);
        self.carts.save(user_id, &lines).await?;
        self.render(&lines).await
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` if the line is not in the cart.
    #[instrument(skip(self, remove), fields(product_id = %remove.product_id, size = %remove.size))]
    pub async fn remove(
        &self,
        user_id: UserId,
        remove: &RemoveCartLine,
    ) -> Result<CartView, CartError> {
        let mut lines = self.carts.load(user_id).await?;
        if !lines.remove(remove.product_id, &remove.size) {
            return Err(CartError::LineNotFound);
        }
        self.carts.save(user_id, &lines).await?;
        self.render(&lines).await
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the query fails.
    #[instrument(skip(self))]
    pub async fn clear(&self, user_id: UserId) -> Result<CartView, CartError> {
        self.carts.clear(user_id).await?;
        self.render(&CartLines::new()).await
    }

    /// Merge a guest cart into the user's cart after login.
    ///
    /// Guest lines replace the quantity of matching server lines. Lines for
    /// missing, inactive or sold-out products are skipped and reported;
    /// quantities above stock are clamped.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if a query fails.
    #[instrument(skip(self, sync), fields(guest_lines = sync.items.len()))]
    pub async fn sync(&self, user_id: UserId, sync: &SyncCart) -> Result<SyncOutcome, CartError> {
        let mut ids: Vec<ProductId> = sync.items.iter().map(|l| l.product_id).collect();
        ids.sort_unstable();
        ids.dedup();
        let products = self.products.get_many(&ids).await?;

        let mut accepted = Vec::with_capacity(sync.items.len());
        let mut skipped = Vec::new();
        for line in &sync.items {
            let product = products.iter().find(|p| p.id == line.product_id);
            match accept_guest_line(product, line) {
                Ok(cart_line) => accepted.push(cart_line),
                Err(reason) => skipped.push(SkippedLine {
                    product_id: line.product_id,
                    size: line.size.clone(),
                    reason: reason.to_string(),
                }),
            }
        }

        let server = self.carts.load(user_id).await?;
        let merged = CartLines::merge_guest(&server, accepted);
        if merged != server {
            self.carts.save(user_id, &merged).await?;
        }

        if !skipped.is_empty() {
            tracing::info!(skipped = skipped.len(), "Skipped guest cart lines");
        }

        Ok(SyncOutcome {
            cart: self.render(&merged).await?,
            skipped,
        })
    }

    async fn product(&self, id: ProductId) -> Result<Product, CartError> {
        self.products
            .get_by_id(id)
            .await?
            .ok_or(CartError::ProductNotFound)
    }

    async fn render(&self, lines: &CartLines) -> Result<CartView, CartError> {
        let ids: Vec<ProductId> = lines.iter().map(|l| l.product_id).collect();
        let products = if ids.is_empty() {
            Vec::new()
        } else {
            self.products.get_many(&ids).await?
        };
        Ok(CartView::build(lines, &products, self.policy))
    }
}
