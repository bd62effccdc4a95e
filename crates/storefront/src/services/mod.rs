//! Business logic services for storefront.
//!
//! Services borrow the pool and combine repository calls with the rules in
//! `solemate_core`. Route handlers stay thin and map service errors onto
//! [`crate::error::AppError`].
//!
//! # Services
//!
//! - `auth` - Registration, login and account self-service
//! - `catalog` - Cached product lookups and listings
//! - `cart` - Cart reads and writes, guest cart sync
//! - `checkout` - Order placement
//! - `orders` - Order lookup and the admin status workflow

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod orders;

pub use auth::{AuthError, AuthService};
pub use cart::{CartError, CartService};
pub use catalog::Catalog;
pub use checkout::{CheckoutError, CheckoutService};
pub use orders::{OrderError, OrderService};
