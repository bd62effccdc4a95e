//! SoleMate Core - Shared domain library.
//!
//! This crate provides the types and rules used across all SoleMate components:
//! - `storefront` - The REST API serving the shop and the admin dashboard
//! - `cli` - Command-line tools for migrations, seeding and role management
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP. Everything that decides *what* happens to a cart or an order
//! lives here so it can be tested without a running database.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices, phones, emails, and statuses
//! - [`stock`] - Per-size stock counts and availability checks
//! - [`cart`] - Cart lines, totals and the guest cart merge
//! - [`pricing`] - Shipping/tax policy and order price breakdowns
//! - [`order`] - Order placement planning, item snapshots and order numbers

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod order;
pub mod pricing;
pub mod stock;
pub mod types;

pub use cart::{CartLine, CartLines, MergeMode};
pub use order::{OrderDraft, OrderItemSnapshot, PlacementError, ProductSnapshot, plan_order};
pub use pricing::{PriceBreakdown, PricingPolicy};
pub use stock::{Availability, Stock, StockError};
pub use types::*;
