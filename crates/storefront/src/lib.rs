//! SoleMate Storefront library.
//!
//! The REST API for the shop and its admin dashboard, exposed as a library
//! so the router can be exercised from integration tests.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
