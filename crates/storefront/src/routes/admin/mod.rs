//! Admin route handlers.
//!
//! Every handler takes [`RequireAdmin`](crate::middleware::RequireAdmin), so
//! anonymous requests get `401` and customers get `403`.
//!
//! ```text
//! GET    /api/admin/dashboard
//! GET    /api/admin/orders               ?status=&page=&limit=
//! GET    /api/admin/orders/{id}
//! POST   /api/admin/orders/{id}/status   {"status": "..."}
//! POST   /api/admin/orders/{id}/advance
//! POST   /api/admin/orders/{id}/mark-paid
//! GET    /api/admin/products             same filters as the catalog, inactive included
//! POST   /api/admin/products
//! GET    /api/admin/products/{id}
//! PATCH  /api/admin/products/{id}
//! DELETE /api/admin/products/{id}        soft delete (deactivate)
//! ```

pub mod dashboard;
pub mod orders;
pub mod products;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the admin routes router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard::show))
        .route("/orders", get(orders::index))
        .route("/orders/{id}", get(orders::show))
        .route("/orders/{id}/status", post(orders::set_status))
        .route("/orders/{id}/advance", post(orders::advance))
        .route("/orders/{id}/mark-paid", post(orders::mark_paid))
        .route("/products", get(products::index).post(products::create))
        .route(
            "/products/{id}",
            get(products::show)
                .patch(products::update)
                .delete(products::deactivate),
        )
}
