//! Admin back-office route handlers.
//!
//! Every handler takes [`RequireAdmin`](crate::middleware::RequireAdmin), so
//! the whole tree answers 401 without a token and 403 for customers.

pub mod combos;
pub mod dashboard;
pub mod orders;
pub mod products;

use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::state::AppState;

/// Create the `/api/admin` router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard::show))
        .route("/products", get(products::index).post(products::create))
        .route("/products/{id}", get(products::show).patch(products::update))
        .route("/products/{id}/deactivate", post(products::deactivate))
        .route("/products/{id}/stock", post(products::adjust_stock))
        .route("/products/{id}/variants", post(products::add_variant))
        .route(
            "/products/{id}/variants/{variant_id}",
            delete(products::remove_variant),
        )
        .route("/combos", get(combos::index).post(combos::create))
        .route("/combos/{id}", get(combos::show).patch(combos::update))
        .route("/combos/{id}/deactivate", post(combos::deactivate))
        .route("/orders", get(orders::index))
        .route("/orders/{id}", get(orders::show))
        .route("/orders/{id}/status", post(orders::update_status))
}
