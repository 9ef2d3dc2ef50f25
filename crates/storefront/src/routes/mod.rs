//! HTTP route handlers for the storefront API.
//!
//! # Route Structure
//!
//! ```text
//! # Catalog
//! GET    /api/products                  - Product listing (?category, q, sort, page, per_page)
//! GET    /api/products/{slug}           - Product detail
//! GET    /api/categories                - Categories with counts
//! GET    /api/combos                    - Combo listing
//! GET    /api/combos/{slug}             - Combo detail
//!
//! # Cart (guest session or bearer token)
//! GET    /api/cart                      - Reconciled, priced cart
//! DELETE /api/cart                      - Empty the cart
//! POST   /api/cart/items                - Add item
//! PATCH  /api/cart/items                - Set quantity
//! DELETE /api/cart/items                - Remove item
//! POST   /api/cart/merge                - Merge guest cart after sign-in
//!
//! # Orders (requires auth)
//! POST   /api/orders                    - Place order, open payment
//! GET    /api/orders                    - Order history
//! GET    /api/orders/{id}               - Order detail with history
//! POST   /api/orders/{id}/cancel        - Cancel order
//! POST   /api/orders/{id}/retry-payment - New payment for an unpaid order
//!
//! # Payments
//! POST   /api/payments/verify           - Checkout success callback (auth)
//! POST   /api/payments/failure          - Checkout failure callback (auth)
//! POST   /api/payments/webhook          - Gateway webhook (signed)
//!
//! # Account (requires auth)
//! GET    /api/account/me
//! POST   /api/account/sign-out          - Drop cached token, reset cart merge
//! GET    /api/account/addresses
//! POST   /api/account/addresses
//! DELETE /api/account/addresses/{id}
//! POST   /api/account/addresses/{id}/default
//!
//! # Blog
//! GET    /api/blog                      - Published posts (?tag)
//! GET    /api/blog/tags
//! GET    /api/blog/{slug}
//!
//! # Admin (role = admin)
//! /api/admin/...                        - see [`admin::routes`]
//! ```

pub mod account;
pub mod admin;
pub mod blog;
pub mod cart;
pub mod orders;
pub mod payments;
pub mod products;

use axum::{
    Router,
    routing::{delete, get, post},
};
use serde::Deserialize;

use crate::db::Pagination;
use crate::middleware::{api_rate_limiter, payment_rate_limiter};
use crate::state::AppState;

/// `?page=&per_page=` query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageQuery {
    #[must_use]
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.per_page)
    }
}

/// Create the public catalog router.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(products::index))
        .route("/products/{slug}", get(products::show))
        .route("/categories", get(products::categories))
        .route("/combos", get(products::combos))
        .route("/combos/{slug}", get(products::combo))
}

/// Create the cart router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route(
            "/items",
            post(cart::add).patch(cart::update).delete(cart::remove),
        )
        .route("/merge", post(cart::merge))
}

/// Order reads and cancellation.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(orders::index))
        .route("/orders/{id}", get(orders::show))
        .route("/orders/{id}/cancel", post(orders::cancel))
}

/// Endpoints that create gateway orders or record payments.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", post(orders::create))
        .route("/orders/{id}/retry-payment", post(orders::retry_payment))
        .route("/payments/verify", post(payments::verify))
        .route("/payments/failure", post(payments::failure))
}

/// Create the account router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(account::me))
        .route("/sign-out", post(account::sign_out))
        .route(
            "/addresses",
            get(account::addresses).post(account::create_address),
        )
        .route("/addresses/{id}", delete(account::delete_address))
        .route(
            "/addresses/{id}/default",
            post(account::set_default_address),
        )
}

/// Create the blog router.
pub fn blog_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(blog::index))
        .route("/tags", get(blog::tags))
        .route("/{slug}", get(blog::show))
}

/// Create all `/api` routes.
///
/// With `rate_limit` set, checkout and payment callbacks get the strict
/// per-IP limiter and everything else the general one. The gateway
/// webhook is never limited.
pub fn routes(rate_limit: bool) -> Router<AppState> {
    let mut checkout = checkout_routes();
    let mut api = Router::new()
        .merge(catalog_routes())
        .merge(order_routes())
        .nest("/cart", cart_routes())
        .nest("/account", account_routes())
        .nest("/blog", blog_routes())
        .nest("/admin", admin::routes());

    if rate_limit {
        checkout = checkout.layer(payment_rate_limiter());
        api = api.layer(api_rate_limiter());
    }

    let api = api
        .merge(checkout)
        .route("/payments/webhook", post(payments::webhook));

    Router::new().nest("/api", api)
}
