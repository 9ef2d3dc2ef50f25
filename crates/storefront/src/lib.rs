//! MilletMart storefront API.
//!
//! The JSON API behind the MilletMart shop: catalog, carts, checkout,
//! payments, accounts, blog and the admin back-office. Built as a library
//! so the router can be driven from tests; `main.rs` only wires it to a
//! socket.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod app;
pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod razorpay;
pub mod routes;
pub mod services;
pub mod state;

pub use app::build_router;
