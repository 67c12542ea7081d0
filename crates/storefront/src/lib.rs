//! Pasar storefront library.
//!
//! The server's handlers, services and stores as a library, so the binary,
//! the CLI and the integration tests share one implementation.
//!
//! # Layers
//!
//! - [`routes`] - Axum handlers; parse forms, call services, render JSON
//! - [`services`] - Cart, coupon preview, checkout, order lifecycle, reviews
//! - [`db`] - Store traits with `PostgreSQL` and in-memory implementations

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
