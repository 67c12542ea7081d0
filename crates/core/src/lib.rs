//! Pasar Core - Domain types and pricing rules.
//!
//! This crate provides the types and pure business rules shared by the
//! storefront server, the CLI and the integration tests:
//! - `storefront` - Cart, checkout, order administration and reviews over HTTP
//! - `cli` - Migrations, seeding and coupon management
//!
//! # Architecture
//!
//! The core crate contains only types, traits and pure functions - no I/O, no
//! database access, no HTTP. Everything that needs the clock receives `now` as
//! an argument so rules can be tested deterministically.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, money, quantities, contacts and statuses
//! - [`cart`] - Session cart with price-at-add snapshots
//! - [`coupon`] - Coupon eligibility checks and discount computation
//! - [`order`] - Order numbers, totals and line specs
//! - [`shipping`] - Flat-threshold shipping rule

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod coupon;
pub mod order;
pub mod shipping;
pub mod types;

pub use cart::{Cart, CartError, CartItem, CartSnapshot};
pub use coupon::{
    Coupon, CouponContext, CouponRejection, CouponScope, Discount, DiscountKind, UsageCounts,
};
pub use order::{LineSpec, OrderNumber, OrderNumberError, OrderTotals};
pub use shipping::ShippingPolicy;
pub use types::*;
