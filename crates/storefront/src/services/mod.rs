//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `cart` - Session cart operations backed by the catalog
//! - `coupons` - Apply-coupon price preview
//! - `checkout` - Order assembly (one transaction per order)
//! - `lifecycle` - Fulfillment and payment transitions, deletion
//! - `reviews` - Review gating and moderation
//!
//! Services are generic over the store traits in [`crate::db`] so they run the
//! same against `PgStore` and `MemoryStore`.

pub mod cart;
pub mod checkout;
pub mod coupons;
mod error;
pub mod lifecycle;
pub mod reviews;

pub use error::ServiceError;

#[cfg(test)]
pub(crate) mod fixtures;
