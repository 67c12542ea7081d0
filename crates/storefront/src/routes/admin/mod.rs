//! Admin route handlers for order fulfillment and review moderation.
//!
//! Mounted under `/admin` behind [`crate::middleware::require_admin`].

pub mod orders;
pub mod reviews;
