//! Domain models for the storefront.
//!
//! These are validated domain types, separate from the database row types in
//! [`crate::db`]. Everything here serializes to the plain JSON the page
//! renderer consumes.

pub mod catalog;
pub mod order;
pub mod review;
pub mod session;

pub use catalog::Product;
pub use order::{
    CouponUsage, FulfillmentChange, NewCouponUsage, NewOrder, NewOrderLine, Order, OrderFilter,
    OrderLine, OrderSummary, PaymentChange, ShippingAddress,
};
pub use review::{NewReview, ProductRating, Review};
pub use session::{CurrentCustomer, keys as session_keys};
