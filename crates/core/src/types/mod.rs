//! Core types for Pasar.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod contact;
pub mod id;
pub mod money;
pub mod quantity;
pub mod rating;
pub mod status;

pub use contact::{Customer, Email, EmailError, GuestContact};
pub use id::*;
pub use money::Money;
pub use quantity::{Quantity, QuantityError};
pub use rating::{Rating, RatingError};
pub use status::*;
