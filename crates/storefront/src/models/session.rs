//! Session-related types.
//!
//! Types stored in the session for the cart and customer identity. The
//! session itself is managed by tower-sessions; logging in is handled by the
//! auth service, which writes [`CurrentCustomer`] under
//! [`keys::CURRENT_CUSTOMER`].

use serde::{Deserialize, Serialize};

use pasar_core::{Email, UserId};

/// Session-stored identity of a logged-in customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentCustomer {
    /// Account ID from the auth service.
    pub id: UserId,
    pub name: String,
    pub email: Email,
}

/// Session keys.
pub mod keys {
    /// Key for the current logged-in customer.
    pub const CURRENT_CUSTOMER: &str = "current_customer";

    /// Key for the shopper's cart.
    pub const CART: &str = "cart";
}
