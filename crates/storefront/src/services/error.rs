//! Service error types.

use thiserror::Error;

use pasar_core::{CartError, CouponRejection};

use crate::db::RepositoryError;

/// Errors returned by the storefront services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Input failed validation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced entity does not exist (or is not visible to the caller).
    #[error("{0} not found")]
    NotFound(String),

    /// Checkout was attempted with nothing in the cart.
    #[error("cart is empty")]
    EmptyCart,

    /// The coupon exists but cannot be applied.
    #[error("coupon cannot be applied: {0}")]
    CouponInvalid(CouponRejection),

    /// The request conflicts with current state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Repository/database error.
    #[error("persistence error: {0}")]
    Persistence(#[from] RepositoryError),
}

impl From<CartError> for ServiceError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::ItemNotFound(id) => Self::NotFound(format!("cart item {id}")),
            CartError::Quantity(e) => Self::Validation(e.to_string()),
        }
    }
}

impl From<CouponRejection> for ServiceError {
    fn from(rejection: CouponRejection) -> Self {
        Self::CouponInvalid(rejection)
    }
}
