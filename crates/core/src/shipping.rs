//! Flat-threshold shipping rule.

use serde::{Deserialize, Serialize};

use crate::types::Money;

/// Free shipping at or above a subtotal threshold, a flat fee below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingPolicy {
    /// Subtotal at which shipping becomes free.
    pub free_threshold: Money,
    /// Fee charged below the threshold.
    pub flat_fee: Money,
}

impl ShippingPolicy {
    #[must_use]
    pub const fn new(free_threshold: Money, flat_fee: Money) -> Self {
        Self {
            free_threshold,
            flat_fee,
        }
    }

    /// Shipping cost for an order with this subtotal.
    ///
    /// The threshold is inclusive: a subtotal equal to it ships free.
    /// An empty subtotal ships nothing, so it costs nothing.
    #[must_use]
    pub fn cost_for(&self, subtotal: Money) -> Money {
        if subtotal == Money::ZERO || subtotal >= self.free_threshold {
            Money::ZERO
        } else {
            self.flat_fee
        }
    }
}

impl Default for ShippingPolicy {
    fn default() -> Self {
        Self::new(Money::from_units(400_000), Money::from_units(25_000))
    }
}
