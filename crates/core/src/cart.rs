//! Session cart.
//!
//! A [`Cart`] lives in the shopper's session (anonymous or logged in) and is
//! never written to the orders tables. Each line snapshots the catalog price at
//! the moment it was added; later catalog edits do not reprice the cart.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shipping::ShippingPolicy;
use crate::types::{Money, ProductId, Quantity, QuantityError};

/// Errors from cart mutations.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CartError {
    /// No line with this ID exists in the cart.
    #[error("cart item {0} not found")]
    ItemNotFound(String),
    /// Merging quantities would exceed the per-line maximum.
    #[error(transparent)]
    Quantity(#[from] QuantityError),
}

/// One line of the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Opaque line ID, unique within the cart.
    pub id: String,
    pub product_id: ProductId,
    pub quantity: Quantity,
    /// Unit price at the time the product was first added.
    pub price_at_add: Money,
    /// Chosen variant (e.g. a colour), part of the line identity.
    pub variant: Option<String>,
    /// Free-text note from the shopper.
    pub note: Option<String>,
}

impl CartItem {
    /// `price_at_add × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.price_at_add.times(self.quantity)
    }
}

/// Priced view of a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub items: Vec<CartItem>,
    pub subtotal: Money,
    pub shipping_estimate: Money,
    pub total: Money,
}

impl CartSnapshot {
    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity.get()).sum()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// The shopper's cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Find the line for a product/variant pair.
    #[must_use]
    pub fn find(&self, product_id: ProductId, variant: Option<&str>) -> Option<&CartItem> {
        self.items
            .iter()
            .find(|item| item.product_id == product_id && item.variant.as_deref() == variant)
    }

    /// Add `quantity` of a product at `unit_price`.
    ///
    /// If a line for the same product and variant exists its quantity is
    /// increased (its price snapshot is kept, and a new note replaces the old
    /// one); otherwise a new line with a fresh ID is appended.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Quantity` if the merged quantity is too large.
    pub fn add_item(
        &mut self,
        product_id: ProductId,
        unit_price: Money,
        quantity: Quantity,
        variant: Option<String>,
        note: Option<String>,
    ) -> Result<&CartItem, CartError> {
        let existing = self
            .items
            .iter()
            .position(|item| item.product_id == product_id && item.variant == variant);

        let index = match existing {
            Some(index) => {
                let item = self
                    .items
                    .get_mut(index)
                    .ok_or_else(|| CartError::ItemNotFound(product_id.to_string()))?;
                item.quantity = item.quantity.checked_add(quantity)?;
                if note.is_some() {
                    item.note = note;
                }
                index
            }
            None => {
                self.items.push(CartItem {
                    id: Uuid::new_v4().to_string(),
                    product_id,
                    quantity,
                    price_at_add: unit_price,
                    variant,
                    note,
                });
                self.items.len() - 1
            }
        };

        self.items
            .get(index)
            .ok_or_else(|| CartError::ItemNotFound(product_id.to_string()))
    }

    /// Set the quantity of an existing line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ItemNotFound` if no line has this ID.
    pub fn update_quantity(&mut self, item_id: &str, quantity: Quantity) -> Result<(), CartError> {
        let item = self
            .items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or_else(|| CartError::ItemNotFound(item_id.to_owned()))?;
        item.quantity = quantity;
        Ok(())
    }

    /// Remove a line. Removing an unknown ID is a no-op.
    pub fn remove_item(&mut self, item_id: &str) {
        self.items.retain(|item| item.id != item_id);
    }

    /// `Σ price_at_add × quantity`.
    #[must_use]
    pub fn subtotal(&self) -> Money {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Priced view of the cart under a shipping policy.
    #[must_use]
    pub fn snapshot(&self, shipping: &ShippingPolicy) -> CartSnapshot {
        let subtotal = self.subtotal();
        let shipping_estimate = shipping.cost_for(subtotal);
        CartSnapshot {
            items: self.items.clone(),
            subtotal,
            shipping_estimate,
            total: subtotal + shipping_estimate,
        }
    }

    /// Empty the cart.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}
