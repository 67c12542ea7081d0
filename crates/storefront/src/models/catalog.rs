//! Catalog types read by the cart and checkout.
//!
//! The catalog itself (product CRUD, images) is managed elsewhere; the
//! pipeline only looks products up and reserves stock.

use serde::{Deserialize, Serialize};

use pasar_core::{CategoryId, Money, ProductId, Quantity};

/// A sellable product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: ProductId,
    pub category_id: Option<CategoryId>,
    pub name: String,
    pub sku: String,
    /// Current unit price.
    pub price: Money,
    /// Units on hand.
    pub stock: i32,
    /// Image path in the blob store.
    pub image: Option<String>,
    /// Hidden products cannot be added to carts or ordered.
    pub is_active: bool,
}

impl Product {
    /// Whether `quantity` units can be taken from stock.
    #[must_use]
    pub fn has_stock_for(&self, quantity: Quantity) -> bool {
        i64::from(self.stock) >= i64::from(quantity.get())
    }
}
