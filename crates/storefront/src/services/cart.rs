//! Session cart operations.
//!
//! The cart itself is a plain value from the session; these functions check
//! requests against the catalog before mutating it. Persisting the cart back
//! to the session is the route's job.

use tracing::instrument;

use pasar_core::{Cart, CartItem, CartSnapshot, ProductId, Quantity, ShippingPolicy};

use super::ServiceError;
use crate::db::CatalogStore;

/// Add `quantity` units of a product, snapshotting its current price.
///
/// # Errors
///
/// Returns `ServiceError::NotFound` if the product does not exist or is
/// inactive, `ServiceError::Conflict` if the cart would then hold more units
/// of the product than are in stock, and `ServiceError::Validation` if the
/// merged line quantity is too large.
#[instrument(skip(catalog, cart, note), fields(product_id = %product_id, quantity = quantity.get()))]
pub async fn add_item<C: CatalogStore>(
    catalog: &C,
    cart: &mut Cart,
    product_id: ProductId,
    quantity: Quantity,
    variant: Option<String>,
    note: Option<String>,
) -> Result<CartItem, ServiceError> {
    let product = catalog
        .product(product_id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| ServiceError::NotFound(format!("product {product_id}")))?;

    // Stock is per product, across every variant line.
    let in_cart: u64 = cart
        .items()
        .iter()
        .filter(|item| item.product_id == product_id)
        .map(|item| u64::from(item.quantity.get()))
        .sum();
    let wanted = in_cart + u64::from(quantity.get());
    if wanted > u64::try_from(product.stock).unwrap_or(0) {
        return Err(ServiceError::Conflict(format!(
            "only {} of {} in stock",
            product.stock, product.name
        )));
    }

    let item = cart.add_item(product_id, product.price, quantity, variant, note)?;
    Ok(item.clone())
}

/// Set the quantity of a cart line.
///
/// # Errors
///
/// Returns `ServiceError::NotFound` if the line does not exist.
pub fn update_quantity(
    cart: &mut Cart,
    item_id: &str,
    quantity: Quantity,
) -> Result<(), ServiceError> {
    cart.update_quantity(item_id, quantity)?;
    Ok(())
}

/// Remove a cart line. Unknown IDs are ignored.
pub fn remove_item(cart: &mut Cart, item_id: &str) {
    cart.remove_item(item_id);
}

/// Priced view of the cart.
#[must_use]
pub fn snapshot(cart: &Cart, shipping: &ShippingPolicy) -> CartSnapshot {
    cart.snapshot(shipping)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::services::fixtures;
    use pasar_core::Money;

    #[tokio::test]
    async fn test_add_item_snapshots_catalog_price() {
        let store = MemoryStore::new();
        let product = store.add_product(fixtures::product("Batik Tulis", 150_000, 10)).await;
        let mut cart = Cart::new();

        let item = add_item(&store, &mut cart, product.id, Quantity::ONE, None, None)
            .await
            .unwrap();

        assert_eq!(item.price_at_add, Money::from_units(150_000));
        assert_eq!(cart.items().len(), 1);
    }

    #[tokio::test]
    async fn test_repeated_adds_merge_into_one_line() {
        let store = MemoryStore::new();
        let product = store.add_product(fixtures::product("Batik Tulis", 150_000, 10)).await;
        let mut cart = Cart::new();

        add_item(&store, &mut cart, product.id, Quantity::ONE, None, None)
            .await
            .unwrap();
        let item = add_item(&store, &mut cart, product.id, Quantity::new(2).unwrap(), None, None)
            .await
            .unwrap();

        assert_eq!(cart.items().len(), 1);
        assert_eq!(item.quantity.get(), 3);
    }

    #[tokio::test]
    async fn test_add_item_rejects_unknown_and_inactive_products() {
        let store = MemoryStore::new();
        let mut hidden = fixtures::product("Tas Rotan", 90_000, 4);
        hidden.is_active = false;
        let hidden = store.add_product(hidden).await;
        let mut cart = Cart::new();

        let missing = add_item(&store, &mut cart, ProductId::new(999), Quantity::ONE, None, None).await;
        assert!(matches!(missing, Err(ServiceError::NotFound(_))));

        let inactive = add_item(&store, &mut cart, hidden.id, Quantity::ONE, None, None).await;
        assert!(matches!(inactive, Err(ServiceError::NotFound(_))));
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn test_add_item_counts_stock_across_variants() {
        let store = MemoryStore::new();
        let product = store.add_product(fixtures::product("Kain Songket", 300_000, 3)).await;
        let mut cart = Cart::new();

        add_item(&store, &mut cart, product.id, Quantity::new(2).unwrap(), Some("merah".into()), None)
            .await
            .unwrap();
        let result = add_item(
            &store,
            &mut cart,
            product.id,
            Quantity::new(2).unwrap(),
            Some("biru".into()),
            None,
        )
        .await;

        assert!(matches!(result, Err(ServiceError::Conflict(_))));
        assert_eq!(cart.items().len(), 1);
    }

    #[test]
    fn test_update_quantity_unknown_line() {
        let mut cart = Cart::new();
        let result = update_quantity(&mut cart, "nope", Quantity::ONE);
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }
}
