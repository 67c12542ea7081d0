//! Apply-coupon price preview.
//!
//! Previews read the coupon and usage counts without locks and record
//! nothing; the order assembler validates again under lock at checkout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use pasar_core::{
    Cart, CategoryId, Coupon, CouponContext, CouponRejection, Money, ProductId, ShippingPolicy,
    UserId,
};

use super::ServiceError;
use crate::db::{CatalogStore, CouponStore};

/// Result of previewing a coupon against the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponPreview {
    pub code: String,
    pub valid: bool,
    /// Why the coupon cannot be used, when `valid` is false.
    pub reason: Option<CouponRejection>,
    pub subtotal: Money,
    pub discount: Money,
    pub shipping: Money,
    pub total: Money,
}

/// Price the cart as if `code` were applied.
///
/// # Errors
///
/// Returns `ServiceError::EmptyCart` for an empty cart and
/// `ServiceError::NotFound` for an unknown code.
#[instrument(skip(store, cart, shipping), fields(coupon = %code))]
pub async fn preview<S>(
    store: &S,
    cart: &Cart,
    code: &str,
    user_id: Option<UserId>,
    shipping: &ShippingPolicy,
    now: DateTime<Utc>,
) -> Result<CouponPreview, ServiceError>
where
    S: CatalogStore + CouponStore,
{
    if cart.is_empty() {
        return Err(ServiceError::EmptyCart);
    }
    let coupon = store
        .coupon_by_code(code)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("coupon {}", Coupon::normalize_code(code))))?;

    let mut product_ids: Vec<ProductId> = cart.items().iter().map(|i| i.product_id).collect();
    product_ids.sort_unstable();
    product_ids.dedup();
    let mut category_ids: Vec<CategoryId> = store
        .products(&product_ids)
        .await?
        .into_iter()
        .filter_map(|p| p.category_id)
        .collect();
    category_ids.sort_unstable();
    category_ids.dedup();

    let subtotal = cart.subtotal();
    let usage = store.coupon_usage(coupon.id, user_id).await?;
    let context = CouponContext {
        user_id,
        subtotal,
        category_ids: &category_ids,
        product_ids: &product_ids,
    };

    let (reason, discount) = match coupon.validate(&context, usage, now) {
        Ok(()) => (None, coupon.compute_discount(subtotal)),
        Err(rejection) => (Some(rejection), Money::ZERO),
    };
    let shipping = shipping.cost_for(subtotal);

    Ok(CouponPreview {
        code: coupon.code,
        valid: reason.is_none(),
        reason,
        subtotal,
        discount,
        shipping,
        total: subtotal - discount + shipping,
    })
}
