//! Coupon eligibility and discount computation.
//!
//! Everything here is pure: the caller supplies the current usage counts and
//! the clock. Recording a redemption (and therefore bumping the counts) is the
//! checkout transaction's job.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{CategoryId, CouponId, Money, ProductId, UserId};

/// Storage discriminator for [`Discount`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "discount_kind", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    Percentage,
    Fixed,
}

/// What a coupon takes off the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Discount {
    /// `rate` percent of the subtotal, optionally capped.
    Percentage {
        rate: Decimal,
        max_discount: Option<Money>,
    },
    /// A fixed amount.
    Fixed { amount: Money },
}

impl Discount {
    #[must_use]
    pub const fn kind(&self) -> DiscountKind {
        match self {
            Self::Percentage { .. } => DiscountKind::Percentage,
            Self::Fixed { .. } => DiscountKind::Fixed,
        }
    }
}

/// Allow-lists restricting who and what a coupon applies to.
///
/// An empty list means "no restriction" on that dimension. Stored as a JSON
/// document next to the coupon.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponScope {
    #[serde(default)]
    pub users: Vec<UserId>,
    #[serde(default)]
    pub categories: Vec<CategoryId>,
    #[serde(default)]
    pub products: Vec<ProductId>,
}

/// A coupon definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: CouponId,
    /// Normalized (trimmed, uppercase) code.
    pub code: String,
    pub discount: Discount,
    /// Minimum order subtotal.
    pub min_purchase: Option<Money>,
    /// Maximum redemptions across all customers.
    pub usage_limit: Option<i32>,
    /// Maximum redemptions per registered customer.
    pub usage_limit_per_user: Option<i32>,
    pub scope: CouponScope,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub is_active: bool,
}

/// The order a coupon is being evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct CouponContext<'a> {
    pub user_id: Option<UserId>,
    pub subtotal: Money,
    pub category_ids: &'a [CategoryId],
    pub product_ids: &'a [ProductId],
}

/// Redemptions recorded so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounts {
    /// Across all customers.
    pub total: i64,
    /// By the customer placing the order (0 for guests).
    pub by_user: i64,
}

/// Why a coupon cannot be used.
///
/// Variants are listed in the order the checks run.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum CouponRejection {
    #[error("coupon is not active")]
    Inactive,
    #[error("coupon is not valid yet")]
    NotYetValid,
    #[error("coupon has expired")]
    Expired,
    #[error("minimum purchase of {minimum} not met")]
    BelowMinimumPurchase { minimum: Money },
    #[error("coupon usage limit reached")]
    UsageLimitReached,
    #[error("you have already used this coupon the maximum number of times")]
    PerUserLimitReached,
    #[error("coupon is not available for this account")]
    UserNotEligible,
    #[error("coupon does not apply to these product categories")]
    CategoryNotEligible,
    #[error("coupon does not apply to these products")]
    ProductNotEligible,
}

impl Coupon {
    /// Canonical form of a code as typed by a shopper.
    #[must_use]
    pub fn normalize_code(code: &str) -> String {
        code.trim().to_uppercase()
    }

    /// Check whether the coupon may be applied to an order.
    ///
    /// Checks run in a fixed order and stop at the first failure, so the
    /// reported reason is deterministic: active flag, validity window, minimum
    /// purchase, global cap, per-user cap, user, category and product
    /// allow-lists.
    ///
    /// # Errors
    ///
    /// Returns the first [`CouponRejection`] that applies.
    pub fn validate(
        &self,
        order: &CouponContext<'_>,
        usage: UsageCounts,
        now: DateTime<Utc>,
    ) -> Result<(), CouponRejection> {
        if !self.is_active {
            return Err(CouponRejection::Inactive);
        }
        if now < self.valid_from {
            return Err(CouponRejection::NotYetValid);
        }
        if now > self.valid_until {
            return Err(CouponRejection::Expired);
        }
        if let Some(minimum) = self.min_purchase
            && order.subtotal < minimum
        {
            return Err(CouponRejection::BelowMinimumPurchase { minimum });
        }
        if let Some(limit) = self.usage_limit
            && usage.total >= i64::from(limit)
        {
            return Err(CouponRejection::UsageLimitReached);
        }
        // Guests cannot be tracked across orders, so the per-user cap only
        // binds registered customers.
        if let (Some(limit), Some(_)) = (self.usage_limit_per_user, order.user_id)
            && usage.by_user >= i64::from(limit)
        {
            return Err(CouponRejection::PerUserLimitReached);
        }
        if !self.scope.users.is_empty()
            && !order
                .user_id
                .is_some_and(|user| self.scope.users.contains(&user))
        {
            return Err(CouponRejection::UserNotEligible);
        }
        if !self.scope.categories.is_empty()
            && !order
                .category_ids
                .iter()
                .any(|category| self.scope.categories.contains(category))
        {
            return Err(CouponRejection::CategoryNotEligible);
        }
        if !self.scope.products.is_empty()
            && !order
                .product_ids
                .iter()
                .any(|product| self.scope.products.contains(product))
        {
            return Err(CouponRejection::ProductNotEligible);
        }
        Ok(())
    }

    /// Discount for an order with this subtotal.
    ///
    /// Never negative and never more than `subtotal`.
    #[must_use]
    pub fn compute_discount(&self, subtotal: Money) -> Money {
        let amount = match self.discount {
            Discount::Percentage { rate, max_discount } => {
                let raw = subtotal.percent(rate);
                max_discount.map_or(raw, |cap| raw.min(cap))
            }
            Discount::Fixed { amount } => amount,
        };
        amount.max(Money::ZERO).min(subtotal.max(Money::ZERO))
    }
}
