//! Coupon management commands.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;

use pasar_core::{Coupon, CouponScope, Discount, Money};
use pasar_storefront::db::CouponStore;
use pasar_storefront::db::coupons::CouponInput;

use super::{CommandError, connect};

/// Arguments for `coupon create`.
#[derive(Debug, Clone)]
pub struct NewCoupon {
    pub code: String,
    /// Percent off the subtotal; exclusive with `fixed`.
    pub percent: Option<Decimal>,
    pub fixed: Option<Decimal>,
    pub max_discount: Option<Decimal>,
    pub min_purchase: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub usage_limit_per_user: Option<i32>,
    /// Valid from now for this many days.
    pub days: i64,
}

impl NewCoupon {
    fn into_input(self) -> Result<CouponInput, CommandError> {
        let discount = match (self.percent, self.fixed) {
            (Some(rate), None) => {
                if rate <= Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
                    return Err(CommandError::InvalidArgument(
                        "percent must be between 0 and 100".to_owned(),
                    ));
                }
                Discount::Percentage {
                    rate,
                    max_discount: self.max_discount.map(Money::new),
                }
            }
            (None, Some(amount)) => {
                if amount <= Decimal::ZERO {
                    return Err(CommandError::InvalidArgument(
                        "fixed amount must be positive".to_owned(),
                    ));
                }
                if self.max_discount.is_some() {
                    return Err(CommandError::InvalidArgument(
                        "max discount only applies to percentage coupons".to_owned(),
                    ));
                }
                Discount::Fixed {
                    amount: Money::new(amount),
                }
            }
            _ => {
                return Err(CommandError::InvalidArgument(
                    "pass exactly one of --percent or --fixed".to_owned(),
                ));
            }
        };
        if self.days <= 0 {
            return Err(CommandError::InvalidArgument(
                "days must be positive".to_owned(),
            ));
        }

        let now = Utc::now();
        Ok(CouponInput {
            code: Coupon::normalize_code(&self.code),
            discount,
            min_purchase: self.min_purchase.map(Money::new),
            usage_limit: self.usage_limit,
            usage_limit_per_user: self.usage_limit_per_user,
            scope: CouponScope::default(),
            valid_from: now,
            valid_until: now + Duration::days(self.days),
            is_active: true,
        })
    }
}

/// Create an unscoped coupon.
///
/// # Errors
///
/// Returns an error for inconsistent arguments, an existing code, or a
/// database failure.
pub async fn create(args: NewCoupon) -> Result<Coupon, CommandError> {
    let input = args.into_input()?;
    let store = connect().await?;
    let coupon = store.create_coupon(&input).await?;

    tracing::info!(
        code = %coupon.code,
        valid_until = %coupon.valid_until,
        "Coupon created"
    );
    Ok(coupon)
}

/// Log a coupon's definition and how often it has been used.
///
/// # Errors
///
/// Returns an error if the code is unknown or the database fails.
pub async fn show(code: &str) -> Result<(), CommandError> {
    let store = connect().await?;
    let coupon = store
        .coupon_by_code(code)
        .await?
        .ok_or_else(|| CommandError::InvalidArgument(format!("unknown coupon {code}")))?;
    let usage = store.coupon_usage(coupon.id, None).await?;

    tracing::info!("Coupon {}", coupon.code);
    tracing::info!("  Discount: {:?}", coupon.discount);
    tracing::info!("  Valid: {} .. {}", coupon.valid_from, coupon.valid_until);
    tracing::info!("  Active: {}", coupon.is_active);
    match coupon.usage_limit {
        Some(limit) => tracing::info!("  Used: {} of {limit}", usage.total),
        None => tracing::info!("  Used: {}", usage.total),
    }
    Ok(())
}
