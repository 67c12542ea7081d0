//! Coupon reads, usage counts and seeding.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::types::Json;

use pasar_core::{
    Coupon, CouponId, CouponScope, Discount, DiscountKind, Money, UsageCounts, UserId,
};

use super::{CouponStore, PgStore, RepositoryError, conflict_on_unique};

const COUPON_COLUMNS: &str = "id, code, kind, value, max_discount, min_purchase, usage_limit, \
     usage_limit_per_user, scope, valid_from, valid_until, is_active";

/// Raw `coupons` row.
#[derive(Debug, sqlx::FromRow)]
struct CouponRow {
    id: CouponId,
    code: String,
    kind: DiscountKind,
    value: Decimal,
    max_discount: Option<Money>,
    min_purchase: Option<Money>,
    usage_limit: Option<i32>,
    usage_limit_per_user: Option<i32>,
    scope: Json<CouponScope>,
    valid_from: DateTime<Utc>,
    valid_until: DateTime<Utc>,
    is_active: bool,
}

impl TryFrom<CouponRow> for Coupon {
    type Error = RepositoryError;

    fn try_from(row: CouponRow) -> Result<Self, Self::Error> {
        let discount = match row.kind {
            DiscountKind::Percentage => {
                if row.value > Decimal::ONE_HUNDRED {
                    return Err(RepositoryError::DataCorruption(format!(
                        "coupon {} has a percentage above 100",
                        row.id
                    )));
                }
                Discount::Percentage {
                    rate: row.value,
                    max_discount: row.max_discount,
                }
            }
            DiscountKind::Fixed => Discount::Fixed {
                amount: Money::new(row.value),
            },
        };

        Ok(Self {
            id: row.id,
            code: row.code,
            discount,
            min_purchase: row.min_purchase,
            usage_limit: row.usage_limit,
            usage_limit_per_user: row.usage_limit_per_user,
            scope: row.scope.0,
            valid_from: row.valid_from,
            valid_until: row.valid_until,
            is_active: row.is_active,
        })
    }
}

/// Coupon fields for `pasar-cli coupon create` and seeding.
#[derive(Debug, Clone, Deserialize)]
pub struct CouponInput {
    pub code: String,
    pub discount: Discount,
    #[serde(default)]
    pub min_purchase: Option<Money>,
    #[serde(default)]
    pub usage_limit: Option<i32>,
    #[serde(default)]
    pub usage_limit_per_user: Option<i32>,
    #[serde(default)]
    pub scope: CouponScope,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

const fn default_active() -> bool {
    true
}

/// Fetch a coupon by normalized code, optionally locking its row.
pub(crate) async fn fetch_coupon<'e, E>(
    executor: E,
    code: &str,
    for_update: bool,
) -> Result<Option<Coupon>, RepositoryError>
where
    E: sqlx::PgExecutor<'e>,
{
    let lock = if for_update { " FOR UPDATE" } else { "" };
    let row = sqlx::query_as::<_, CouponRow>(&format!(
        "SELECT {COUPON_COLUMNS} FROM coupons WHERE UPPER(code) = $1{lock}"
    ))
    .bind(Coupon::normalize_code(code))
    .fetch_optional(executor)
    .await?;

    row.map(Coupon::try_from).transpose()
}

/// Count redemptions of a coupon, overall and by one user.
pub(crate) async fn count_usage<'e, E>(
    executor: E,
    coupon_id: CouponId,
    user_id: Option<UserId>,
) -> Result<UsageCounts, RepositoryError>
where
    E: sqlx::PgExecutor<'e>,
{
    let (total, by_user): (i64, i64) = sqlx::query_as(
        r"
        SELECT
            COUNT(*),
            COUNT(*) FILTER (WHERE $2::BIGINT IS NOT NULL AND user_id = $2)
        FROM coupon_usages
        WHERE coupon_id = $1
        ",
    )
    .bind(coupon_id)
    .bind(user_id)
    .fetch_one(executor)
    .await?;

    Ok(UsageCounts { total, by_user })
}

impl CouponStore for PgStore {
    async fn coupon_by_code(&self, code: &str) -> Result<Option<Coupon>, RepositoryError> {
        fetch_coupon(self.pool(), code, false).await
    }

    async fn coupon_usage(
        &self,
        coupon_id: CouponId,
        user_id: Option<UserId>,
    ) -> Result<UsageCounts, RepositoryError> {
        count_usage(self.pool(), coupon_id, user_id).await
    }
}

impl PgStore {
    /// Create a coupon.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the code is already in use.
    pub async fn create_coupon(&self, input: &CouponInput) -> Result<Coupon, RepositoryError> {
        let (value, max_discount) = match input.discount {
            Discount::Percentage { rate, max_discount } => (rate, max_discount),
            Discount::Fixed { amount } => (amount.amount(), None),
        };

        let row = sqlx::query_as::<_, CouponRow>(&format!(
            r"
            INSERT INTO coupons (
                code, kind, value, max_discount, min_purchase, usage_limit,
                usage_limit_per_user, scope, valid_from, valid_until, is_active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {COUPON_COLUMNS}
            "
        ))
        .bind(Coupon::normalize_code(&input.code))
        .bind(input.discount.kind())
        .bind(value)
        .bind(max_discount)
        .bind(input.min_purchase)
        .bind(input.usage_limit)
        .bind(input.usage_limit_per_user)
        .bind(Json(&input.scope))
        .bind(input.valid_from)
        .bind(input.valid_until)
        .bind(input.is_active)
        .fetch_one(self.pool())
        .await
        .map_err(|e| conflict_on_unique(e, "coupon code"))?;

        Coupon::try_from(row)
    }
}
