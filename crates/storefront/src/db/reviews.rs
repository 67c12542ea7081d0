//! Review persistence for [`PgStore`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use pasar_core::{OrderId, ProductId, Rating, ReviewId, ReviewStatus, UserId};

use super::{PgStore, RepositoryError, ReviewStore, conflict_on_unique};
use crate::models::{NewReview, ProductRating, Review};

const REVIEW_COLUMNS: &str = "id, product_id, order_id, user_id, reviewer_name, rating, body, \
     status, rejection_reason, created_at";

/// Raw `reviews` row.
#[derive(Debug, sqlx::FromRow)]
struct ReviewRow {
    id: ReviewId,
    product_id: ProductId,
    order_id: OrderId,
    user_id: Option<UserId>,
    reviewer_name: String,
    rating: i16,
    body: String,
    status: ReviewStatus,
    rejection_reason: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ReviewRow> for Review {
    type Error = RepositoryError;

    fn try_from(row: ReviewRow) -> Result<Self, Self::Error> {
        let rating = Rating::new(row.rating).map_err(|e| {
            RepositoryError::DataCorruption(format!("review {}: {e}", row.id))
        })?;

        Ok(Self {
            id: row.id,
            product_id: row.product_id,
            order_id: row.order_id,
            user_id: row.user_id,
            reviewer_name: row.reviewer_name,
            rating,
            body: row.body,
            status: row.status,
            rejection_reason: row.rejection_reason,
            created_at: row.created_at,
        })
    }
}

impl ReviewStore for PgStore {
    async fn insert_review(&self, review: &NewReview) -> Result<Review, RepositoryError> {
        let row = sqlx::query_as::<_, ReviewRow>(&format!(
            r"
            INSERT INTO reviews (
                product_id, order_id, user_id, reviewer_name, rating, body, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING {REVIEW_COLUMNS}
            "
        ))
        .bind(review.product_id)
        .bind(review.order_id)
        .bind(review.user_id)
        .bind(&review.reviewer_name)
        .bind(review.rating.get())
        .bind(&review.body)
        .bind(review.created_at)
        .fetch_one(self.pool())
        .await
        .map_err(|e| conflict_on_unique(e, "review for this product and order"))?;

        Review::try_from(row)
    }

    async fn review(&self, id: ReviewId) -> Result<Option<Review>, RepositoryError> {
        let row = sqlx::query_as::<_, ReviewRow>(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        row.map(Review::try_from).transpose()
    }

    async fn set_review_status(
        &self,
        id: ReviewId,
        status: ReviewStatus,
        rejection_reason: Option<&str>,
    ) -> Result<Option<Review>, RepositoryError> {
        let row = sqlx::query_as::<_, ReviewRow>(&format!(
            r"
            UPDATE reviews
            SET status = $2, rejection_reason = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {REVIEW_COLUMNS}
            "
        ))
        .bind(id)
        .bind(status)
        .bind(rejection_reason)
        .fetch_optional(self.pool())
        .await?;

        row.map(Review::try_from).transpose()
    }

    async fn product_rating(&self, product_id: ProductId) -> Result<ProductRating, RepositoryError> {
        let (review_count, average): (i64, Option<Decimal>) = sqlx::query_as(
            r"
            SELECT COUNT(*), ROUND(AVG(rating)::NUMERIC, 1)
            FROM reviews
            WHERE product_id = $1 AND status = 'approved'
            ",
        )
        .bind(product_id)
        .fetch_one(self.pool())
        .await?;

        Ok(ProductRating {
            product_id,
            review_count,
            average,
        })
    }
}
