//! Product review types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use pasar_core::{OrderId, ProductId, Rating, ReviewId, ReviewStatus, UserId};

/// A product review tied to the order it was bought in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub order_id: OrderId,
    pub user_id: Option<UserId>,
    pub reviewer_name: String,
    pub rating: Rating,
    pub body: String,
    pub status: ReviewStatus,
    /// Set when a moderator rejects the review.
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Review to insert.
#[derive(Debug, Clone)]
pub struct NewReview {
    pub product_id: ProductId,
    pub order_id: OrderId,
    pub user_id: Option<UserId>,
    pub reviewer_name: String,
    pub rating: Rating,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Approved-review summary for a product page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRating {
    pub product_id: ProductId,
    pub review_count: i64,
    /// Mean rating, one decimal place; `None` without approved reviews.
    pub average: Option<Decimal>,
}
