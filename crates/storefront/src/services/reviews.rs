//! Review submission gate and moderation.

use chrono::{DateTime, Utc};
use tracing::instrument;

use pasar_core::{
    Customer, Email, FulfillmentStatus, OrderId, ProductId, Rating, ReviewId, ReviewStatus, UserId,
};

use super::ServiceError;
use crate::db::{OrderStore, RepositoryError, ReviewStore};
use crate::models::{NewReview, ProductRating, Review};

/// Longest accepted review body, in characters.
pub const MAX_BODY_CHARS: usize = 2_000;

/// Who is writing a review.
#[derive(Debug, Clone)]
pub enum ReviewAuthor {
    /// A logged-in customer.
    Customer { user_id: UserId, name: String },
    /// A guest, identified by the email used at checkout.
    Guest { name: String, email: Email },
}

impl ReviewAuthor {
    fn owns(&self, customer: &Customer) -> bool {
        match (self, customer) {
            (Self::Customer { user_id, .. }, Customer::Registered { user_id: owner }) => {
                user_id == owner
            }
            (Self::Guest { email, .. }, Customer::Guest(contact)) => *email == contact.email,
            _ => false,
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::Customer { name, .. } | Self::Guest { name, .. } => name,
        }
    }

    const fn user_id(&self) -> Option<UserId> {
        match self {
            Self::Customer { user_id, .. } => Some(*user_id),
            Self::Guest { .. } => None,
        }
    }
}

/// A review as submitted.
#[derive(Debug, Clone)]
pub struct ReviewSubmission {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub author: ReviewAuthor,
    pub rating: Rating,
    pub body: String,
}

/// Submit a review for a product bought in a completed order.
///
/// The review starts out pending moderation.
///
/// # Errors
///
/// - `NotFound` if the order does not exist or does not belong to the author
/// - `Conflict` if the order is not completed, or the product was already
///   reviewed for this order
/// - `Validation` if the product is not part of the order or the body is
///   empty or too long
#[instrument(
    skip(store, submission),
    fields(order_id = %submission.order_id, product_id = %submission.product_id)
)]
pub async fn submit_review<S>(
    store: &S,
    submission: ReviewSubmission,
    now: DateTime<Utc>,
) -> Result<Review, ServiceError>
where
    S: OrderStore + ReviewStore,
{
    let not_found = || ServiceError::NotFound(format!("order {}", submission.order_id));

    // Someone else's order is reported as missing, not as forbidden.
    let order = store
        .order(submission.order_id)
        .await?
        .filter(|order| submission.author.owns(&order.customer))
        .ok_or_else(not_found)?;

    if order.fulfillment_status != FulfillmentStatus::Completed {
        return Err(ServiceError::Conflict(format!(
            "order {} is not completed yet",
            order.order_number
        )));
    }
    if !order.contains_product(submission.product_id) {
        return Err(ServiceError::Validation(format!(
            "product {} is not part of order {}",
            submission.product_id, order.order_number
        )));
    }

    let body = submission.body.trim();
    if body.is_empty() {
        return Err(ServiceError::Validation("review text is required".to_owned()));
    }
    if body.chars().count() > MAX_BODY_CHARS {
        return Err(ServiceError::Validation(format!(
            "review text is limited to {MAX_BODY_CHARS} characters"
        )));
    }

    let review = store
        .insert_review(&NewReview {
            product_id: submission.product_id,
            order_id: order.id,
            user_id: submission.author.user_id(),
            reviewer_name: submission.author.name().trim().to_owned(),
            rating: submission.rating,
            body: body.to_owned(),
            created_at: now,
        })
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => ServiceError::Conflict(
                "this product has already been reviewed for this order".to_owned(),
            ),
            other => other.into(),
        })?;

    tracing::info!(review_id = %review.id, "review submitted");
    Ok(review)
}

/// Publish a review.
///
/// # Errors
///
/// Returns `NotFound` for an unknown review.
#[instrument(skip(store))]
pub async fn approve_review<S: ReviewStore>(store: &S, id: ReviewId) -> Result<Review, ServiceError> {
    store
        .set_review_status(id, ReviewStatus::Approved, None)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("review {id}")))
}

/// Reject a review with a reason shown to its author.
///
/// # Errors
///
/// Returns `Validation` for a blank reason and `NotFound` for an unknown
/// review.
#[instrument(skip(store, reason))]
pub async fn reject_review<S: ReviewStore>(
    store: &S,
    id: ReviewId,
    reason: &str,
) -> Result<Review, ServiceError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(ServiceError::Validation(
            "a rejection reason is required".to_owned(),
        ));
    }
    store
        .set_review_status(id, ReviewStatus::Rejected, Some(reason))
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("review {id}")))
}

/// Approved-review summary for a product.
///
/// # Errors
///
/// Returns `Persistence` if the store fails.
pub async fn product_rating<S: ReviewStore>(
    store: &S,
    product_id: ProductId,
) -> Result<ProductRating, ServiceError> {
    Ok(store.product_rating(product_id).await?)
}
