//! Review submission and product rating handlers.

use axum::{
    Form, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::instrument;

use pasar_core::{Email, OrderId, ProductId, Rating};

use crate::db::Store;
use crate::error::Result;
use crate::middleware::OptionalAuth;
use crate::models::{ProductRating, Review};
use crate::services::ServiceError;
use crate::services::reviews::{self, ReviewAuthor, ReviewSubmission};
use crate::state::AppState;

/// Review form. `name` and `email` are required from guests only.
#[derive(Debug, Deserialize)]
pub struct ReviewForm {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub rating: Rating,
    pub body: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Submit a review for a product from a completed order.
#[instrument(skip(state, customer, form), fields(order_id = %form.order_id, product_id = %form.product_id))]
pub async fn create<S: Store>(
    State(state): State<AppState<S>>,
    OptionalAuth(customer): OptionalAuth,
    Form(form): Form<ReviewForm>,
) -> Result<(StatusCode, Json<Review>)> {
    let author = match customer {
        Some(current) => ReviewAuthor::Customer {
            user_id: current.id,
            name: current.name,
        },
        None => {
            let name = form
                .name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .ok_or_else(|| ServiceError::Validation("name is required".to_owned()))?;
            let email = Email::parse(form.email.as_deref().unwrap_or_default().trim())
                .map_err(|e| ServiceError::Validation(format!("email: {e}")))?;
            ReviewAuthor::Guest {
                name: name.to_owned(),
                email,
            }
        }
    };

    let review = reviews::submit_review(
        state.store(),
        ReviewSubmission {
            order_id: form.order_id,
            product_id: form.product_id,
            author,
            rating: form.rating,
            body: form.body,
        },
        Utc::now(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(review)))
}

/// Approved-review count and average for a product.
#[instrument(skip(state))]
pub async fn rating<S: Store>(
    State(state): State<AppState<S>>,
    Path(product_id): Path<ProductId>,
) -> Result<Json<ProductRating>> {
    Ok(Json(reviews::product_rating(state.store(), product_id).await?))
}
