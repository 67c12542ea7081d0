//! Admin review moderation handlers.

use axum::{
    Form, Json,
    extract::{Path, State},
};
use serde::Deserialize;
use tracing::instrument;

use pasar_core::ReviewId;

use crate::db::Store;
use crate::error::Result;
use crate::models::Review;
use crate::services::reviews;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RejectForm {
    pub reason: String,
}

/// Publish a pending review.
#[instrument(skip(state))]
pub async fn approve<S: Store>(
    State(state): State<AppState<S>>,
    Path(id): Path<ReviewId>,
) -> Result<Json<Review>> {
    Ok(Json(reviews::approve_review(state.store(), id).await?))
}

/// Reject a review with a reason.
#[instrument(skip(state, form))]
pub async fn reject<S: Store>(
    State(state): State<AppState<S>>,
    Path(id): Path<ReviewId>,
    Form(form): Form<RejectForm>,
) -> Result<Json<Review>> {
    Ok(Json(
        reviews::reject_review(state.store(), id, &form.reason).await?,
    ))
}
