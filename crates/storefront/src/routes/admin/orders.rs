//! Admin order handlers.

use axum::{
    Form, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use tracing::instrument;

use pasar_core::OrderId;

use crate::db::{OrderStore, Store};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::models::{Order, OrderFilter, OrderSummary};
use crate::services::lifecycle::{self, FulfillmentUpdate, PaymentUpdate};
use crate::state::AppState;

/// List orders, newest first, optionally filtered by status.
#[instrument(skip(state))]
pub async fn index<S: Store>(
    State(state): State<AppState<S>>,
    Query(filter): Query<OrderFilter>,
) -> Result<Json<Vec<OrderSummary>>> {
    Ok(Json(state.store().list_orders(&filter).await?))
}

/// Order detail with lines.
#[instrument(skip(state))]
pub async fn show<S: Store>(
    State(state): State<AppState<S>>,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    let order = state
        .store()
        .order(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))?;
    Ok(Json(order))
}

/// Move an order along the fulfillment axis.
#[instrument(skip(state, update), fields(to = %update.status))]
pub async fn update_status<S: Store>(
    State(state): State<AppState<S>>,
    Path(id): Path<OrderId>,
    Form(update): Form<FulfillmentUpdate>,
) -> Result<Json<Order>> {
    add_breadcrumb(
        "order.fulfillment",
        "fulfillment transition requested",
        &[("order_id", id.to_string()), ("to", update.status.to_string())],
    );
    let order = lifecycle::update_fulfillment(state.store(), id, &update, Utc::now()).await?;
    Ok(Json(order))
}

/// Record a payment transition.
#[instrument(skip(state, update), fields(to = %update.status))]
pub async fn update_payment<S: Store>(
    State(state): State<AppState<S>>,
    Path(id): Path<OrderId>,
    Form(update): Form<PaymentUpdate>,
) -> Result<Json<Order>> {
    add_breadcrumb(
        "order.payment",
        "payment transition requested",
        &[("order_id", id.to_string()), ("to", update.status.to_string())],
    );
    let order = lifecycle::update_payment(state.store(), id, &update, Utc::now()).await?;
    Ok(Json(order))
}

/// Delete a cancelled order.
#[instrument(skip(state))]
pub async fn destroy<S: Store>(
    State(state): State<AppState<S>>,
    Path(id): Path<OrderId>,
) -> Result<StatusCode> {
    add_breadcrumb("order.delete", "order deletion requested", &[("order_id", id.to_string())]);
    lifecycle::delete_order(state.store(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
