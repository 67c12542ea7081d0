//! Customer order lookup.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::instrument;

use pasar_core::Customer;

use crate::db::{OrderStore, Store};
use crate::error::{AppError, Result};
use crate::middleware::OptionalAuth;
use crate::models::{CurrentCustomer, Order};
use crate::state::AppState;

/// Guests prove ownership with the email used at checkout.
#[derive(Debug, Default, Deserialize)]
pub struct OrderLookup {
    pub email: Option<String>,
}

fn is_owner(order: &Order, customer: Option<&CurrentCustomer>, email: Option<&str>) -> bool {
    match &order.customer {
        Customer::Registered { user_id } => customer.is_some_and(|c| c.id == *user_id),
        Customer::Guest(contact) => email
            .map(str::trim)
            .is_some_and(|e| e.eq_ignore_ascii_case(contact.email.as_str())),
    }
}

/// Show an order by its number.
///
/// Orders that do not belong to the requester are reported as missing.
#[instrument(skip(state, customer, lookup))]
pub async fn show<S: Store>(
    State(state): State<AppState<S>>,
    OptionalAuth(customer): OptionalAuth,
    Path(order_number): Path<String>,
    Query(lookup): Query<OrderLookup>,
) -> Result<Json<Order>> {
    let order = state
        .store()
        .order_by_number(&order_number)
        .await?
        .filter(|order| is_owner(order, customer.as_ref(), lookup.email.as_deref()))
        .ok_or_else(|| AppError::NotFound(format!("order {order_number}")))?;

    Ok(Json(order))
}
