//! Order lifecycle: fulfillment and payment transitions, deletion.
//!
//! Every transition is a compare-and-set against the status the order was
//! read in. If another admin moved the order in between, the write matches no
//! row and the request fails with `Conflict` instead of overwriting.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::instrument;

use pasar_core::{FulfillmentStatus, OrderId, PaymentStatus};

use super::ServiceError;
use crate::db::OrderStore;
use crate::models::{FulfillmentChange, Order, PaymentChange};

/// Requested fulfillment transition.
#[derive(Debug, Clone, Deserialize)]
pub struct FulfillmentUpdate {
    pub status: FulfillmentStatus,
    #[serde(default)]
    pub note: Option<String>,
    /// Only accepted when shipping.
    #[serde(default)]
    pub courier: Option<String>,
    /// Only accepted when shipping.
    #[serde(default)]
    pub tracking_number: Option<String>,
}

/// Requested payment transition.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentUpdate {
    pub status: PaymentStatus,
    #[serde(default)]
    pub note: Option<String>,
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

async fn load<S: OrderStore>(store: &S, id: OrderId) -> Result<Order, ServiceError> {
    store
        .order(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("order {id}")))
}

fn lost_race(id: OrderId) -> ServiceError {
    ServiceError::Conflict(format!("order {id} was changed by someone else, reload and retry"))
}

/// Move an order along the fulfillment axis.
///
/// Entering `shipped` may record a courier and tracking number; entering
/// `cancelled` returns the ordered stock.
///
/// # Errors
///
/// Returns `NotFound` for an unknown order, `Validation` for shipping details
/// on a non-shipping transition, and `Conflict` for a transition the current
/// status does not allow or a concurrent change.
#[instrument(skip(store, update), fields(order_id = %id, to = %update.status))]
pub async fn update_fulfillment<S: OrderStore>(
    store: &S,
    id: OrderId,
    update: &FulfillmentUpdate,
    now: DateTime<Utc>,
) -> Result<Order, ServiceError> {
    let order = load(store, id).await?;
    let from = order.fulfillment_status;
    let to = update.status;

    if !from.can_transition_to(to) {
        let allowed = from
            .next_states()
            .iter()
            .map(|status| status.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let hint = if allowed.is_empty() {
            format!("{from} is final")
        } else {
            format!("next: {allowed}")
        };
        return Err(ServiceError::Conflict(format!(
            "order {} cannot move from {from} to {to} ({hint})",
            order.order_number
        )));
    }

    let courier = non_blank(update.courier.as_deref());
    let tracking_number = non_blank(update.tracking_number.as_deref());
    if to != FulfillmentStatus::Shipped && (courier.is_some() || tracking_number.is_some()) {
        return Err(ServiceError::Validation(
            "courier and tracking number can only be set when shipping".to_owned(),
        ));
    }

    let change = FulfillmentChange {
        from,
        to,
        note: non_blank(update.note.as_deref()),
        courier,
        tracking_number,
        at: now,
    };
    if !store.update_fulfillment(id, &change).await? {
        return Err(lost_race(id));
    }

    tracing::info!(order_number = %order.order_number, %from, %to, "fulfillment status changed");
    load(store, id).await
}

/// Move an order along the payment axis.
///
/// # Errors
///
/// Returns `NotFound` for an unknown order and `Conflict` for a transition the
/// current payment status does not allow or a concurrent change.
#[instrument(skip(store, update), fields(order_id = %id, to = %update.status))]
pub async fn update_payment<S: OrderStore>(
    store: &S,
    id: OrderId,
    update: &PaymentUpdate,
    now: DateTime<Utc>,
) -> Result<Order, ServiceError> {
    let order = load(store, id).await?;
    let from = order.payment_status;
    let to = update.status;

    if !from.can_transition_to(to) {
        return Err(ServiceError::Conflict(format!(
            "payment for order {} cannot move from {from} to {to}",
            order.order_number
        )));
    }

    let change = PaymentChange {
        from,
        to,
        note: non_blank(update.note.as_deref()),
        at: now,
    };
    if !store.update_payment(id, &change).await? {
        return Err(lost_race(id));
    }

    tracing::info!(order_number = %order.order_number, %from, %to, "payment status changed");
    load(store, id).await
}

/// Delete a cancelled order together with its lines and coupon usage.
///
/// # Errors
///
/// Returns `NotFound` for an unknown order and `Conflict` if the order is not
/// cancelled.
#[instrument(skip(store), fields(order_id = %id))]
pub async fn delete_order<S: OrderStore>(store: &S, id: OrderId) -> Result<(), ServiceError> {
    let order = load(store, id).await?;
    if order.fulfillment_status != FulfillmentStatus::Cancelled {
        return Err(ServiceError::Conflict(format!(
            "order {} must be cancelled before it can be deleted",
            order.order_number
        )));
    }
    if !store.delete_cancelled_order(id).await? {
        return Err(lost_race(id));
    }

    tracing::info!(order_number = %order.order_number, "order deleted");
    Ok(())
}
