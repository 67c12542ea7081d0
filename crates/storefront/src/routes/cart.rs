//! Cart route handlers.
//!
//! The cart lives in the session under [`session_keys::CART`]. Every mutation
//! loads it, applies the change and writes it back before responding.

use axum::{
    Form, Json,
    extract::State,
    response::{AppendHeaders, IntoResponse, Response},
};
use chrono::Utc;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use pasar_core::{Cart, CartSnapshot, ProductId, Quantity};

use crate::db::Store;
use crate::error::Result;
use crate::middleware::OptionalAuth;
use crate::models::session_keys;
use crate::services::{cart as cart_service, coupons};
use crate::state::AppState;

/// Form data for adding to cart.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: ProductId,
    pub quantity: Option<Quantity>,
    pub variant: Option<String>,
    pub note: Option<String>,
}

/// Form data for updating cart quantity.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub item_id: String,
    pub quantity: Quantity,
}

/// Form data for removing from cart.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub item_id: String,
}

/// Form data for previewing a coupon.
#[derive(Debug, Deserialize)]
pub struct ApplyCouponForm {
    pub code: String,
}

// =============================================================================
// Session Helpers
// =============================================================================

/// Load the cart from the session; a new session has an empty cart.
pub(crate) async fn load_cart(session: &Session) -> Result<Cart> {
    Ok(session
        .get::<Cart>(session_keys::CART)
        .await?
        .unwrap_or_default())
}

/// Store the cart in the session.
pub(crate) async fn save_cart(session: &Session, cart: &Cart) -> Result<()> {
    session.insert(session_keys::CART, cart).await?;
    Ok(())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn updated(snapshot: CartSnapshot) -> Response {
    (
        AppendHeaders([("HX-Trigger", "cart-updated")]),
        Json(snapshot),
    )
        .into_response()
}

// =============================================================================
// Route Handlers
// =============================================================================

/// Display the cart.
#[instrument(skip(state, session))]
pub async fn show<S: Store>(
    State(state): State<AppState<S>>,
    session: Session,
) -> Result<Json<CartSnapshot>> {
    let cart = load_cart(&session).await?;
    Ok(Json(cart_service::snapshot(&cart, &state.shop().shipping)))
}

/// Add item to cart.
#[instrument(skip(state, session))]
pub async fn add<S: Store>(
    State(state): State<AppState<S>>,
    session: Session,
    Form(form): Form<AddToCartForm>,
) -> Result<Response> {
    let mut cart = load_cart(&session).await?;
    cart_service::add_item(
        state.store(),
        &mut cart,
        form.product_id,
        form.quantity.unwrap_or(Quantity::ONE),
        non_blank(form.variant),
        non_blank(form.note),
    )
    .await?;
    save_cart(&session, &cart).await?;

    Ok(updated(cart_service::snapshot(&cart, &state.shop().shipping)))
}

/// Update cart item quantity.
#[instrument(skip(state, session))]
pub async fn update<S: Store>(
    State(state): State<AppState<S>>,
    session: Session,
    Form(form): Form<UpdateCartForm>,
) -> Result<Response> {
    let mut cart = load_cart(&session).await?;
    cart_service::update_quantity(&mut cart, &form.item_id, form.quantity)?;
    save_cart(&session, &cart).await?;

    Ok(updated(cart_service::snapshot(&cart, &state.shop().shipping)))
}

/// Remove item from cart.
#[instrument(skip(state, session))]
pub async fn remove<S: Store>(
    State(state): State<AppState<S>>,
    session: Session,
    Form(form): Form<RemoveFromCartForm>,
) -> Result<Response> {
    let mut cart = load_cart(&session).await?;
    cart_service::remove_item(&mut cart, &form.item_id);
    save_cart(&session, &cart).await?;

    Ok(updated(cart_service::snapshot(&cart, &state.shop().shipping)))
}

/// Preview the cart total with a coupon applied. Nothing is recorded.
#[instrument(skip(state, session, customer))]
pub async fn apply_coupon<S: Store>(
    State(state): State<AppState<S>>,
    session: Session,
    OptionalAuth(customer): OptionalAuth,
    Form(form): Form<ApplyCouponForm>,
) -> Result<Json<coupons::CouponPreview>> {
    let cart = load_cart(&session).await?;
    let preview = coupons::preview(
        state.store(),
        &cart,
        &form.code,
        customer.map(|c| c.id),
        &state.shop().shipping,
        Utc::now(),
    )
    .await?;

    Ok(Json(preview))
}
