//! Checkout route handler.

use axum::{Form, Json, extract::State, http::StatusCode};
use chrono::Utc;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use pasar_core::{Customer, Email, GuestContact, PaymentMethod};

use super::cart::{load_cart, save_cart};
use crate::db::Store;
use crate::error::{Result, add_breadcrumb};
use crate::middleware::OptionalAuth;
use crate::models::{CurrentCustomer, Order, ShippingAddress};
use crate::services::ServiceError;
use crate::services::checkout::{CheckoutRequest, OrderAssembler};
use crate::state::AppState;

/// Checkout form. Guest fields are ignored for a logged-in customer.
#[derive(Debug, Deserialize)]
pub struct CheckoutForm {
    pub recipient_name: String,
    pub phone: String,
    pub address_line: String,
    pub city: String,
    pub province: String,
    pub postal_code: String,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub guest_name: Option<String>,
    #[serde(default)]
    pub guest_email: Option<String>,
    #[serde(default)]
    pub guest_phone: Option<String>,
}

impl CheckoutForm {
    fn into_request(
        self,
        customer: Option<CurrentCustomer>,
    ) -> std::result::Result<CheckoutRequest, ServiceError> {
        let customer = match customer {
            Some(current) => Customer::Registered {
                user_id: current.id,
            },
            None => {
                let email = self.guest_email.as_deref().unwrap_or_default();
                let email = Email::parse(email.trim())
                    .map_err(|e| ServiceError::Validation(format!("email: {e}")))?;
                Customer::Guest(GuestContact {
                    name: self.guest_name.unwrap_or_default().trim().to_string(),
                    email,
                    // Falls back to the recipient's phone.
                    phone: self
                        .guest_phone
                        .filter(|p| !p.trim().is_empty())
                        .unwrap_or_else(|| self.phone.clone()),
                })
            }
        };

        Ok(CheckoutRequest {
            customer,
            shipping_address: ShippingAddress {
                recipient_name: self.recipient_name,
                phone: self.phone,
                address_line: self.address_line,
                city: self.city,
                province: self.province,
                postal_code: self.postal_code,
            },
            payment_method: self.payment_method,
            coupon_code: self.coupon_code,
        })
    }
}

/// Place an order from the session cart.
///
/// On success the cart is emptied and the order is returned with 201.
#[instrument(skip(state, session, customer, form))]
pub async fn place_order<S: Store>(
    State(state): State<AppState<S>>,
    session: Session,
    OptionalAuth(customer): OptionalAuth,
    Form(form): Form<CheckoutForm>,
) -> Result<(StatusCode, Json<Order>)> {
    let mut cart = load_cart(&session).await?;
    let request = form.into_request(customer)?;

    add_breadcrumb(
        "checkout",
        "placing order",
        &[
            ("items", cart.items().len().to_string()),
            ("coupon", request.coupon_code.clone().unwrap_or_default()),
        ],
    );
    let shop = state.shop();
    let order = OrderAssembler::new(state.store(), shop.shipping, &shop.order_number_prefix)
        .with_utc_offset(shop.utc_offset)
        .place_order(&cart, &request, Utc::now())
        .await?;

    add_breadcrumb("checkout", "order placed", &[("order_number", order.order_number.clone())]);
    cart.clear();
    save_cart(&session, &cart).await?;

    Ok((StatusCode::CREATED, Json(order)))
}
