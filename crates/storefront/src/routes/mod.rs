//! HTTP route handlers for storefront.
//!
//! Bodies are form-encoded (HTMX forms); responses are JSON for the page
//! renderer. Mutations of the cart send `HX-Trigger: cart-updated`.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                     - Liveness
//! GET    /health/ready               - Readiness (store reachable)
//!
//! # Cart (session)
//! GET    /cart                       - Cart snapshot
//! POST   /cart/add                   - Add item
//! POST   /cart/update                - Update quantity
//! POST   /cart/remove                - Remove item
//! POST   /cart/coupon                - Apply-coupon price preview
//!
//! # Orders
//! POST   /checkout                   - Place order, clears the cart
//! GET    /orders/{order_number}      - Order lookup (owner only)
//!
//! # Reviews
//! POST   /reviews                    - Submit review
//! GET    /products/{id}/rating       - Approved-review summary
//!
//! # Admin (bearer token)
//! GET    /admin/orders               - List orders
//! GET    /admin/orders/{id}          - Order detail
//! POST   /admin/orders/{id}/status   - Fulfillment transition
//! POST   /admin/orders/{id}/payment  - Payment transition
//! DELETE /admin/orders/{id}          - Delete cancelled order
//! POST   /admin/reviews/{id}/approve - Publish review
//! POST   /admin/reviews/{id}/reject  - Reject review
//! ```

pub mod admin;
pub mod cart;
pub mod checkout;
pub mod orders;
pub mod reviews;

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use tower_sessions::{SessionManagerLayer, SessionStore};

use crate::db::{HealthCheck, Store};
use crate::middleware::{request_id_middleware, require_admin};
use crate::state::AppState;

/// Create the cart routes router.
pub fn cart_routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/", get(cart::show::<S>))
        .route("/add", post(cart::add::<S>))
        .route("/update", post(cart::update::<S>))
        .route("/remove", post(cart::remove::<S>))
        .route("/coupon", post(cart::apply_coupon::<S>))
}

/// Create the admin routes router, guarded by the admin token.
pub fn admin_routes<S: Store>(state: &AppState<S>) -> Router<AppState<S>> {
    Router::new()
        .route("/orders", get(admin::orders::index::<S>))
        .route(
            "/orders/{id}",
            get(admin::orders::show::<S>).delete(admin::orders::destroy::<S>),
        )
        .route("/orders/{id}/status", post(admin::orders::update_status::<S>))
        .route("/orders/{id}/payment", post(admin::orders::update_payment::<S>))
        .route("/reviews/{id}/approve", post(admin::reviews::approve::<S>))
        .route("/reviews/{id}/reject", post(admin::reviews::reject::<S>))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_admin::<S>,
        ))
}

/// Create all routes for the storefront.
pub fn routes<S: Store>(state: &AppState<S>) -> Router<AppState<S>> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness::<S>))
        .nest("/cart", cart_routes())
        .route("/checkout", post(checkout::place_order::<S>))
        .route("/orders/{order_number}", get(orders::show::<S>))
        .route("/reviews", post(reviews::create::<S>))
        .route("/products/{id}/rating", get(reviews::rating::<S>))
        .nest("/admin", admin_routes(state))
}

/// Build the storefront application: routes, sessions, tracing, request IDs.
///
/// Sentry layers are added by the binary, outermost.
pub fn app<S, Sessions>(state: AppState<S>, sessions: SessionManagerLayer<Sessions>) -> Router
where
    S: Store,
    Sessions: SessionStore + Clone,
{
    routes(&state)
        .layer(sessions)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the store is not reachable.
async fn readiness<S: Store>(State(state): State<AppState<S>>) -> StatusCode {
    match state.store().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
