//! Admin order lifecycle and review moderation over HTTP.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::http::StatusCode;

use pasar_core::{FulfillmentStatus, PaymentStatus, ReviewStatus};
use pasar_integration_tests::{TestApp, guest_checkout_form};
use pasar_storefront::db::CatalogStore;
use pasar_storefront::models::{Order, OrderSummary, Product, ProductRating, Review};
use rust_decimal::Decimal;

async fn place_order(app: &TestApp, product: &Product, quantity: u32, email: &str) -> Order {
    let mut visitor = app.new_visitor();
    visitor.add_to_cart(product, quantity).await;
    let response = visitor
        .post_form("/checkout", &guest_checkout_form(email))
        .await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());
    response.json()
}

async fn move_to(app: &mut TestApp, order: &Order, status: &str) -> Order {
    let response = app
        .admin_post(
            &format!("/admin/orders/{}/status", order.id),
            &[("status", status.to_string())],
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.text());
    response.json()
}

async fn complete(app: &mut TestApp, order: &Order) -> Order {
    for status in ["paid", "processing", "shipped", "completed"] {
        move_to(app, order, status).await;
    }
    app.admin_get(&format!("/admin/orders/{}", order.id))
        .await
        .json()
}

fn review_form(order: &Order, product: &Product, rating: i16, email: &str) -> Vec<(&'static str, String)> {
    vec![
        ("order_id", order.id.to_string()),
        ("product_id", product.id.to_string()),
        ("rating", rating.to_string()),
        ("body", "Kainnya halus, warnanya awet.".to_string()),
        ("name", "Dewi".to_string()),
        ("email", email.to_string()),
    ]
}

// =============================================================================
// Authentication
// =============================================================================

#[tokio::test]
async fn test_admin_requires_token() {
    let mut app = TestApp::new();

    let response = app.get("/admin/orders").await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = app
        .post_form("/admin/orders/1/status", &[("status", "paid".to_string())])
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = app.admin_get("/admin/orders").await;
    assert_eq!(response.status, StatusCode::OK);
}

// =============================================================================
// Order lifecycle
// =============================================================================

#[tokio::test]
async fn test_fulfillment_walk() {
    let mut app = TestApp::new();
    let batik = app.add_product("Batik Tulis", 150_000, 10).await;
    let order = place_order(&app, &batik, 1, "dewi@example.com").await;

    move_to(&mut app, &order, "paid").await;
    move_to(&mut app, &order, "processing").await;

    let response = app
        .admin_post(
            &format!("/admin/orders/{}/status", order.id),
            &[
                ("status", "shipped".to_string()),
                ("courier", "JNE".to_string()),
                ("tracking_number", "JNE0012345678".to_string()),
            ],
        )
        .await;
    let shipped: Order = response.json();
    assert_eq!(shipped.fulfillment_status, FulfillmentStatus::Shipped);
    assert_eq!(shipped.courier.as_deref(), Some("JNE"));
    assert!(shipped.shipped_at.is_some());

    let completed = move_to(&mut app, &order, "completed").await;
    assert!(completed.completed_at.is_some());

    // Completed is terminal
    let response = app
        .admin_post(
            &format!("/admin/orders/{}/status", order.id),
            &[("status", "cancelled".to_string())],
        )
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_skipping_a_step_is_rejected() {
    let mut app = TestApp::new();
    let batik = app.add_product("Batik Tulis", 150_000, 10).await;
    let order = place_order(&app, &batik, 1, "dewi@example.com").await;

    let response = app
        .admin_post(
            &format!("/admin/orders/{}/status", order.id),
            &[("status", "shipped".to_string())],
        )
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);

    let unchanged: Order = app
        .admin_get(&format!("/admin/orders/{}", order.id))
        .await
        .json();
    assert_eq!(unchanged.fulfillment_status, FulfillmentStatus::PendingPayment);
}

#[tokio::test]
async fn test_cancel_restocks_and_delete() {
    let mut app = TestApp::new();
    let batik = app.add_product("Batik Tulis", 150_000, 10).await;
    let order = place_order(&app, &batik, 3, "dewi@example.com").await;
    assert_eq!(app.store.product(batik.id).await.unwrap().unwrap().stock, 7);

    // Only cancelled orders can be deleted
    let response = app
        .admin_delete(&format!("/admin/orders/{}", order.id))
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);

    let cancelled = move_to(&mut app, &order, "cancelled").await;
    assert!(cancelled.cancelled_at.is_some());
    assert_eq!(app.store.product(batik.id).await.unwrap().unwrap().stock, 10);

    let response = app
        .admin_delete(&format!("/admin/orders/{}", order.id))
        .await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    let response = app.admin_get(&format!("/admin/orders/{}", order.id)).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(app.store.counts().await.order_lines, 0);
}

#[tokio::test]
async fn test_payment_is_independent_of_fulfillment() {
    let mut app = TestApp::new();
    let batik = app.add_product("Batik Tulis", 150_000, 10).await;
    let order = place_order(&app, &batik, 1, "dewi@example.com").await;
    let path = format!("/admin/orders/{}/payment", order.id);

    let response = app
        .admin_post(&path, &[("status", "awaiting_verification".to_string())])
        .await;
    let awaiting: Order = response.json();
    assert_eq!(awaiting.payment_status, PaymentStatus::AwaitingVerification);
    assert_eq!(awaiting.fulfillment_status, FulfillmentStatus::PendingPayment);

    let paid: Order = app
        .admin_post(
            &path,
            &[
                ("status", "paid".to_string()),
                ("note", "BCA transfer verified".to_string()),
            ],
        )
        .await
        .json();
    assert_eq!(paid.payment_status, PaymentStatus::Paid);
    assert!(paid.paid_at.is_some());

    // Paid is final
    let response = app
        .admin_post(&path, &[("status", "failed".to_string())])
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_list_orders_filters() {
    let mut app = TestApp::new();
    let batik = app.add_product("Batik Tulis", 150_000, 10).await;
    let first = place_order(&app, &batik, 1, "a@example.com").await;
    let second = place_order(&app, &batik, 1, "b@example.com").await;
    move_to(&mut app, &second, "paid").await;

    let all: Vec<OrderSummary> = app.admin_get("/admin/orders").await.json();
    assert_eq!(all.len(), 2);

    let paid: Vec<OrderSummary> = app
        .admin_get("/admin/orders?fulfillment_status=paid")
        .await
        .json();
    assert_eq!(paid.len(), 1);
    assert_eq!(paid[0].id, second.id);

    let pending: Vec<OrderSummary> = app
        .admin_get("/admin/orders?fulfillment_status=pending_payment")
        .await
        .json();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, first.id);
}

// =============================================================================
// Reviews
// =============================================================================

#[tokio::test]
async fn test_review_needs_completed_order() {
    let mut app = TestApp::new();
    let batik = app.add_product("Batik Tulis", 150_000, 10).await;
    let order = place_order(&app, &batik, 1, "dewi@example.com").await;

    let response = app
        .post_form("/reviews", &review_form(&order, &batik, 5, "dewi@example.com"))
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);

    complete(&mut app, &order).await;

    // Someone else's email is treated as an unknown order
    let response = app
        .post_form("/reviews", &review_form(&order, &batik, 5, "eko@example.com"))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = app
        .post_form("/reviews", &review_form(&order, &batik, 5, "dewi@example.com"))
        .await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());
    let review: Review = response.json();
    assert_eq!(review.status, ReviewStatus::Pending);

    // One review per product per order
    let response = app
        .post_form("/reviews", &review_form(&order, &batik, 4, "dewi@example.com"))
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_rating_counts_only_approved_reviews() {
    let mut app = TestApp::new();
    let batik = app.add_product("Batik Tulis", 150_000, 10).await;

    let mut reviews = Vec::new();
    for (rating, email) in [(5, "a@example.com"), (4, "b@example.com"), (1, "c@example.com")] {
        let order = place_order(&app, &batik, 1, email).await;
        complete(&mut app, &order).await;
        let review: Review = app
            .post_form("/reviews", &review_form(&order, &batik, rating, email))
            .await
            .json();
        reviews.push(review);
    }

    let path = format!("/products/{}/rating", batik.id);
    let rating: ProductRating = app.get(&path).await.json();
    assert_eq!(rating.review_count, 0);
    assert_eq!(rating.average, None);

    for review in &reviews[..2] {
        let response = app
            .admin_post(&format!("/admin/reviews/{}/approve", review.id), &[])
            .await;
        assert_eq!(response.status, StatusCode::OK);
    }
    let rejected: Review = app
        .admin_post(
            &format!("/admin/reviews/{}/reject", reviews[2].id),
            &[("reason", "Off-topic".to_string())],
        )
        .await
        .json();
    assert_eq!(rejected.status, ReviewStatus::Rejected);
    assert_eq!(rejected.rejection_reason.as_deref(), Some("Off-topic"));

    let rating: ProductRating = app.get(&path).await.json();
    assert_eq!(rating.review_count, 2);
    assert_eq!(rating.average, Some(Decimal::new(45, 1)));
}

#[tokio::test]
async fn test_reject_requires_reason() {
    let mut app = TestApp::new();
    let response = app
        .admin_post("/admin/reviews/1/reject", &[("reason", "  ".to_string())])
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
}
