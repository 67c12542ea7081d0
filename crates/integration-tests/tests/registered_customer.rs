//! Logged-in customers: checkout, per-customer coupon limits, order access and
//! reviews.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::http::StatusCode;

use pasar_core::{Customer, Email, UserId};
use pasar_integration_tests::{TestApp, address, percent_coupon};
use pasar_storefront::models::{CurrentCustomer, Order, Review};

fn customer(id: i64) -> CurrentCustomer {
    CurrentCustomer {
        id: UserId::new(id),
        name: "Eko Prasetyo".to_string(),
        email: Email::parse("eko@example.com").unwrap(),
    }
}

fn checkout_form(coupon: Option<&str>) -> Vec<(&'static str, String)> {
    let address = address();
    let mut form = vec![
        ("recipient_name", address.recipient_name),
        ("phone", address.phone),
        ("address_line", address.address_line),
        ("city", address.city),
        ("province", address.province),
        ("postal_code", address.postal_code),
        ("payment_method", "e_wallet".to_string()),
    ];
    if let Some(code) = coupon {
        form.push(("coupon_code", code.to_string()));
    }
    form
}

#[tokio::test]
async fn test_registered_checkout_and_lookup() {
    let mut app = TestApp::new();
    let batik = app.add_product("Batik Tulis", 150_000, 10).await;
    app.login(&customer(7)).await;
    app.add_to_cart(&batik, 1).await;

    let response = app.post_form("/checkout", &checkout_form(None)).await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());
    let order: Order = response.json();
    assert_eq!(
        order.customer,
        Customer::Registered {
            user_id: UserId::new(7)
        }
    );

    let path = format!("/orders/{}", order.order_number);
    assert_eq!(app.get(&path).await.status, StatusCode::OK);

    // Another account cannot see it, even knowing the number
    let mut other = app.new_visitor();
    other.login(&customer(8)).await;
    assert_eq!(other.get(&path).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_per_customer_coupon_limit() {
    let mut app = TestApp::new();
    let batik = app.add_product("Batik Tulis", 150_000, 10).await;
    let mut coupon = percent_coupon("SEKALI", 10, None);
    coupon.usage_limit_per_user = Some(1);
    app.store.add_coupon(coupon).await;

    app.login(&customer(7)).await;
    app.add_to_cart(&batik, 1).await;
    let response = app.post_form("/checkout", &checkout_form(Some("SEKALI"))).await;
    assert_eq!(response.status, StatusCode::CREATED);

    app.add_to_cart(&batik, 1).await;
    let response = app.post_form("/checkout", &checkout_form(Some("SEKALI"))).await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.text().contains("maximum number of times"));

    // A different account still may use it
    let mut other = app.new_visitor();
    other.login(&customer(8)).await;
    other.add_to_cart(&batik, 1).await;
    let response = other
        .post_form("/checkout", &checkout_form(Some("SEKALI")))
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_customer_review_uses_account_name() {
    let mut app = TestApp::new();
    let batik = app.add_product("Batik Tulis", 150_000, 10).await;
    app.login(&customer(7)).await;
    app.add_to_cart(&batik, 1).await;
    let order: Order = app
        .post_form("/checkout", &checkout_form(None))
        .await
        .json();

    for status in ["paid", "processing", "shipped", "completed"] {
        let response = app
            .admin_post(
                &format!("/admin/orders/{}/status", order.id),
                &[("status", status.to_string())],
            )
            .await;
        assert_eq!(response.status, StatusCode::OK);
    }

    let response = app
        .post_form(
            "/reviews",
            &[
                ("order_id", order.id.to_string()),
                ("product_id", batik.id.to_string()),
                ("rating", "5".to_string()),
                ("body", "Mantap".to_string()),
            ],
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());
    let review: Review = response.json();
    assert_eq!(review.reviewer_name, "Eko Prasetyo");
    assert_eq!(review.user_id, Some(UserId::new(7)));

    // Out-of-range ratings never reach the service
    let response = app
        .post_form(
            "/reviews",
            &[
                ("order_id", order.id.to_string()),
                ("product_id", batik.id.to_string()),
                ("rating", "6".to_string()),
                ("body", "Mantap".to_string()),
            ],
        )
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
}
