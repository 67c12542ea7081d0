//! Checkout and lifecycle against a real `PostgreSQL` database.
//!
//! Run with:
//! `STOREFRONT_DATABASE_URL=postgres://localhost/pasar_test cargo test -p pasar-integration-tests -- --ignored`
//!
//! Tests share the database, so every product and coupon gets a unique SKU or
//! code and nothing is truncated.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use secrecy::SecretString;

use pasar_core::{
    Cart, CouponRejection, CouponScope, Customer, Discount, FulfillmentStatus, Money, OrderNumber,
    PaymentMethod, Quantity, ShippingPolicy,
};
use pasar_integration_tests::{address, guest_contact};
use pasar_storefront::db::catalog::ProductInput;
use pasar_storefront::db::coupons::CouponInput;
use pasar_storefront::db::{self, CatalogStore, CouponStore, OrderStore, PgStore};
use pasar_storefront::models::Product;
use pasar_storefront::services::ServiceError;
use pasar_storefront::services::checkout::{CheckoutRequest, OrderAssembler};
use pasar_storefront::services::lifecycle::{self, FulfillmentUpdate};

async fn connect() -> PgStore {
    let url = std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .expect("STOREFRONT_DATABASE_URL must be set for PostgreSQL tests");
    let pool = db::create_pool(&SecretString::from(url)).await.unwrap();
    sqlx::migrate!("../storefront/migrations")
        .run(&pool)
        .await
        .unwrap();
    PgStore::new(pool)
}

fn unique(label: &str) -> String {
    format!("{label}-{}", Utc::now().timestamp_nanos_opt().unwrap())
}

async fn product(store: &PgStore, price: i64, stock: i32) -> Product {
    store
        .upsert_product(&ProductInput {
            category_id: None,
            name: "Batik Tulis".to_string(),
            sku: unique("BTK"),
            price: Money::from_units(price),
            stock,
            image: None,
            is_active: true,
        })
        .await
        .unwrap()
}

fn guest_request(coupon_code: Option<String>) -> CheckoutRequest {
    CheckoutRequest {
        customer: Customer::Guest(guest_contact("dewi@example.com")),
        shipping_address: address(),
        payment_method: PaymentMethod::BankTransfer,
        coupon_code,
    }
}

fn cart_with(product: &Product, quantity: u32) -> Cart {
    let mut cart = Cart::default();
    cart.add_item(
        product.id,
        product.price,
        Quantity::new(quantity).unwrap(),
        None,
        None,
    )
    .unwrap();
    cart
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (STOREFRONT_DATABASE_URL)"]
async fn test_checkout_cancel_delete() {
    let store = connect().await;
    let batik = product(&store, 150_000, 5).await;
    let coupon = store
        .create_coupon(&CouponInput {
            code: unique("save"),
            discount: Discount::Percentage {
                rate: Decimal::TEN,
                max_discount: Some(Money::from_units(25_000)),
            },
            min_purchase: None,
            usage_limit: Some(10),
            usage_limit_per_user: None,
            scope: CouponScope::default(),
            valid_from: Utc::now() - Duration::days(1),
            valid_until: Utc::now() + Duration::days(1),
            is_active: true,
        })
        .await
        .unwrap();

    let assembler = OrderAssembler::new(&store, ShippingPolicy::default(), "PG");
    let order = assembler
        .place_order(
            &cart_with(&batik, 2),
            &guest_request(Some(coupon.code.to_lowercase())),
            Utc::now(),
        )
        .await
        .unwrap();

    assert!(OrderNumber::parse(&order.order_number).is_ok());
    assert_eq!(order.totals.subtotal, Money::from_units(300_000));
    assert_eq!(order.totals.discount, Money::from_units(25_000));
    assert_eq!(order.totals.shipping, Money::from_units(25_000));
    assert_eq!(order.totals.total, Money::from_units(300_000));
    assert_eq!(order.lines.len(), 1);
    assert_eq!(store.product(batik.id).await.unwrap().unwrap().stock, 3);
    assert_eq!(store.coupon_usages_for_order(order.id).await.unwrap().len(), 1);

    let found = store
        .order_by_number(&order.order_number)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, order.id);

    let cancel = FulfillmentUpdate {
        status: FulfillmentStatus::Cancelled,
        note: Some("customer asked".to_string()),
        courier: None,
        tracking_number: None,
    };
    let cancelled = lifecycle::update_fulfillment(&store, order.id, &cancel, Utc::now())
        .await
        .unwrap();
    assert_eq!(cancelled.fulfillment_status, FulfillmentStatus::Cancelled);
    assert_eq!(store.product(batik.id).await.unwrap().unwrap().stock, 5);

    lifecycle::delete_order(&store, order.id).await.unwrap();
    assert!(store.order(order.id).await.unwrap().is_none());
    assert!(store.coupon_usages_for_order(order.id).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (STOREFRONT_DATABASE_URL)"]
async fn test_concurrent_checkouts_for_last_unit() {
    let store = connect().await;
    let batik = product(&store, 150_000, 1).await;
    let cart = cart_with(&batik, 1);
    let request = guest_request(None);
    let assembler = OrderAssembler::new(&store, ShippingPolicy::default(), "PG");

    let (first, second) = tokio::join!(
        assembler.place_order(&cart, &request, Utc::now()),
        assembler.place_order(&cart, &request, Utc::now()),
    );

    let results = [first, second];
    let placed = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(ServiceError::Conflict(_))))
        .count();
    assert_eq!(placed, 1);
    assert_eq!(conflicts, 1);
    assert_eq!(store.product(batik.id).await.unwrap().unwrap().stock, 0);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (STOREFRONT_DATABASE_URL)"]
async fn test_order_numbers_increase_within_a_day() {
    let store = connect().await;
    let batik = product(&store, 50_000, 10).await;
    let assembler = OrderAssembler::new(&store, ShippingPolicy::default(), "SEQ");
    let now = Utc::now();

    let first = assembler
        .place_order(&cart_with(&batik, 1), &guest_request(None), now)
        .await
        .unwrap();
    let second = assembler
        .place_order(&cart_with(&batik, 1), &guest_request(None), now)
        .await
        .unwrap();

    let first = OrderNumber::parse(&first.order_number).unwrap();
    let second = OrderNumber::parse(&second.order_number).unwrap();
    assert_eq!(second.sequence(), first.sequence() + 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "Requires PostgreSQL (STOREFRONT_DATABASE_URL)"]
async fn test_checkouts_sharing_products_in_opposite_order() {
    let store = connect().await;
    let batik = product(&store, 150_000, 1000).await;
    let kopi = product(&store, 95_000, 1000).await;

    let mut forward = Cart::default();
    forward.add_item(batik.id, batik.price, Quantity::ONE, None, None).unwrap();
    forward.add_item(kopi.id, kopi.price, Quantity::ONE, None, None).unwrap();
    let mut backward = Cart::default();
    backward.add_item(kopi.id, kopi.price, Quantity::ONE, None, None).unwrap();
    backward.add_item(batik.id, batik.price, Quantity::ONE, None, None).unwrap();

    let request = guest_request(None);
    let assembler = OrderAssembler::new(&store, ShippingPolicy::default(), "PG");

    for _ in 0..20 {
        let (first, second) = tokio::join!(
            assembler.place_order(&forward, &request, Utc::now()),
            assembler.place_order(&backward, &request, Utc::now()),
        );
        first.unwrap();
        second.unwrap();
    }

    assert_eq!(store.product(batik.id).await.unwrap().unwrap().stock, 960);
    assert_eq!(store.product(kopi.id).await.unwrap().unwrap().stock, 960);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (STOREFRONT_DATABASE_URL)"]
async fn test_coupon_usage_limit_across_orders() {
    let store = connect().await;
    let batik = product(&store, 150_000, 10).await;
    let coupon = store
        .create_coupon(&CouponInput {
            code: unique("twice"),
            discount: Discount::Fixed {
                amount: Money::from_units(10_000),
            },
            min_purchase: None,
            usage_limit: Some(2),
            usage_limit_per_user: None,
            scope: CouponScope::default(),
            valid_from: Utc::now() - Duration::days(1),
            valid_until: Utc::now() + Duration::days(1),
            is_active: true,
        })
        .await
        .unwrap();
    let assembler = OrderAssembler::new(&store, ShippingPolicy::default(), "PG");
    let cart = cart_with(&batik, 1);
    let request = guest_request(Some(coupon.code.clone()));

    for _ in 0..2 {
        assembler.place_order(&cart, &request, Utc::now()).await.unwrap();
    }
    let third = assembler.place_order(&cart, &request, Utc::now()).await;

    assert!(matches!(
        third,
        Err(ServiceError::CouponInvalid(CouponRejection::UsageLimitReached))
    ));
    assert_eq!(store.coupon_usage(coupon.id, None).await.unwrap().total, 2);
    assert_eq!(store.product(batik.id).await.unwrap().unwrap().stock, 8);
}
