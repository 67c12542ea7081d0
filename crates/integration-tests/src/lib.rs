//! Integration test harness for Pasar.
//!
//! # Running Tests
//!
//! ```bash
//! # In-process tests (in-memory store)
//! cargo test -p pasar-integration-tests
//!
//! # PostgreSQL tests
//! STOREFRONT_DATABASE_URL=postgres://localhost/pasar_test \
//!     cargo test -p pasar-integration-tests -- --ignored
//! ```
//!
//! [`TestApp`] runs the real router over [`MemoryStore`] and an in-memory
//! session store, carrying the session cookie between requests like a browser.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};

use axum::Router;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use tower::ServiceExt;
use tower_sessions::SessionStore;
use tower_sessions::cookie::time::{self, OffsetDateTime};
use tower_sessions::session::{Id, Record};

use pasar_core::{Coupon, CouponScope, Discount, Email, GuestContact, Money, ShippingPolicy};
use pasar_storefront::config::{SentryConfig, ShopConfig, StorefrontConfig};
use pasar_storefront::db::MemoryStore;
use pasar_storefront::middleware::session::SESSION_COOKIE_NAME;
use pasar_storefront::middleware::session_layer;
use pasar_storefront::models::{CurrentCustomer, Product, ShippingAddress, session_keys};
use pasar_storefront::routes;
use pasar_storefront::state::AppState;

/// Bearer token accepted by the test app's admin routes.
pub const ADMIN_TOKEN: &str = "test-admin-token-with-enough-length-0123456789";

/// Configuration for tests; nothing here is read from the environment.
#[must_use]
pub fn test_config() -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("postgres://localhost/pasar_test"),
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 3000,
        base_url: "http://localhost:3000".to_string(),
        admin_token: SecretString::from(ADMIN_TOKEN),
        shop: ShopConfig {
            shipping: ShippingPolicy::new(Money::from_units(400_000), Money::from_units(25_000)),
            order_number_prefix: "ORD".to_string(),
            utc_offset: ShopConfig::default().utc_offset,
        },
        sentry: SentryConfig::default(),
    }
}

/// A product with a SKU derived from its name.
#[must_use]
pub fn product(name: &str, price: i64, stock: i32) -> Product {
    Product {
        id: pasar_core::ProductId::new(0),
        category_id: None,
        name: name.to_string(),
        sku: name.to_uppercase().replace(' ', "-"),
        price: Money::from_units(price),
        stock,
        image: None,
        is_active: true,
    }
}

/// A percentage coupon valid for a month either side of now.
#[must_use]
pub fn percent_coupon(code: &str, rate: i64, cap: Option<i64>) -> Coupon {
    let now = Utc::now();
    Coupon {
        id: pasar_core::CouponId::new(0),
        code: code.to_string(),
        discount: Discount::Percentage {
            rate: Decimal::from(rate),
            max_discount: cap.map(Money::from_units),
        },
        min_purchase: None,
        usage_limit: None,
        usage_limit_per_user: None,
        scope: CouponScope::default(),
        valid_from: now - Duration::days(30),
        valid_until: now + Duration::days(30),
        is_active: true,
    }
}

#[must_use]
pub fn address() -> ShippingAddress {
    ShippingAddress {
        recipient_name: "Dewi Lestari".to_string(),
        phone: "081298765432".to_string(),
        address_line: "Jl. Diponegoro No. 21".to_string(),
        city: "Yogyakarta".to_string(),
        province: "DI Yogyakarta".to_string(),
        postal_code: "55223".to_string(),
    }
}

#[must_use]
pub fn guest_contact(email: &str) -> GuestContact {
    GuestContact {
        name: "Dewi Lestari".to_string(),
        email: Email::parse(email).unwrap(),
        phone: "081298765432".to_string(),
    }
}

/// Checkout form fields for a guest paying by bank transfer.
#[must_use]
pub fn guest_checkout_form(email: &str) -> Vec<(&'static str, String)> {
    let address = address();
    vec![
        ("recipient_name", address.recipient_name),
        ("phone", address.phone),
        ("address_line", address.address_line),
        ("city", address.city),
        ("province", address.province),
        ("postal_code", address.postal_code),
        ("payment_method", "bank_transfer".to_string()),
        ("guest_name", "Dewi Lestari".to_string()),
        ("guest_email", email.to_string()),
    ]
}

/// A buffered response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    /// Deserialize the JSON body.
    pub fn json<T: DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body).unwrap_or_else(|e| {
            panic!(
                "invalid JSON ({e}) with status {}: {}",
                self.status,
                self.text()
            )
        })
    }

    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// The storefront router over an in-memory store, acting as one browser.
pub struct TestApp {
    pub store: MemoryStore,
    sessions: tower_sessions::MemoryStore,
    router: Router,
    cookie: Option<String>,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    #[must_use]
    pub fn new() -> Self {
        let store = MemoryStore::new();
        let sessions = tower_sessions::MemoryStore::default();
        let state = AppState::new(test_config(), store.clone());
        let router = routes::app(state, session_layer(sessions.clone(), false));
        Self {
            store,
            sessions,
            router,
            cookie: None,
        }
    }

    /// Another browser against the same shop.
    #[must_use]
    pub fn new_visitor(&self) -> Self {
        Self {
            store: self.store.clone(),
            sessions: self.sessions.clone(),
            router: self.router.clone(),
            cookie: None,
        }
    }

    /// Start a fresh session as a logged-in customer, the way the auth
    /// service leaves it.
    pub async fn login(&mut self, customer: &CurrentCustomer) {
        let mut record = Record {
            id: Id::default(),
            data: HashMap::from([(
                session_keys::CURRENT_CUSTOMER.to_string(),
                serde_json::to_value(customer).unwrap(),
            )]),
            expiry_date: OffsetDateTime::now_utc() + time::Duration::days(1),
        };
        self.sessions.create(&mut record).await.unwrap();
        self.cookie = Some(format!("{SESSION_COOKIE_NAME}={}", record.id));
    }

    pub async fn add_product(&self, name: &str, price: i64, stock: i32) -> Product {
        self.store.add_product(product(name, price, stock)).await
    }

    async fn send(&mut self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();

        if let Some(set_cookie) = response.headers().get(header::SET_COOKIE) {
            let pair = set_cookie.to_str().unwrap().split(';').next().unwrap();
            self.cookie = Some(pair.to_string());
        }

        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        TestResponse {
            status,
            headers,
            body,
        }
    }

    fn request(&self, method: Method, path: &str, admin: bool) -> axum::http::request::Builder {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        if admin {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {ADMIN_TOKEN}"));
        }
        builder
    }

    fn form_body(fields: &[(&str, String)]) -> Body {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields.iter().map(|(key, value)| (*key, value.as_str())))
            .finish();
        Body::from(encoded)
    }

    pub async fn get(&mut self, path: &str) -> TestResponse {
        let request = self
            .request(Method::GET, path, false)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn post_form(&mut self, path: &str, fields: &[(&str, String)]) -> TestResponse {
        let request = self
            .request(Method::POST, path, false)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Self::form_body(fields))
            .unwrap();
        self.send(request).await
    }

    pub async fn admin_get(&mut self, path: &str) -> TestResponse {
        let request = self
            .request(Method::GET, path, true)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn admin_post(&mut self, path: &str, fields: &[(&str, String)]) -> TestResponse {
        let request = self
            .request(Method::POST, path, true)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Self::form_body(fields))
            .unwrap();
        self.send(request).await
    }

    pub async fn admin_delete(&mut self, path: &str) -> TestResponse {
        let request = self
            .request(Method::DELETE, path, true)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// Add a product to this visitor's cart, asserting success.
    pub async fn add_to_cart(&mut self, product: &Product, quantity: u32) {
        let response = self
            .post_form(
                "/cart/add",
                &[
                    ("product_id", product.id.to_string()),
                    ("quantity", quantity.to_string()),
                ],
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.text());
    }
}
