//! Builders shared by the service tests.

#![allow(clippy::unwrap_used)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;

use pasar_core::{
    Coupon, CouponId, CouponScope, Customer, Discount, Email, GuestContact, Money, ProductId,
    UserId,
};

use crate::models::{Product, ShippingAddress};

/// 16 October 2026, 09:30 UTC.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 16, 9, 30, 0).unwrap()
}

pub fn product(name: &str, price: i64, stock: i32) -> Product {
    Product {
        id: ProductId::new(0),
        category_id: None,
        name: name.to_owned(),
        sku: name.to_uppercase().replace(' ', "-"),
        price: Money::from_units(price),
        stock,
        image: Some(format!("products/{}.jpg", name.to_lowercase().replace(' ', "-"))),
        is_active: true,
    }
}

/// `SAVE10`: 10% off, capped at 25 000, valid around [`now`].
pub fn save10() -> Coupon {
    Coupon {
        id: CouponId::new(0),
        code: "SAVE10".to_owned(),
        discount: Discount::Percentage {
            rate: Decimal::TEN,
            max_discount: Some(Money::from_units(25_000)),
        },
        min_purchase: None,
        usage_limit: None,
        usage_limit_per_user: None,
        scope: CouponScope::default(),
        valid_from: now() - Duration::days(30),
        valid_until: now() + Duration::days(30),
        is_active: true,
    }
}

pub fn registered(user_id: i64) -> Customer {
    Customer::Registered {
        user_id: UserId::new(user_id),
    }
}

pub fn guest(email: &str) -> Customer {
    Customer::Guest(GuestContact {
        name: "Dewi Lestari".to_owned(),
        email: Email::parse(email).unwrap(),
        phone: "081298765432".to_owned(),
    })
}

pub fn address() -> ShippingAddress {
    ShippingAddress {
        recipient_name: "Dewi Lestari".to_owned(),
        phone: "081298765432".to_owned(),
        address_line: "Jl. Diponegoro No. 21".to_owned(),
        city: "Yogyakarta".to_owned(),
        province: "DI Yogyakarta".to_owned(),
        postal_code: "55223".to_owned(),
    }
}
