//! Order aggregate types.
//!
//! An [`Order`] is a header plus its [`OrderLine`]s. Line product fields are
//! snapshots taken at checkout: they are written once and never refreshed from
//! the catalog, so invoices stay stable when products are renamed, repriced or
//! deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pasar_core::{
    CouponId, CouponUsageId, Customer, FulfillmentStatus, LineSpec, Money, OrderId, OrderLineId,
    OrderTotals, PaymentMethod, PaymentStatus, ProductId, Quantity, UserId,
};

/// Where the order ships to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub recipient_name: String,
    pub phone: String,
    pub address_line: String,
    pub city: String,
    pub province: String,
    pub postal_code: String,
}

/// A persisted order with its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub customer: Customer,
    pub shipping_address: ShippingAddress,
    pub totals: OrderTotals,
    pub coupon_code: Option<String>,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub fulfillment_status: FulfillmentStatus,
    pub courier: Option<String>,
    pub tracking_number: Option<String>,
    pub admin_notes: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub lines: Vec<OrderLine>,
}

impl Order {
    /// Whether `product_id` was bought in this order.
    #[must_use]
    pub fn contains_product(&self, product_id: ProductId) -> bool {
        self.lines
            .iter()
            .any(|line| line.product_id == Some(product_id))
    }
}

/// One line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: OrderLineId,
    pub order_id: OrderId,
    /// `None` once the product has been deleted from the catalog.
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub sku: String,
    pub image: Option<String>,
    pub unit_price: Money,
    pub quantity: Quantity,
    pub subtotal: Money,
    pub spec: LineSpec,
}

/// Header row list entry for the admin order list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub id: OrderId,
    pub order_number: String,
    pub total: Money,
    pub payment_status: PaymentStatus,
    pub fulfillment_status: FulfillmentStatus,
    pub created_at: DateTime<Utc>,
}

/// Filter for listing orders, newest first.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    pub fulfillment_status: Option<FulfillmentStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub limit: Option<i64>,
}

impl OrderFilter {
    /// Default and maximum page size.
    pub const MAX_LIMIT: i64 = 200;

    #[must_use]
    pub fn effective_limit(&self) -> i64 {
        self.limit.unwrap_or(Self::MAX_LIMIT).clamp(1, Self::MAX_LIMIT)
    }

    #[must_use]
    pub fn matches(&self, payment: PaymentStatus, fulfillment: FulfillmentStatus) -> bool {
        self.payment_status.is_none_or(|status| status == payment)
            && self.fulfillment_status.is_none_or(|status| status == fulfillment)
    }
}

/// Order header to insert at checkout.
///
/// New orders always start as `pending_payment` / `unpaid`.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: String,
    pub customer: Customer,
    pub shipping_address: ShippingAddress,
    pub totals: OrderTotals,
    pub coupon_code: Option<String>,
    pub payment_method: PaymentMethod,
    pub created_at: DateTime<Utc>,
}

/// Order line to insert at checkout.
#[derive(Debug, Clone)]
pub struct NewOrderLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub sku: String,
    pub image: Option<String>,
    pub unit_price: Money,
    pub quantity: Quantity,
    pub subtotal: Money,
    pub spec: LineSpec,
}

/// A recorded coupon redemption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CouponUsage {
    pub id: CouponUsageId,
    pub coupon_id: CouponId,
    pub user_id: Option<UserId>,
    pub order_id: OrderId,
    pub discount_applied: Money,
    pub subtotal_before: Money,
    pub created_at: DateTime<Utc>,
}

/// Coupon redemption to record with a new order.
#[derive(Debug, Clone)]
pub struct NewCouponUsage {
    pub coupon_id: CouponId,
    pub user_id: Option<UserId>,
    pub order_id: OrderId,
    pub discount_applied: Money,
    pub subtotal_before: Money,
}

/// A fulfillment transition, applied only if the order is still in `from`.
#[derive(Debug, Clone)]
pub struct FulfillmentChange {
    pub from: FulfillmentStatus,
    pub to: FulfillmentStatus,
    pub note: Option<String>,
    pub courier: Option<String>,
    pub tracking_number: Option<String>,
    pub at: DateTime<Utc>,
}

/// A payment transition, applied only if the payment is still in `from`.
#[derive(Debug, Clone)]
pub struct PaymentChange {
    pub from: PaymentStatus,
    pub to: PaymentStatus,
    pub note: Option<String>,
    pub at: DateTime<Utc>,
}
