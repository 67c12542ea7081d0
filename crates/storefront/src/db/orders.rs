//! Order reads and admin mutations for [`PgStore`].

use chrono::{DateTime, Utc};
use sqlx::types::Json;

use pasar_core::{
    Customer, Email, FulfillmentStatus, GuestContact, LineSpec, Money, OrderId, OrderLineId,
    OrderTotals, PaymentMethod, PaymentStatus, ProductId, Quantity, UserId,
};

use super::{OrderStore, PgStore, RepositoryError};
use crate::models::{
    CouponUsage, FulfillmentChange, Order, OrderFilter, OrderLine, OrderSummary, PaymentChange,
    ShippingAddress,
};

const ORDER_COLUMNS: &str = "id, order_number, user_id, guest_name, guest_email, guest_phone, \
     recipient_name, recipient_phone, address_line, city, province, postal_code, \
     subtotal, discount, shipping_cost, total, coupon_code, payment_method, payment_status, \
     fulfillment_status, courier, tracking_number, admin_notes, paid_at, shipped_at, \
     completed_at, cancelled_at, created_at, updated_at";

/// Raw `orders` row.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    order_number: String,
    user_id: Option<UserId>,
    guest_name: Option<String>,
    guest_email: Option<String>,
    guest_phone: Option<String>,
    recipient_name: String,
    recipient_phone: String,
    address_line: String,
    city: String,
    province: String,
    postal_code: String,
    subtotal: Money,
    discount: Money,
    shipping_cost: Money,
    total: Money,
    coupon_code: Option<String>,
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
    fulfillment_status: FulfillmentStatus,
    courier: Option<String>,
    tracking_number: Option<String>,
    admin_notes: Option<String>,
    paid_at: Option<DateTime<Utc>>,
    shipped_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn customer(&self) -> Result<Customer, RepositoryError> {
        if let Some(user_id) = self.user_id {
            return Ok(Customer::Registered { user_id });
        }
        let email = self.guest_email.as_deref().ok_or_else(|| {
            RepositoryError::DataCorruption(format!(
                "order {} has neither a user nor a guest email",
                self.order_number
            ))
        })?;
        let email = Email::parse(email).map_err(|e| {
            RepositoryError::DataCorruption(format!(
                "order {} has an invalid guest email: {e}",
                self.order_number
            ))
        })?;

        Ok(Customer::Guest(GuestContact {
            name: self.guest_name.clone().unwrap_or_default(),
            email,
            phone: self.guest_phone.clone().unwrap_or_default(),
        }))
    }

    fn into_order(self, lines: Vec<OrderLine>) -> Result<Order, RepositoryError> {
        let customer = self.customer()?;
        Ok(Order {
            id: self.id,
            order_number: self.order_number,
            customer,
            shipping_address: ShippingAddress {
                recipient_name: self.recipient_name,
                phone: self.recipient_phone,
                address_line: self.address_line,
                city: self.city,
                province: self.province,
                postal_code: self.postal_code,
            },
            // Stored totals are authoritative; they are not recomputed.
            totals: OrderTotals {
                subtotal: self.subtotal,
                discount: self.discount,
                shipping: self.shipping_cost,
                total: self.total,
            },
            coupon_code: self.coupon_code,
            payment_method: self.payment_method,
            payment_status: self.payment_status,
            fulfillment_status: self.fulfillment_status,
            courier: self.courier,
            tracking_number: self.tracking_number,
            admin_notes: self.admin_notes,
            paid_at: self.paid_at,
            shipped_at: self.shipped_at,
            completed_at: self.completed_at,
            cancelled_at: self.cancelled_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
            lines,
        })
    }
}

/// Raw `order_lines` row.
#[derive(Debug, sqlx::FromRow)]
struct OrderLineRow {
    id: OrderLineId,
    order_id: OrderId,
    product_id: Option<ProductId>,
    product_name: String,
    sku: String,
    image: Option<String>,
    unit_price: Money,
    quantity: i32,
    subtotal: Money,
    spec: Json<LineSpec>,
}

impl TryFrom<OrderLineRow> for OrderLine {
    type Error = RepositoryError;

    fn try_from(row: OrderLineRow) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(row.quantity)
            .ok()
            .and_then(|q| Quantity::new(q).ok())
            .ok_or_else(|| {
                RepositoryError::DataCorruption(format!(
                    "order line {} has invalid quantity {}",
                    row.id, row.quantity
                ))
            })?;

        Ok(Self {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            product_name: row.product_name,
            sku: row.sku,
            image: row.image,
            unit_price: row.unit_price,
            quantity,
            subtotal: row.subtotal,
            spec: row.spec.0,
        })
    }
}

impl PgStore {
    async fn order_where(
        &self,
        clause: &str,
        bind: OrderKey<'_>,
    ) -> Result<Option<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE {clause}");
        let query = sqlx::query_as::<_, OrderRow>(&sql);
        let query = match bind {
            OrderKey::Id(id) => query.bind(id),
            OrderKey::Number(number) => query.bind(number),
        };
        let Some(row) = query.fetch_optional(self.pool()).await? else {
            return Ok(None);
        };

        let lines = sqlx::query_as::<_, OrderLineRow>(
            r"
            SELECT id, order_id, product_id, product_name, sku, image,
                   unit_price, quantity, subtotal, spec
            FROM order_lines
            WHERE order_id = $1
            ORDER BY id
            ",
        )
        .bind(row.id)
        .fetch_all(self.pool())
        .await?
        .into_iter()
        .map(OrderLine::try_from)
        .collect::<Result<Vec<_>, _>>()?;

        row.into_order(lines).map(Some)
    }
}

enum OrderKey<'a> {
    Id(OrderId),
    Number(&'a str),
}

impl OrderStore for PgStore {
    async fn order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        self.order_where("id = $1", OrderKey::Id(id)).await
    }

    async fn order_by_number(&self, order_number: &str) -> Result<Option<Order>, RepositoryError> {
        self.order_where("order_number = $1", OrderKey::Number(order_number))
            .await
    }

    async fn list_orders(
        &self,
        filter: &OrderFilter,
    ) -> Result<Vec<OrderSummary>, RepositoryError> {
        let rows: Vec<(OrderId, String, Money, PaymentStatus, FulfillmentStatus, DateTime<Utc>)> =
            sqlx::query_as(
                r"
                SELECT id, order_number, total, payment_status, fulfillment_status, created_at
                FROM orders
                WHERE ($1::fulfillment_status IS NULL OR fulfillment_status = $1)
                  AND ($2::payment_status IS NULL OR payment_status = $2)
                ORDER BY created_at DESC, id DESC
                LIMIT $3
                ",
            )
            .bind(filter.fulfillment_status)
            .bind(filter.payment_status)
            .bind(filter.effective_limit())
            .fetch_all(self.pool())
            .await?;

        Ok(rows
            .into_iter()
            .map(
                |(id, order_number, total, payment_status, fulfillment_status, created_at)| {
                    OrderSummary {
                        id,
                        order_number,
                        total,
                        payment_status,
                        fulfillment_status,
                        created_at,
                    }
                },
            )
            .collect())
    }

    async fn update_fulfillment(
        &self,
        id: OrderId,
        change: &FulfillmentChange,
    ) -> Result<bool, RepositoryError> {
        let mut tx = self.pool().begin().await?;

        let result = sqlx::query(
            r"
            UPDATE orders SET
                fulfillment_status = $3,
                admin_notes = COALESCE($4, admin_notes),
                courier = COALESCE($5, courier),
                tracking_number = COALESCE($6, tracking_number),
                shipped_at = CASE WHEN $3 = 'shipped'::fulfillment_status THEN $7 ELSE shipped_at END,
                completed_at = CASE WHEN $3 = 'completed'::fulfillment_status THEN $7 ELSE completed_at END,
                cancelled_at = CASE WHEN $3 = 'cancelled'::fulfillment_status THEN $7 ELSE cancelled_at END,
                updated_at = $7
            WHERE id = $1 AND fulfillment_status = $2
            ",
        )
        .bind(id)
        .bind(change.from)
        .bind(change.to)
        .bind(&change.note)
        .bind(&change.courier)
        .bind(&change.tracking_number)
        .bind(change.at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        if change.to == FulfillmentStatus::Cancelled {
            sqlx::query(
                r"
                UPDATE products p
                SET stock = p.stock + l.quantity, updated_at = NOW()
                FROM (
                    SELECT product_id, SUM(quantity)::INTEGER AS quantity
                    FROM order_lines
                    WHERE order_id = $1 AND product_id IS NOT NULL
                    GROUP BY product_id
                ) l
                WHERE p.id = l.product_id
                ",
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn update_payment(
        &self,
        id: OrderId,
        change: &PaymentChange,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE orders SET
                payment_status = $3,
                admin_notes = COALESCE($4, admin_notes),
                paid_at = CASE WHEN $3 = 'paid'::payment_status THEN $5 ELSE paid_at END,
                updated_at = $5
            WHERE id = $1 AND payment_status = $2
            ",
        )
        .bind(id)
        .bind(change.from)
        .bind(change.to)
        .bind(&change.note)
        .bind(change.at)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_cancelled_order(&self, id: OrderId) -> Result<bool, RepositoryError> {
        // Lines and coupon usages go with the header (ON DELETE CASCADE).
        let result =
            sqlx::query("DELETE FROM orders WHERE id = $1 AND fulfillment_status = 'cancelled'")
                .bind(id)
                .execute(self.pool())
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn coupon_usages_for_order(
        &self,
        id: OrderId,
    ) -> Result<Vec<CouponUsage>, RepositoryError> {
        let usages = sqlx::query_as::<_, CouponUsage>(
            r"
            SELECT id, coupon_id, user_id, order_id, discount_applied, subtotal_before, created_at
            FROM coupon_usages
            WHERE order_id = $1
            ",
        )
        .bind(id)
        .fetch_all(self.pool())
        .await?;

        Ok(usages)
    }
}
