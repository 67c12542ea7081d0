//! Checkout transaction for [`PgStore`].
//!
//! Concurrency is handled with row locks (`SELECT ... FOR UPDATE`) on the
//! products and coupon being consumed, a transaction-scoped advisory lock on
//! the order-number day stem, and the unique constraint on `order_number`.

use sqlx::types::Json;
use sqlx::{Postgres, Transaction};

use pasar_core::{Coupon, CouponId, OrderId, OrderLineId, ProductId, Quantity, UsageCounts, UserId};

use super::catalog::PRODUCT_COLUMNS;
use super::coupons::{count_usage, fetch_coupon};
use super::{CheckoutStore, CheckoutTx, PgStore, RepositoryError, conflict_on_unique};
use crate::models::{NewCouponUsage, NewOrder, NewOrderLine, Product};

/// An open checkout transaction. Rolls back on drop unless committed.
#[derive(Debug)]
pub struct PgCheckoutTx {
    tx: Transaction<'static, Postgres>,
}

impl CheckoutStore for PgStore {
    type Tx = PgCheckoutTx;

    async fn begin(&self) -> Result<Self::Tx, RepositoryError> {
        let tx = self.pool().begin().await?;
        Ok(PgCheckoutTx { tx })
    }
}

impl CheckoutTx for PgCheckoutTx {
    async fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(product)
    }

    async fn reserve_stock(
        &mut self,
        id: ProductId,
        quantity: Quantity,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE products
            SET stock = stock - $2, updated_at = NOW()
            WHERE id = $1 AND stock >= $2
            ",
        )
        .bind(id)
        .bind(i32::from(quantity))
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict(format!(
                "insufficient stock for product {id}"
            )));
        }
        Ok(())
    }

    async fn lock_coupon(&mut self, code: &str) -> Result<Option<Coupon>, RepositoryError> {
        fetch_coupon(&mut *self.tx, code, true).await
    }

    async fn coupon_usage(
        &mut self,
        coupon_id: CouponId,
        user_id: Option<UserId>,
    ) -> Result<UsageCounts, RepositoryError> {
        count_usage(&mut *self.tx, coupon_id, user_id).await
    }

    async fn latest_order_number(
        &mut self,
        day_stem: &str,
    ) -> Result<Option<String>, RepositoryError> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(day_stem)
            .execute(&mut *self.tx)
            .await?;

        // Longest first so sequence 10000 sorts after 9999.
        let latest: Option<String> = sqlx::query_scalar(
            r"
            SELECT order_number
            FROM orders
            WHERE starts_with(order_number, $1)
            ORDER BY length(order_number) DESC, order_number DESC
            LIMIT 1
            ",
        )
        .bind(day_stem)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(latest)
    }

    async fn insert_order(&mut self, order: &NewOrder) -> Result<OrderId, RepositoryError> {
        let guest = order.customer.guest();
        let address = &order.shipping_address;

        let id: OrderId = sqlx::query_scalar(
            r"
            INSERT INTO orders (
                order_number, user_id, guest_name, guest_email, guest_phone,
                recipient_name, recipient_phone, address_line, city, province, postal_code,
                subtotal, discount, shipping_cost, total, coupon_code, payment_method,
                created_at, updated_at
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                $12, $13, $14, $15, $16, $17, $18, $18
            )
            RETURNING id
            ",
        )
        .bind(&order.order_number)
        .bind(order.customer.user_id())
        .bind(guest.map(|g| g.name.as_str()))
        .bind(guest.map(|g| g.email.as_str()))
        .bind(guest.map(|g| g.phone.as_str()))
        .bind(&address.recipient_name)
        .bind(&address.phone)
        .bind(&address.address_line)
        .bind(&address.city)
        .bind(&address.province)
        .bind(&address.postal_code)
        .bind(order.totals.subtotal)
        .bind(order.totals.discount)
        .bind(order.totals.shipping)
        .bind(order.totals.total)
        .bind(&order.coupon_code)
        .bind(order.payment_method)
        .bind(order.created_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| conflict_on_unique(e, "order number"))?;

        Ok(id)
    }

    async fn insert_order_line(
        &mut self,
        order_id: OrderId,
        line: &NewOrderLine,
    ) -> Result<OrderLineId, RepositoryError> {
        let id: OrderLineId = sqlx::query_scalar(
            r"
            INSERT INTO order_lines (
                order_id, product_id, product_name, sku, image,
                unit_price, quantity, subtotal, spec
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            ",
        )
        .bind(order_id)
        .bind(line.product_id)
        .bind(&line.product_name)
        .bind(&line.sku)
        .bind(&line.image)
        .bind(line.unit_price)
        .bind(i32::from(line.quantity))
        .bind(line.subtotal)
        .bind(Json(&line.spec))
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(id)
    }

    async fn insert_coupon_usage(&mut self, usage: &NewCouponUsage) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO coupon_usages (coupon_id, user_id, order_id, discount_applied, subtotal_before)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(usage.coupon_id)
        .bind(usage.user_id)
        .bind(usage.order_id)
        .bind(usage.discount_applied)
        .bind(usage.subtotal_before)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn commit(self) -> Result<(), RepositoryError> {
        self.tx.commit().await?;
        Ok(())
    }
}
