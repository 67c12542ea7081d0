//! In-process store.
//!
//! A checkout transaction holds the store lock and writes to a staged copy of
//! the state; commit swaps the copy in, drop discards it. [`Fault`]s make a
//! chosen step fail so rollback paths can be exercised without a database.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use tokio::sync::{Mutex, OwnedMutexGuard};

use pasar_core::{
    Coupon, CouponId, CouponUsageId, FulfillmentStatus, OrderId, OrderLineId, PaymentStatus,
    ProductId, Quantity, ReviewId, ReviewStatus, UsageCounts, UserId,
};

use super::{
    CatalogStore, CheckoutStore, CheckoutTx, CouponStore, HealthCheck, OrderStore,
    RepositoryError, ReviewStore,
};
use crate::models::{
    CouponUsage, FulfillmentChange, NewCouponUsage, NewOrder, NewOrderLine, NewReview, Order,
    OrderFilter, OrderLine, OrderSummary, PaymentChange, Product, ProductRating, Review,
};

/// A checkout step to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Every `insert_order` fails with a database error.
    InsertOrder,
    /// The next `insert_order` reports a taken order number, once.
    OrderNumberTaken,
    /// Every `insert_order_line` fails.
    InsertOrderLine,
    /// Every `insert_coupon_usage` fails.
    InsertCouponUsage,
    /// Every `commit` fails.
    Commit,
}

/// Row counts, for asserting that nothing leaked out of a rolled back checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryCounts {
    pub orders: usize,
    pub order_lines: usize,
    pub coupon_usages: usize,
    pub reviews: usize,
}

#[derive(Debug, Clone, Default)]
struct Data {
    products: BTreeMap<ProductId, Product>,
    coupons: BTreeMap<CouponId, Coupon>,
    usages: Vec<CouponUsage>,
    orders: BTreeMap<OrderId, Order>,
    reviews: BTreeMap<ReviewId, Review>,
    last_id: i64,
}

impl Data {
    const fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn coupon_by_code(&self, code: &str) -> Option<Coupon> {
        let code = Coupon::normalize_code(code);
        self.coupons.values().find(|c| c.code == code).cloned()
    }

    fn usage(&self, coupon_id: CouponId, user_id: Option<UserId>) -> UsageCounts {
        let usages = self.usages.iter().filter(|u| u.coupon_id == coupon_id);
        let total = usages.clone().count();
        let by_user = user_id.map_or(0, |user_id| {
            usages.filter(|u| u.user_id == Some(user_id)).count()
        });
        UsageCounts {
            total: i64::try_from(total).unwrap_or(i64::MAX),
            by_user: i64::try_from(by_user).unwrap_or(i64::MAX),
        }
    }
}

fn injected(step: &str) -> RepositoryError {
    tracing::debug!(step, "injected fault");
    RepositoryError::Database(sqlx::Error::PoolTimedOut)
}

#[derive(Debug, Default)]
struct Shared {
    data: Data,
    fault: Option<Fault>,
}

/// Store backed by process memory. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Mutex<Shared>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a product, assigning an ID when `product.id` is zero.
    pub async fn add_product(&self, mut product: Product) -> Product {
        let mut shared = self.shared.lock().await;
        if product.id.as_i64() == 0 {
            product.id = ProductId::new(shared.data.next_id());
        }
        shared.data.products.insert(product.id, product.clone());
        product
    }

    /// Add a coupon, assigning an ID when `coupon.id` is zero.
    pub async fn add_coupon(&self, mut coupon: Coupon) -> Coupon {
        let mut shared = self.shared.lock().await;
        if coupon.id.as_i64() == 0 {
            coupon.id = CouponId::new(shared.data.next_id());
        }
        coupon.code = Coupon::normalize_code(&coupon.code);
        shared.data.coupons.insert(coupon.id, coupon.clone());
        coupon
    }

    /// Make a checkout step fail until [`Self::clear_fault`].
    pub async fn fail_at(&self, fault: Fault) {
        self.shared.lock().await.fault = Some(fault);
    }

    pub async fn clear_fault(&self) {
        self.shared.lock().await.fault = None;
    }

    pub async fn counts(&self) -> MemoryCounts {
        let shared = self.shared.lock().await;
        MemoryCounts {
            orders: shared.data.orders.len(),
            order_lines: shared.data.orders.values().map(|o| o.lines.len()).sum(),
            coupon_usages: shared.data.usages.len(),
            reviews: shared.data.reviews.len(),
        }
    }
}

impl HealthCheck for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

impl CatalogStore for MemoryStore {
    async fn product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.shared.lock().await.data.products.get(&id).cloned())
    }

    async fn products(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let shared = self.shared.lock().await;
        Ok(shared
            .data
            .products
            .values()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect())
    }
}

impl CouponStore for MemoryStore {
    async fn coupon_by_code(&self, code: &str) -> Result<Option<Coupon>, RepositoryError> {
        Ok(self.shared.lock().await.data.coupon_by_code(code))
    }

    async fn coupon_usage(
        &self,
        coupon_id: CouponId,
        user_id: Option<UserId>,
    ) -> Result<UsageCounts, RepositoryError> {
        Ok(self.shared.lock().await.data.usage(coupon_id, user_id))
    }
}

/// An open checkout on a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryTx {
    guard: OwnedMutexGuard<Shared>,
    staged: Data,
}

impl MemoryTx {
    fn check(&mut self, step: Fault) -> Result<(), RepositoryError> {
        match self.guard.fault {
            Some(Fault::OrderNumberTaken) if step == Fault::InsertOrder => {
                self.guard.fault = None;
                Err(RepositoryError::Conflict("order number already exists".to_owned()))
            }
            Some(fault) if fault == step => Err(injected(&format!("{step:?}"))),
            _ => Ok(()),
        }
    }
}

impl CheckoutStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<Self::Tx, RepositoryError> {
        let guard = Arc::clone(&self.shared).lock_owned().await;
        let staged = guard.data.clone();
        Ok(MemoryTx { guard, staged })
    }
}

impl CheckoutTx for MemoryTx {
    async fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.staged.products.get(&id).cloned())
    }

    async fn reserve_stock(
        &mut self,
        id: ProductId,
        quantity: Quantity,
    ) -> Result<(), RepositoryError> {
        let product = self
            .staged
            .products
            .get_mut(&id)
            .filter(|p| p.has_stock_for(quantity))
            .ok_or_else(|| {
                RepositoryError::Conflict(format!("insufficient stock for product {id}"))
            })?;
        product.stock -= i32::from(quantity);
        Ok(())
    }

    async fn lock_coupon(&mut self, code: &str) -> Result<Option<Coupon>, RepositoryError> {
        Ok(self.staged.coupon_by_code(code))
    }

    async fn coupon_usage(
        &mut self,
        coupon_id: CouponId,
        user_id: Option<UserId>,
    ) -> Result<UsageCounts, RepositoryError> {
        Ok(self.staged.usage(coupon_id, user_id))
    }

    async fn latest_order_number(
        &mut self,
        day_stem: &str,
    ) -> Result<Option<String>, RepositoryError> {
        Ok(self
            .staged
            .orders
            .values()
            .map(|o| o.order_number.as_str())
            .filter(|n| n.starts_with(day_stem))
            .max_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
            .map(str::to_owned))
    }

    async fn insert_order(&mut self, order: &NewOrder) -> Result<OrderId, RepositoryError> {
        self.check(Fault::InsertOrder)?;
        if self
            .staged
            .orders
            .values()
            .any(|o| o.order_number == order.order_number)
        {
            return Err(RepositoryError::Conflict(
                "order number already exists".to_owned(),
            ));
        }

        let id = OrderId::new(self.staged.next_id());
        self.staged.orders.insert(
            id,
            Order {
                id,
                order_number: order.order_number.clone(),
                customer: order.customer.clone(),
                shipping_address: order.shipping_address.clone(),
                totals: order.totals,
                coupon_code: order.coupon_code.clone(),
                payment_method: order.payment_method,
                payment_status: PaymentStatus::default(),
                fulfillment_status: FulfillmentStatus::default(),
                courier: None,
                tracking_number: None,
                admin_notes: None,
                paid_at: None,
                shipped_at: None,
                completed_at: None,
                cancelled_at: None,
                created_at: order.created_at,
                updated_at: order.created_at,
                lines: Vec::new(),
            },
        );
        Ok(id)
    }

    async fn insert_order_line(
        &mut self,
        order_id: OrderId,
        line: &NewOrderLine,
    ) -> Result<OrderLineId, RepositoryError> {
        self.check(Fault::InsertOrderLine)?;
        let id = OrderLineId::new(self.staged.next_id());
        let order = self
            .staged
            .orders
            .get_mut(&order_id)
            .ok_or(RepositoryError::NotFound)?;
        order.lines.push(OrderLine {
            id,
            order_id,
            product_id: Some(line.product_id),
            product_name: line.product_name.clone(),
            sku: line.sku.clone(),
            image: line.image.clone(),
            unit_price: line.unit_price,
            quantity: line.quantity,
            subtotal: line.subtotal,
            spec: line.spec.clone(),
        });
        Ok(id)
    }

    async fn insert_coupon_usage(&mut self, usage: &NewCouponUsage) -> Result<(), RepositoryError> {
        self.check(Fault::InsertCouponUsage)?;
        if self.staged.usages.iter().any(|u| u.order_id == usage.order_id) {
            return Err(RepositoryError::Conflict(
                "coupon usage already recorded for order".to_owned(),
            ));
        }
        let id = CouponUsageId::new(self.staged.next_id());
        self.staged.usages.push(CouponUsage {
            id,
            coupon_id: usage.coupon_id,
            user_id: usage.user_id,
            order_id: usage.order_id,
            discount_applied: usage.discount_applied,
            subtotal_before: usage.subtotal_before,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn commit(mut self) -> Result<(), RepositoryError> {
        self.check(Fault::Commit)?;
        self.guard.data = self.staged;
        Ok(())
    }
}

impl OrderStore for MemoryStore {
    async fn order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.shared.lock().await.data.orders.get(&id).cloned())
    }

    async fn order_by_number(&self, order_number: &str) -> Result<Option<Order>, RepositoryError> {
        let shared = self.shared.lock().await;
        Ok(shared
            .data
            .orders
            .values()
            .find(|o| o.order_number == order_number)
            .cloned())
    }

    async fn list_orders(
        &self,
        filter: &OrderFilter,
    ) -> Result<Vec<OrderSummary>, RepositoryError> {
        let shared = self.shared.lock().await;
        let mut orders: Vec<&Order> = shared
            .data
            .orders
            .values()
            .filter(|o| filter.matches(o.payment_status, o.fulfillment_status))
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(orders
            .into_iter()
            .take(usize::try_from(filter.effective_limit()).unwrap_or(usize::MAX))
            .map(|o| OrderSummary {
                id: o.id,
                order_number: o.order_number.clone(),
                total: o.totals.total,
                payment_status: o.payment_status,
                fulfillment_status: o.fulfillment_status,
                created_at: o.created_at,
            })
            .collect())
    }

    async fn update_fulfillment(
        &self,
        id: OrderId,
        change: &FulfillmentChange,
    ) -> Result<bool, RepositoryError> {
        let mut shared = self.shared.lock().await;
        let data = &mut shared.data;
        let Some(order) = data
            .orders
            .get_mut(&id)
            .filter(|o| o.fulfillment_status == change.from)
        else {
            return Ok(false);
        };

        order.fulfillment_status = change.to;
        if let Some(note) = &change.note {
            order.admin_notes = Some(note.clone());
        }
        if let Some(courier) = &change.courier {
            order.courier = Some(courier.clone());
        }
        if let Some(tracking) = &change.tracking_number {
            order.tracking_number = Some(tracking.clone());
        }
        match change.to {
            FulfillmentStatus::Shipped => order.shipped_at = Some(change.at),
            FulfillmentStatus::Completed => order.completed_at = Some(change.at),
            FulfillmentStatus::Cancelled => order.cancelled_at = Some(change.at),
            _ => {}
        }
        order.updated_at = change.at;

        if change.to == FulfillmentStatus::Cancelled {
            let returned: Vec<(ProductId, i32)> = order
                .lines
                .iter()
                .filter_map(|l| l.product_id.map(|p| (p, i32::from(l.quantity))))
                .collect();
            for (product_id, quantity) in returned {
                if let Some(product) = data.products.get_mut(&product_id) {
                    product.stock += quantity;
                }
            }
        }
        Ok(true)
    }

    async fn update_payment(
        &self,
        id: OrderId,
        change: &PaymentChange,
    ) -> Result<bool, RepositoryError> {
        let mut shared = self.shared.lock().await;
        let Some(order) = shared
            .data
            .orders
            .get_mut(&id)
            .filter(|o| o.payment_status == change.from)
        else {
            return Ok(false);
        };

        order.payment_status = change.to;
        if let Some(note) = &change.note {
            order.admin_notes = Some(note.clone());
        }
        if change.to == PaymentStatus::Paid {
            order.paid_at = Some(change.at);
        }
        order.updated_at = change.at;
        Ok(true)
    }

    async fn delete_cancelled_order(&self, id: OrderId) -> Result<bool, RepositoryError> {
        let mut shared = self.shared.lock().await;
        let data = &mut shared.data;
        let cancelled = data
            .orders
            .get(&id)
            .is_some_and(|o| o.fulfillment_status == FulfillmentStatus::Cancelled);
        if !cancelled {
            return Ok(false);
        }

        data.orders.remove(&id);
        data.usages.retain(|u| u.order_id != id);
        data.reviews.retain(|_, r| r.order_id != id);
        Ok(true)
    }

    async fn coupon_usages_for_order(
        &self,
        id: OrderId,
    ) -> Result<Vec<CouponUsage>, RepositoryError> {
        let shared = self.shared.lock().await;
        Ok(shared
            .data
            .usages
            .iter()
            .filter(|u| u.order_id == id)
            .cloned()
            .collect())
    }
}

impl ReviewStore for MemoryStore {
    async fn insert_review(&self, review: &NewReview) -> Result<Review, RepositoryError> {
        let mut shared = self.shared.lock().await;
        let data = &mut shared.data;
        if data
            .reviews
            .values()
            .any(|r| r.product_id == review.product_id && r.order_id == review.order_id)
        {
            return Err(RepositoryError::Conflict(
                "review for this product and order already exists".to_owned(),
            ));
        }

        let review = Review {
            id: ReviewId::new(data.next_id()),
            product_id: review.product_id,
            order_id: review.order_id,
            user_id: review.user_id,
            reviewer_name: review.reviewer_name.clone(),
            rating: review.rating,
            body: review.body.clone(),
            status: ReviewStatus::Pending,
            rejection_reason: None,
            created_at: review.created_at,
        };
        data.reviews.insert(review.id, review.clone());
        Ok(review)
    }

    async fn review(&self, id: ReviewId) -> Result<Option<Review>, RepositoryError> {
        Ok(self.shared.lock().await.data.reviews.get(&id).cloned())
    }

    async fn set_review_status(
        &self,
        id: ReviewId,
        status: ReviewStatus,
        rejection_reason: Option<&str>,
    ) -> Result<Option<Review>, RepositoryError> {
        let mut shared = self.shared.lock().await;
        Ok(shared.data.reviews.get_mut(&id).map(|review| {
            review.status = status;
            review.rejection_reason = rejection_reason.map(str::to_owned);
            review.clone()
        }))
    }

    async fn product_rating(&self, product_id: ProductId) -> Result<ProductRating, RepositoryError> {
        let shared = self.shared.lock().await;
        let ratings: Vec<i64> = shared
            .data
            .reviews
            .values()
            .filter(|r| r.product_id == product_id && r.status == ReviewStatus::Approved)
            .map(|r| i64::from(r.rating.get()))
            .collect();
        let review_count = i64::try_from(ratings.len()).unwrap_or(i64::MAX);
        let average = (review_count > 0).then(|| {
            (Decimal::from(ratings.iter().sum::<i64>()) / Decimal::from(review_count))
                .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
        });

        Ok(ProductRating {
            product_id,
            review_count,
            average,
        })
    }
}
