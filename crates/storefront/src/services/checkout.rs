//! Order assembly.
//!
//! Turns the session cart into a persisted order inside one checkout
//! transaction: stock is re-checked and reserved under row locks, the coupon
//! is validated against locked usage counts, the day's next order number is
//! taken, and the header, lines and coupon usage are written together. Any
//! failure drops the transaction, which undoes every write.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::Deserialize;
use tracing::instrument;

use pasar_core::{
    Cart, CategoryId, Coupon, CouponContext, Customer, LineSpec, Money, OrderId, OrderNumber,
    OrderNumberError, OrderTotals, PaymentMethod, ProductId, Quantity, ShippingPolicy,
};

use super::ServiceError;
use crate::db::{CheckoutStore, CheckoutTx, OrderStore, RepositoryError};
use crate::models::{NewCouponUsage, NewOrder, NewOrderLine, Order, ShippingAddress};

/// Attempts before a persistently taken order number is reported.
const MAX_ATTEMPTS: u32 = 3;

/// What the shopper submits at checkout, besides the cart.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub customer: Customer,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub coupon_code: Option<String>,
}

impl CheckoutRequest {
    fn validate(&self) -> Result<(), ServiceError> {
        let address = &self.shipping_address;
        let required = [
            ("recipient name", address.recipient_name.as_str()),
            ("phone", address.phone.as_str()),
            ("address", address.address_line.as_str()),
            ("city", address.city.as_str()),
            ("province", address.province.as_str()),
            ("postal code", address.postal_code.as_str()),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(ServiceError::Validation(format!("{field} is required")));
        }
        if let Some(guest) = self.customer.guest()
            && guest.name.trim().is_empty()
        {
            return Err(ServiceError::Validation("name is required".to_owned()));
        }
        Ok(())
    }

    fn coupon_code(&self) -> Option<&str> {
        self.coupon_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
    }
}

/// Why one attempt at placing an order stopped.
enum AttemptError {
    /// Another checkout took the order number first; retry from scratch.
    NumberTaken,
    Failed(ServiceError),
}

impl From<ServiceError> for AttemptError {
    fn from(err: ServiceError) -> Self {
        Self::Failed(err)
    }
}

impl From<RepositoryError> for AttemptError {
    fn from(err: RepositoryError) -> Self {
        Self::Failed(ServiceError::Persistence(err))
    }
}

/// Places orders against a store.
pub struct OrderAssembler<'a, S> {
    store: &'a S,
    shipping: ShippingPolicy,
    prefix: &'a str,
    utc_offset: FixedOffset,
}

impl<'a, S> OrderAssembler<'a, S>
where
    S: CheckoutStore + OrderStore,
{
    /// An assembler that dates order numbers in UTC.
    #[must_use]
    pub fn new(store: &'a S, shipping: ShippingPolicy, prefix: &'a str) -> Self {
        Self {
            store,
            shipping,
            prefix,
            utc_offset: Utc.fix(),
        }
    }

    /// Date order numbers in the shop's local time instead of UTC.
    #[must_use]
    pub const fn with_utc_offset(mut self, utc_offset: FixedOffset) -> Self {
        self.utc_offset = utc_offset;
        self
    }

    /// Place an order for everything in `cart`.
    ///
    /// The cart is not modified; the caller clears it once this returns `Ok`.
    ///
    /// # Errors
    ///
    /// - `EmptyCart` if the cart has no lines
    /// - `Validation` if the shipping address or guest contact is incomplete
    /// - `NotFound` if a product (missing or inactive) or the coupon is unknown
    /// - `Conflict` if stock is insufficient or no order number could be taken
    /// - `CouponInvalid` if the coupon cannot be applied to this order
    /// - `Persistence` if the store fails
    #[instrument(
        skip(self, cart, request),
        fields(items = cart.items().len(), coupon = request.coupon_code())
    )]
    pub async fn place_order(
        &self,
        cart: &Cart,
        request: &CheckoutRequest,
        now: DateTime<Utc>,
    ) -> Result<Order, ServiceError> {
        if cart.is_empty() {
            return Err(ServiceError::EmptyCart);
        }
        request.validate()?;

        let mut attempt = 1;
        let order_id = loop {
            match self.attempt(cart, request, now).await {
                Ok(id) => break id,
                Err(AttemptError::NumberTaken) if attempt < MAX_ATTEMPTS => {
                    tracing::warn!(attempt, "order number taken, retrying checkout");
                    attempt += 1;
                }
                Err(AttemptError::NumberTaken) => {
                    return Err(ServiceError::Conflict(
                        "could not allocate an order number, please retry".to_owned(),
                    ));
                }
                Err(AttemptError::Failed(err)) => return Err(err),
            }
        };

        let order = self
            .store
            .order(order_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = %order.totals.total,
            "order placed"
        );
        Ok(order)
    }

    async fn attempt(
        &self,
        cart: &Cart,
        request: &CheckoutRequest,
        now: DateTime<Utc>,
    ) -> Result<OrderId, AttemptError> {
        let mut tx = self.store.begin().await?;

        let mut wanted: BTreeMap<ProductId, Quantity> = BTreeMap::new();
        for item in cart.items() {
            let total = match wanted.get(&item.product_id) {
                Some(sum) => sum
                    .checked_add(item.quantity)
                    .map_err(|e| ServiceError::Validation(e.to_string()))?,
                None => item.quantity,
            };
            wanted.insert(item.product_id, total);
        }

        // Rows are locked in ascending id order so concurrent checkouts
        // sharing products cannot deadlock.
        let mut products = BTreeMap::new();
        for (&product_id, &quantity) in &wanted {
            let product = tx
                .lock_product(product_id)
                .await?
                .filter(|p| p.is_active)
                .ok_or_else(|| ServiceError::NotFound(format!("product {product_id}")))?;

            tx.reserve_stock(product.id, quantity)
                .await
                .map_err(|e| match e {
                    RepositoryError::Conflict(_) => AttemptError::Failed(ServiceError::Conflict(
                        format!("insufficient stock for {}", product.name),
                    )),
                    other => other.into(),
                })?;

            products.insert(product_id, product);
        }

        let product_ids: Vec<ProductId> = products.keys().copied().collect();
        let category_ids: Vec<CategoryId> = products
            .values()
            .filter_map(|p| p.category_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut lines = Vec::with_capacity(cart.items().len());
        for item in cart.items() {
            let product = products
                .get(&item.product_id)
                .ok_or_else(|| ServiceError::NotFound(format!("product {}", item.product_id)))?;
            lines.push(NewOrderLine {
                product_id: product.id,
                product_name: product.name.clone(),
                sku: product.sku.clone(),
                image: product.image.clone(),
                unit_price: item.price_at_add,
                quantity: item.quantity,
                subtotal: item.line_total(),
                spec: LineSpec {
                    variant: item.variant.clone(),
                    note: item.note.clone(),
                },
            });
        }

        let subtotal: Money = lines.iter().map(|line| line.subtotal).sum();
        let user_id = request.customer.user_id();

        let coupon = match request.coupon_code() {
            Some(code) => {
                let coupon = tx
                    .lock_coupon(code)
                    .await?
                    .ok_or_else(|| ServiceError::NotFound(format!("coupon {code}")))?;
                let usage = tx.coupon_usage(coupon.id, user_id).await?;
                let context = CouponContext {
                    user_id,
                    subtotal,
                    category_ids: &category_ids,
                    product_ids: &product_ids,
                };
                coupon
                    .validate(&context, usage, now)
                    .map_err(ServiceError::from)?;
                Some(coupon)
            }
            None => None,
        };

        let discount = coupon
            .as_ref()
            .map_or(Money::ZERO, |c| c.compute_discount(subtotal));
        let totals = OrderTotals::new(subtotal, discount, self.shipping.cost_for(subtotal));

        let order_number = self.next_order_number(&mut tx, now).await?;

        let order_id = tx
            .insert_order(&NewOrder {
                order_number: order_number.to_string(),
                customer: request.customer.clone(),
                shipping_address: request.shipping_address.clone(),
                totals,
                coupon_code: coupon.as_ref().map(|c: &Coupon| c.code.clone()),
                payment_method: request.payment_method,
                created_at: now,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AttemptError::NumberTaken,
                other => other.into(),
            })?;

        for line in &lines {
            tx.insert_order_line(order_id, line).await?;
        }

        if let Some(coupon) = &coupon {
            tx.insert_coupon_usage(&NewCouponUsage {
                coupon_id: coupon.id,
                user_id,
                order_id,
                discount_applied: totals.discount,
                subtotal_before: subtotal,
            })
            .await?;
        }

        tx.commit().await?;
        Ok(order_id)
    }

    async fn next_order_number(
        &self,
        tx: &mut S::Tx,
        now: DateTime<Utc>,
    ) -> Result<OrderNumber, AttemptError> {
        let date = now.with_timezone(&self.utc_offset).date_naive();
        let stem = OrderNumber::day_stem(self.prefix, date);
        let latest = tx
            .latest_order_number(&stem)
            .await?
            .map(|number| OrderNumber::parse(&number))
            .transpose()
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;

        OrderNumber::next_after(self.prefix, date, latest.as_ref()).map_err(|e| match e {
            OrderNumberError::SequenceOverflow => AttemptError::Failed(ServiceError::Conflict(
                "no order numbers left for today".to_owned(),
            )),
            other => AttemptError::Failed(ServiceError::Validation(other.to_string())),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::db::{CatalogStore, CouponStore, Fault, MemoryStore};
    use crate::services::fixtures;
    use pasar_core::{CouponRejection, FulfillmentStatus, PaymentStatus};

    fn request(customer: Customer, coupon: Option<&str>) -> CheckoutRequest {
        CheckoutRequest {
            customer,
            shipping_address: fixtures::address(),
            payment_method: PaymentMethod::BankTransfer,
            coupon_code: coupon.map(str::to_owned),
        }
    }

    fn cart_with(product: &crate::models::Product, quantity: u32) -> Cart {
        let mut cart = Cart::new();
        cart.add_item(product.id, product.price, Quantity::new(quantity).unwrap(), None, None)
            .unwrap();
        cart
    }

    fn assembler(store: &MemoryStore) -> OrderAssembler<'_, MemoryStore> {
        OrderAssembler::new(store, ShippingPolicy::default(), "ORD")
    }

    #[tokio::test]
    async fn test_place_order_with_coupon() {
        let store = MemoryStore::new();
        let product = store.add_product(fixtures::product("Batik Tulis", 150_000, 10)).await;
        let coupon = store.add_coupon(fixtures::save10()).await;
        let cart = cart_with(&product, 2);

        let order = assembler(&store)
            .place_order(&cart, &request(fixtures::registered(7), Some("save10")), fixtures::now())
            .await
            .unwrap();

        // 10% of 300 000 is capped at 25 000; the flat fee applies below 400 000.
        assert_eq!(order.totals.subtotal, Money::from_units(300_000));
        assert_eq!(order.totals.discount, Money::from_units(25_000));
        assert_eq!(order.totals.shipping, Money::from_units(25_000));
        assert_eq!(order.totals.total, Money::from_units(300_000));
        assert_eq!(order.order_number, "ORD-20261016-0001");
        assert_eq!(order.coupon_code.as_deref(), Some("SAVE10"));
        assert_eq!(order.fulfillment_status, FulfillmentStatus::PendingPayment);
        assert_eq!(order.payment_status, PaymentStatus::Unpaid);

        assert_eq!(order.lines.len(), 1);
        assert_eq!(order.lines[0].subtotal, Money::from_units(300_000));
        assert_eq!(order.lines[0].product_name, "Batik Tulis");

        let usages = store.coupon_usages_for_order(order.id).await.unwrap();
        assert_eq!(usages.len(), 1);
        assert_eq!(usages[0].coupon_id, coupon.id);
        assert_eq!(usages[0].discount_applied, Money::from_units(25_000));

        let stock = store.product(product.id).await.unwrap().unwrap().stock;
        assert_eq!(stock, 8);
    }

    #[tokio::test]
    async fn test_empty_cart_is_rejected() {
        let store = MemoryStore::new();
        let result = assembler(&store)
            .place_order(&Cart::new(), &request(fixtures::registered(7), None), fixtures::now())
            .await;
        assert!(matches!(result, Err(ServiceError::EmptyCart)));
    }

    #[tokio::test]
    async fn test_blank_address_is_rejected() {
        let store = MemoryStore::new();
        let product = store.add_product(fixtures::product("Batik Tulis", 150_000, 10)).await;
        let mut req = request(fixtures::guest("dewi@example.id"), None);
        req.shipping_address.city = "  ".to_owned();

        let result = assembler(&store)
            .place_order(&cart_with(&product, 1), &req, fixtures::now())
            .await;
        assert!(matches!(result, Err(ServiceError::Validation(msg)) if msg.contains("city")));
    }

    #[tokio::test]
    async fn test_order_numbers_increase_within_a_day() {
        let store = MemoryStore::new();
        let product = store.add_product(fixtures::product("Kopi Toraja", 95_000, 50)).await;
        let assembler = assembler(&store);

        let mut numbers = Vec::new();
        for _ in 0..3 {
            let order = assembler
                .place_order(&cart_with(&product, 1), &request(fixtures::registered(7), None), fixtures::now())
                .await
                .unwrap();
            numbers.push(order.order_number);
        }

        assert_eq!(
            numbers,
            ["ORD-20261016-0001", "ORD-20261016-0002", "ORD-20261016-0003"]
        );
    }

    #[tokio::test]
    async fn test_taken_order_number_is_retried() {
        let store = MemoryStore::new();
        let product = store.add_product(fixtures::product("Kopi Toraja", 95_000, 50)).await;
        store.fail_at(Fault::OrderNumberTaken).await;

        let order = assembler(&store)
            .place_order(&cart_with(&product, 1), &request(fixtures::registered(7), None), fixtures::now())
            .await
            .unwrap();

        assert_eq!(order.order_number, "ORD-20261016-0001");
        assert_eq!(store.counts().await.orders, 1);
    }

    #[tokio::test]
    async fn test_failure_after_coupon_validation_rolls_everything_back() {
        for fault in [Fault::InsertOrder, Fault::InsertOrderLine, Fault::InsertCouponUsage, Fault::Commit] {
            let store = MemoryStore::new();
            let product = store.add_product(fixtures::product("Batik Tulis", 150_000, 10)).await;
            store.add_coupon(fixtures::save10()).await;
            store.fail_at(fault).await;

            let result = assembler(&store)
                .place_order(
                    &cart_with(&product, 2),
                    &request(fixtures::registered(7), Some("SAVE10")),
                    fixtures::now(),
                )
                .await;

            assert!(
                matches!(result, Err(ServiceError::Persistence(_))),
                "{fault:?} should surface as a persistence error"
            );
            let counts = store.counts().await;
            assert_eq!((counts.orders, counts.order_lines, counts.coupon_usages), (0, 0, 0));
            let stock = store.product(product.id).await.unwrap().unwrap().stock;
            assert_eq!(stock, 10, "{fault:?} leaked a stock reservation");
        }
    }

    #[tokio::test]
    async fn test_insufficient_stock_is_a_conflict() {
        let store = MemoryStore::new();
        let product = store.add_product(fixtures::product("Tenun Ikat", 500_000, 1)).await;

        let result = assembler(&store)
            .place_order(&cart_with(&product, 2), &request(fixtures::registered(7), None), fixtures::now())
            .await;

        assert!(matches!(result, Err(ServiceError::Conflict(_))));
        assert_eq!(store.counts().await.orders, 0);
    }

    #[tokio::test]
    async fn test_unknown_and_rejected_coupons() {
        let store = MemoryStore::new();
        let product = store.add_product(fixtures::product("Batik Tulis", 150_000, 10)).await;
        let mut expired = fixtures::save10();
        expired.code = "OLD".to_owned();
        expired.valid_until = fixtures::now() - chrono::Duration::days(1);
        store.add_coupon(expired).await;
        let assembler = assembler(&store);
        let cart = cart_with(&product, 1);

        let unknown = assembler
            .place_order(&cart, &request(fixtures::registered(7), Some("NOPE")), fixtures::now())
            .await;
        assert!(matches!(unknown, Err(ServiceError::NotFound(_))));

        let rejected = assembler
            .place_order(&cart, &request(fixtures::registered(7), Some("old")), fixtures::now())
            .await;
        assert!(matches!(
            rejected,
            Err(ServiceError::CouponInvalid(CouponRejection::Expired))
        ));
        assert_eq!(store.counts().await.orders, 0);
    }

    #[tokio::test]
    async fn test_per_user_limit_counts_previous_orders() {
        let store = MemoryStore::new();
        let product = store.add_product(fixtures::product("Batik Tulis", 150_000, 10)).await;
        let mut once = fixtures::save10();
        once.usage_limit_per_user = Some(1);
        store.add_coupon(once).await;
        let assembler = assembler(&store);
        let cart = cart_with(&product, 1);

        assembler
            .place_order(&cart, &request(fixtures::registered(7), Some("SAVE10")), fixtures::now())
            .await
            .unwrap();
        let second = assembler
            .place_order(&cart, &request(fixtures::registered(7), Some("SAVE10")), fixtures::now())
            .await;
        assert!(matches!(
            second,
            Err(ServiceError::CouponInvalid(CouponRejection::PerUserLimitReached))
        ));

        // A different customer is unaffected.
        assembler
            .place_order(&cart, &request(fixtures::registered(8), Some("SAVE10")), fixtures::now())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_global_usage_limit_is_shared_across_orders() {
        let store = MemoryStore::new();
        let product = store.add_product(fixtures::product("Batik Tulis", 150_000, 10)).await;
        let mut limited = fixtures::save10();
        limited.usage_limit = Some(2);
        let coupon = store.add_coupon(limited).await;
        let assembler = assembler(&store);
        let cart = cart_with(&product, 1);

        for customer in [fixtures::registered(7), fixtures::guest("dewi@example.id")] {
            assembler
                .place_order(&cart, &request(customer, Some("SAVE10")), fixtures::now())
                .await
                .unwrap();
        }

        let third = assembler
            .place_order(&cart, &request(fixtures::registered(8), Some("SAVE10")), fixtures::now())
            .await;
        assert!(matches!(
            third,
            Err(ServiceError::CouponInvalid(CouponRejection::UsageLimitReached))
        ));

        let counts = store.counts().await;
        assert_eq!((counts.orders, counts.order_lines, counts.coupon_usages), (2, 2, 2));
        assert_eq!(store.coupon_usage(coupon.id, None).await.unwrap().total, 2);
        let stock = store.product(product.id).await.unwrap().unwrap().stock;
        assert_eq!(stock, 8);
    }

    #[tokio::test]
    async fn test_stock_is_reserved_per_product_across_variants() {
        let store = MemoryStore::new();
        let kain = store.add_product(fixtures::product("Kain Songket", 80_000, 3)).await;
        let kopi = store.add_product(fixtures::product("Kopi Gayo", 60_000, 5)).await;

        let mut cart = Cart::new();
        cart.add_item(kopi.id, kopi.price, Quantity::ONE, None, None).unwrap();
        cart.add_item(kain.id, kain.price, Quantity::new(2).unwrap(), Some("Merah".to_owned()), None)
            .unwrap();
        cart.add_item(kain.id, kain.price, Quantity::new(2).unwrap(), Some("Biru".to_owned()), None)
            .unwrap();

        let result = assembler(&store)
            .place_order(&cart, &request(fixtures::registered(7), None), fixtures::now())
            .await;
        assert!(matches!(result, Err(ServiceError::Conflict(msg)) if msg.contains("Kain Songket")));
        assert_eq!(store.product(kopi.id).await.unwrap().unwrap().stock, 5);
        assert_eq!(store.product(kain.id).await.unwrap().unwrap().stock, 3);
    }

    #[tokio::test]
    async fn test_lines_follow_cart_order() {
        let store = MemoryStore::new();
        let kain = store.add_product(fixtures::product("Kain Songket", 80_000, 3)).await;
        let kopi = store.add_product(fixtures::product("Kopi Gayo", 60_000, 5)).await;

        let mut cart = Cart::new();
        cart.add_item(kopi.id, kopi.price, Quantity::ONE, None, None).unwrap();
        cart.add_item(kain.id, kain.price, Quantity::ONE, Some("Merah".to_owned()), None)
            .unwrap();
        cart.add_item(kain.id, kain.price, Quantity::ONE, Some("Biru".to_owned()), None)
            .unwrap();

        let order = assembler(&store)
            .place_order(&cart, &request(fixtures::registered(7), None), fixtures::now())
            .await
            .unwrap();

        let names: Vec<_> = order.lines.iter().map(|l| l.product_name.as_str()).collect();
        assert_eq!(names, ["Kopi Gayo", "Kain Songket", "Kain Songket"]);
        assert_eq!(order.lines[2].spec.variant.as_deref(), Some("Biru"));
        assert_eq!(store.product(kain.id).await.unwrap().unwrap().stock, 1);
        assert_eq!(store.product(kopi.id).await.unwrap().unwrap().stock, 4);
    }

    #[tokio::test]
    async fn test_order_number_uses_the_shop_date() {
        let store = MemoryStore::new();
        let product = store.add_product(fixtures::product("Kopi Toraja", 95_000, 50)).await;
        // 18:30 UTC on the 16th is 01:30 on the 17th in UTC+7.
        let late_evening = fixtures::now() + chrono::Duration::hours(9);
        let wib = FixedOffset::east_opt(7 * 3600).unwrap();

        let local = assembler(&store)
            .with_utc_offset(wib)
            .place_order(&cart_with(&product, 1), &request(fixtures::registered(7), None), late_evening)
            .await
            .unwrap();
        assert_eq!(local.order_number, "ORD-20261017-0001");

        let utc = assembler(&store)
            .place_order(&cart_with(&product, 1), &request(fixtures::registered(7), None), late_evening)
            .await
            .unwrap();
        assert_eq!(utc.order_number, "ORD-20261016-0001");
    }

    #[tokio::test]
    async fn test_line_prices_come_from_the_cart_snapshot() {
        let store = MemoryStore::new();
        let mut product = store.add_product(fixtures::product("Batik Tulis", 150_000, 10)).await;
        let cart = cart_with(&product, 1);

        product.price = Money::from_units(175_000);
        product.name = "Batik Tulis Premium".to_owned();
        store.add_product(product.clone()).await;

        let order = assembler(&store)
            .place_order(&cart, &request(fixtures::guest("dewi@example.id"), None), fixtures::now())
            .await
            .unwrap();

        assert_eq!(order.lines[0].unit_price, Money::from_units(150_000));
        assert_eq!(order.lines[0].product_name, "Batik Tulis Premium");
        assert_eq!(order.totals.shipping, Money::from_units(25_000));
    }
}
