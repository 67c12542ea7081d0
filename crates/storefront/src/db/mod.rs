//! Persistence for the cart-to-order pipeline.
//!
//! # Database
//!
//! ## Tables
//!
//! - `categories`, `products` - Catalog (read, stock reserved at checkout)
//! - `coupons` - Coupon definitions with JSONB allow-lists
//! - `coupon_usages` - One row per redemption
//! - `orders`, `order_lines` - Order aggregate with snapshot line fields
//! - `reviews` - Product reviews, one per (product, order)
//! - `tower_sessions.session` - Session storage (carts live here)
//!
//! # Stores
//!
//! Services are generic over the traits below. [`PgStore`] is the production
//! implementation; [`MemoryStore`] keeps everything in process and can inject
//! faults, which the test suites use to exercise rollback paths.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p pasar-cli -- migrate
//! ```

pub mod catalog;
pub mod checkout;
pub mod coupons;
pub mod memory;
pub mod orders;
pub mod reviews;

use std::future::Future;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use pasar_core::{
    Coupon, CouponId, OrderId, OrderLineId, ProductId, Quantity, ReviewId, ReviewStatus,
    UsageCounts, UserId,
};

use crate::models::{
    CouponUsage, FulfillmentChange, NewCouponUsage, NewOrder, NewOrderLine, NewReview, Order,
    OrderFilter, OrderSummary, PaymentChange, Product, ProductRating, Review,
};

pub use memory::{Fault, MemoryStore};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate order number or review).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Map a unique violation to `RepositoryError::Conflict`.
pub(crate) fn conflict_on_unique(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(e)
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// `PostgreSQL`-backed store. Cheap to clone.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Product lookups.
pub trait CatalogStore: Send + Sync {
    /// Fetch a product by ID.
    fn product(
        &self,
        id: ProductId,
    ) -> impl Future<Output = Result<Option<Product>, RepositoryError>> + Send;

    /// Fetch several products; missing IDs are skipped.
    fn products(
        &self,
        ids: &[ProductId],
    ) -> impl Future<Output = Result<Vec<Product>, RepositoryError>> + Send;
}

/// Coupon lookups outside of checkout (price previews).
pub trait CouponStore: Send + Sync {
    /// Fetch a coupon by code, case-insensitively.
    fn coupon_by_code(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<Option<Coupon>, RepositoryError>> + Send;

    /// Redemptions so far, overall and by `user_id`.
    fn coupon_usage(
        &self,
        coupon_id: CouponId,
        user_id: Option<UserId>,
    ) -> impl Future<Output = Result<UsageCounts, RepositoryError>> + Send;
}

/// Opens checkout transactions.
pub trait CheckoutStore: Send + Sync {
    type Tx: CheckoutTx;

    /// Begin a transaction. Dropping the returned handle without calling
    /// [`CheckoutTx::commit`] rolls everything back.
    fn begin(&self) -> impl Future<Output = Result<Self::Tx, RepositoryError>> + Send;
}

/// Writes that make up one order placement.
///
/// Reads through this handle take locks that are held until commit or
/// rollback, so two checkouts cannot both consume the last unit of stock, the
/// last coupon redemption, or the same order number.
pub trait CheckoutTx: Send {
    /// Fetch a product and lock its row.
    fn lock_product(
        &mut self,
        id: ProductId,
    ) -> impl Future<Output = Result<Option<Product>, RepositoryError>> + Send;

    /// Take `quantity` units from stock.
    ///
    /// Returns `RepositoryError::Conflict` if there is not enough stock.
    fn reserve_stock(
        &mut self,
        id: ProductId,
        quantity: Quantity,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Fetch a coupon by code and lock its row.
    fn lock_coupon(
        &mut self,
        code: &str,
    ) -> impl Future<Output = Result<Option<Coupon>, RepositoryError>> + Send;

    /// Redemptions so far, as seen inside this transaction.
    fn coupon_usage(
        &mut self,
        coupon_id: CouponId,
        user_id: Option<UserId>,
    ) -> impl Future<Output = Result<UsageCounts, RepositoryError>> + Send;

    /// Latest order number starting with `day_stem`, serializing concurrent
    /// callers for the same stem until this transaction ends.
    fn latest_order_number(
        &mut self,
        day_stem: &str,
    ) -> impl Future<Output = Result<Option<String>, RepositoryError>> + Send;

    /// Insert the order header.
    ///
    /// Returns `RepositoryError::Conflict` if the order number is taken.
    fn insert_order(
        &mut self,
        order: &NewOrder,
    ) -> impl Future<Output = Result<OrderId, RepositoryError>> + Send;

    fn insert_order_line(
        &mut self,
        order_id: OrderId,
        line: &NewOrderLine,
    ) -> impl Future<Output = Result<OrderLineId, RepositoryError>> + Send;

    fn insert_coupon_usage(
        &mut self,
        usage: &NewCouponUsage,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Make every write visible.
    fn commit(self) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

/// Order reads and admin mutations.
pub trait OrderStore: Send + Sync {
    fn order(&self, id: OrderId)
    -> impl Future<Output = Result<Option<Order>, RepositoryError>> + Send;

    fn order_by_number(
        &self,
        order_number: &str,
    ) -> impl Future<Output = Result<Option<Order>, RepositoryError>> + Send;

    fn list_orders(
        &self,
        filter: &OrderFilter,
    ) -> impl Future<Output = Result<Vec<OrderSummary>, RepositoryError>> + Send;

    /// Apply a fulfillment transition if the order is still in `change.from`.
    ///
    /// Entering `cancelled` returns the ordered quantities to stock. Returns
    /// `false` if the order was missing or had moved on.
    fn update_fulfillment(
        &self,
        id: OrderId,
        change: &FulfillmentChange,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;

    /// Apply a payment transition if the payment is still in `change.from`.
    fn update_payment(
        &self,
        id: OrderId,
        change: &PaymentChange,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;

    /// Delete an order (with its lines and coupon usage) if it is cancelled.
    ///
    /// Returns `false` if the order was missing or not cancelled.
    fn delete_cancelled_order(
        &self,
        id: OrderId,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;

    fn coupon_usages_for_order(
        &self,
        id: OrderId,
    ) -> impl Future<Output = Result<Vec<CouponUsage>, RepositoryError>> + Send;
}

/// Review persistence.
pub trait ReviewStore: Send + Sync {
    /// Insert a review.
    ///
    /// Returns `RepositoryError::Conflict` if the (product, order) pair
    /// already has one.
    fn insert_review(
        &self,
        review: &NewReview,
    ) -> impl Future<Output = Result<Review, RepositoryError>> + Send;

    fn review(
        &self,
        id: ReviewId,
    ) -> impl Future<Output = Result<Option<Review>, RepositoryError>> + Send;

    /// Set the moderation status. Returns the updated review, if it exists.
    fn set_review_status(
        &self,
        id: ReviewId,
        status: ReviewStatus,
        rejection_reason: Option<&str>,
    ) -> impl Future<Output = Result<Option<Review>, RepositoryError>> + Send;

    /// Count and mean of approved reviews.
    fn product_rating(
        &self,
        product_id: ProductId,
    ) -> impl Future<Output = Result<ProductRating, RepositoryError>> + Send;
}

/// Readiness probe.
pub trait HealthCheck: Send + Sync {
    /// Succeeds if the backing store can serve queries.
    fn ping(&self) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

impl HealthCheck for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Everything the HTTP layer needs from persistence.
pub trait Store:
    CatalogStore
    + CouponStore
    + CheckoutStore
    + OrderStore
    + ReviewStore
    + HealthCheck
    + Clone
    + 'static
{
}

impl<T> Store for T where
    T: CatalogStore
        + CouponStore
        + CheckoutStore
        + OrderStore
        + ReviewStore
        + HealthCheck
        + Clone
        + 'static
{
}
