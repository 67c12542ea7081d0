//! Catalog reads and seeding.

use pasar_core::{CategoryId, Money, ProductId};

use super::{CatalogStore, PgStore, RepositoryError};
use crate::models::Product;

pub(crate) const PRODUCT_COLUMNS: &str =
    "id, category_id, name, sku, price, stock, image, is_active";

/// Product fields for seeding.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ProductInput {
    pub category_id: Option<CategoryId>,
    pub name: String,
    pub sku: String,
    pub price: Money,
    pub stock: i32,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

const fn default_active() -> bool {
    true
}

impl CatalogStore for PgStore {
    async fn product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        Ok(product)
    }

    async fn products(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let ids: Vec<i64> = ids.iter().map(ProductId::as_i64).collect();
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1) ORDER BY id"
        ))
        .bind(ids)
        .fetch_all(self.pool())
        .await?;

        Ok(products)
    }
}

impl PgStore {
    /// Find or insert a category by name, returning its ID.
    ///
    /// # Errors
    ///
    /// Returns error if the database upsert fails.
    pub async fn ensure_category(&self, name: &str) -> Result<CategoryId, RepositoryError> {
        let id: CategoryId = sqlx::query_scalar(
            r"
            INSERT INTO categories (name) VALUES ($1)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
            ",
        )
        .bind(name)
        .fetch_one(self.pool())
        .await?;

        Ok(id)
    }

    /// Insert a product, or update the one with the same SKU.
    ///
    /// # Errors
    ///
    /// Returns error if the database upsert fails.
    pub async fn upsert_product(&self, input: &ProductInput) -> Result<Product, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            r"
            INSERT INTO products (category_id, name, sku, price, stock, image, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (sku) DO UPDATE SET
                category_id = EXCLUDED.category_id,
                name = EXCLUDED.name,
                price = EXCLUDED.price,
                stock = EXCLUDED.stock,
                image = EXCLUDED.image,
                is_active = EXCLUDED.is_active,
                updated_at = NOW()
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(input.category_id)
        .bind(&input.name)
        .bind(&input.sku)
        .bind(input.price)
        .bind(input.stock)
        .bind(&input.image)
        .bind(input.is_active)
        .fetch_one(self.pool())
        .await?;

        Ok(product)
    }
}
