//! Seed the catalog and coupons from a YAML file.
//!
//! Categories are matched by name, products by SKU, so seeding twice updates
//! rather than duplicates. Coupons whose code already exists are skipped.
//!
//! ```yaml
//! products:
//!   - name: Batik Tulis Parang
//!     sku: BTK-PRG-01
//!     category: Batik
//!     price: "150000"
//!     stock: 12
//! coupons:
//!   - code: HEMAT10
//!     discount: { kind: percentage, rate: "10", max_discount: "25000" }
//!     valid_from: 2026-01-01T00:00:00Z
//!     valid_until: 2026-12-31T23:59:59Z
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use pasar_core::Money;
use pasar_storefront::db::RepositoryError;
use pasar_storefront::db::catalog::ProductInput;
use pasar_storefront::db::coupons::CouponInput;

use super::{CommandError, connect};

#[derive(Debug, Deserialize)]
struct SeedFile {
    #[serde(default)]
    products: Vec<SeedProduct>,
    #[serde(default)]
    coupons: Vec<CouponInput>,
}

#[derive(Debug, Deserialize)]
struct SeedProduct {
    name: String,
    sku: String,
    /// Category name; created on first use.
    #[serde(default)]
    category: Option<String>,
    price: Money,
    stock: i32,
    #[serde(default)]
    image: Option<String>,
    #[serde(default = "default_active")]
    is_active: bool,
}

const fn default_active() -> bool {
    true
}

/// Counts reported after seeding.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub categories: usize,
    pub products: usize,
    pub coupons_created: usize,
    pub coupons_skipped: usize,
}

fn parse(content: &str) -> Result<SeedFile, CommandError> {
    let file: SeedFile = serde_yaml::from_str(content)?;
    if let Some(product) = file.products.iter().find(|p| p.stock < 0) {
        return Err(CommandError::InvalidArgument(format!(
            "product {} has negative stock",
            product.sku
        )));
    }
    Ok(file)
}

/// Seed from `file_path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or a database write
/// fails.
pub async fn run(file_path: &Path) -> Result<SeedSummary, CommandError> {
    info!(path = %file_path.display(), "Loading seed file");
    let content = tokio::fs::read_to_string(file_path)
        .await
        .map_err(|e| CommandError::Io(file_path.display().to_string(), e))?;
    // Validate before connecting
    let file = parse(&content)?;

    let store = connect().await?;
    let mut summary = SeedSummary::default();

    let mut categories = HashMap::new();
    for product in &file.products {
        let category_id = match &product.category {
            Some(name) => {
                if !categories.contains_key(name) {
                    let id = store.ensure_category(name).await?;
                    categories.insert(name.clone(), id);
                }
                categories.get(name).copied()
            }
            None => None,
        };

        store
            .upsert_product(&ProductInput {
                category_id,
                name: product.name.clone(),
                sku: product.sku.clone(),
                price: product.price,
                stock: product.stock,
                image: product.image.clone(),
                is_active: product.is_active,
            })
            .await?;
        summary.products += 1;
    }
    summary.categories = categories.len();

    for coupon in &file.coupons {
        match store.create_coupon(coupon).await {
            Ok(created) => {
                info!(code = %created.code, "Coupon created");
                summary.coupons_created += 1;
            }
            Err(RepositoryError::Conflict(_)) => {
                warn!(code = %coupon.code, "Coupon already exists, skipped");
                summary.coupons_skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!(
        categories = summary.categories,
        products = summary.products,
        coupons_created = summary.coupons_created,
        coupons_skipped = summary.coupons_skipped,
        "Seeding complete!"
    );
    Ok(summary)
}
