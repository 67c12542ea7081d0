//! CLI command implementations.

pub mod coupon;
pub mod migrate;
pub mod seed;

use secrecy::SecretString;

use pasar_storefront::db::{self, PgStore};

/// Errors shared by the commands.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Repository error.
    #[error(transparent)]
    Repository(#[from] pasar_storefront::db::RepositoryError),

    /// Seed file could not be read.
    #[error("Failed to read {0}: {1}")]
    Io(String, std::io::Error),

    /// Seed file is not valid YAML for the expected shape.
    #[error("Invalid seed file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Bad command-line input.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Storefront database URL, with the generic `DATABASE_URL` as fallback.
fn database_url() -> Result<SecretString, CommandError> {
    dotenvy::dotenv().ok();

    std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingEnvVar("STOREFRONT_DATABASE_URL"))
}

/// Connect to the storefront database.
async fn connect() -> Result<PgStore, CommandError> {
    let url = database_url()?;
    tracing::info!("Connecting to storefront database...");
    let pool = db::create_pool(&url).await?;
    Ok(PgStore::new(pool))
}
