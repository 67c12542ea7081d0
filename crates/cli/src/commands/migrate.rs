//! Database migration command.
//!
//! Applies `crates/storefront/migrations/` and creates the session table used
//! by tower-sessions. Migrations never run on server startup.

use tower_sessions_sqlx_store::PostgresStore;

use super::{CommandError, connect};

/// Run storefront migrations and the session store migration.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CommandError> {
    let store = connect().await?;

    tracing::info!("Running storefront migrations...");
    sqlx::migrate!("../storefront/migrations")
        .run(store.pool())
        .await?;

    tracing::info!("Creating session table...");
    PostgresStore::new(store.pool().clone()).migrate().await?;

    tracing::info!("Storefront migrations complete!");
    Ok(())
}
