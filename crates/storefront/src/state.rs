//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::{ShopConfig, StorefrontConfig};
use crate::db::PgStore;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. Generic over the store so the router can run
/// against `MemoryStore` in tests.
pub struct AppState<S = PgStore> {
    inner: Arc<AppStateInner<S>>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct AppStateInner<S> {
    config: StorefrontConfig,
    store: S,
}

impl<S> AppState<S> {
    /// Create a new application state.
    #[must_use]
    pub fn new(config: StorefrontConfig, store: S) -> Self {
        Self {
            inner: Arc::new(AppStateInner { config, store }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Shop pricing and numbering rules.
    #[must_use]
    pub fn shop(&self) -> &ShopConfig {
        &self.inner.config.shop
    }

    /// Get a reference to the store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.inner.store
    }
}
