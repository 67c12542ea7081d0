//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Session layer (tower-sessions with `PostgreSQL` store; holds the cart)
//! 5. Admin token check (`/admin` routes only)

pub mod auth;
pub mod request_id;
pub mod session;

pub use auth::{OptionalAuth, clear_current_customer, require_admin, set_current_customer};
pub use request_id::request_id_middleware;
pub use session::{create_session_layer, session_layer};
