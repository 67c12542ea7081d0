//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::models::CurrentCustomer;
use crate::services::ServiceError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// A service rejected the request or failed.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Reading or writing the session failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        Self::Service(ServiceError::Persistence(err))
    }
}

impl AppError {
    const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Service(ServiceError::Persistence(_)) | Self::Session(_)
        )
    }

    const fn status(&self) -> StatusCode {
        match self {
            Self::Service(err) => match err {
                ServiceError::Validation(_) | ServiceError::CouponInvalid(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
                ServiceError::EmptyCart => StatusCode::BAD_REQUEST,
                ServiceError::Conflict(_) => StatusCode::CONFLICT,
                ServiceError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        let message = if self.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (self.status(), message).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Attach the logged-in customer to Sentry events from this request.
pub fn set_sentry_user(customer: &CurrentCustomer) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(customer.id.to_string()),
            email: Some(customer.email.as_str().to_string()),
            ..Default::default()
        }));
    });
}

/// Record a checkout or order-status step.
///
/// Breadcrumbs show up on any error Sentry captures later in the request.
pub fn add_breadcrumb(category: &str, message: &str, data: &[(&str, String)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };
    for (key, value) in data {
        breadcrumb
            .data
            .insert((*key).to_string(), serde_json::Value::String(value.clone()));
    }
    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use pasar_core::{CouponRejection, Email, UserId};

    use super::*;

    fn get_status(err: impl Into<AppError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("order ORD-20261016-0001".to_string());
        assert_eq!(err.to_string(), "Not found: order ORD-20261016-0001");

        let err = AppError::from(ServiceError::EmptyCart);
        assert_eq!(err.to_string(), "cart is empty");
    }

    #[test]
    fn test_service_error_status_codes() {
        assert_eq!(
            get_status(ServiceError::Validation("city is required".to_string())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(ServiceError::CouponInvalid(CouponRejection::Expired)),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(ServiceError::NotFound("coupon NOPE".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(get_status(ServiceError::EmptyCart), StatusCode::BAD_REQUEST);
        assert_eq!(
            get_status(ServiceError::Conflict("insufficient stock".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(RepositoryError::DataCorruption("bad row".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_server_error_event_carries_customer_and_breadcrumbs() {
        let customer = CurrentCustomer {
            id: UserId::new(42),
            name: "Sari".to_string(),
            email: Email::parse("sari@example.com").unwrap(),
        };

        let events = sentry::test::with_captured_events(|| {
            set_sentry_user(&customer);
            add_breadcrumb("checkout", "placing order", &[("items", "2".to_string())]);
            let _ = AppError::from(RepositoryError::DataCorruption("bad row".to_string()))
                .into_response();
            let _ = AppError::NotFound("order".to_string()).into_response();
        });

        assert_eq!(events.len(), 1);
        let event = &events[0];
        let user = event.user.as_ref().unwrap();
        assert_eq!(user.id.as_deref(), Some("42"));
        assert_eq!(user.email.as_deref(), Some("sari@example.com"));
        let crumb = &event.breadcrumbs.values[0];
        assert_eq!(crumb.category.as_deref(), Some("checkout"));
        assert_eq!(crumb.data["items"], "2");
    }

    #[tokio::test]
    async fn test_server_errors_hide_details() {
        let response =
            AppError::from(RepositoryError::DataCorruption("order 12 has no customer".to_string()))
                .into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap_or_default();
        assert_eq!(body.as_ref(), b"Internal server error");
    }
}
