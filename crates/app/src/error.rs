//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server-side errors to
//! Sentry before responding to the client. All route handlers return
//! `Result<T, AppError>`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::services::install::InstallError;
use crate::shopify::ShopifyError;
use crate::store::StoreError;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Tenant store operation failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Shopify API operation failed.
    #[error("Shopify error: {0}")]
    Shopify(#[from] ShopifyError),

    /// Install callback failed.
    #[error("Install error: {0}")]
    Install(#[from] InstallError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller could not prove which tenant it is, or the tenant is not installed.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    const fn is_server_side(&self) -> bool {
        matches!(
            self,
            Self::Store(_)
                | Self::Shopify(_)
                | Self::Internal(_)
                | Self::Install(InstallError::Exchange(_) | InstallError::Store(_))
        )
    }

    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Shopify(_) => StatusCode::BAD_GATEWAY,
            Self::Install(err) => match err {
                InstallError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_REQUEST,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Message safe to show the client.
    fn client_message(&self) -> String {
        match self {
            Self::Store(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Shopify(_) => "External service error".to_string(),
            Self::Install(err) => match err {
                InstallError::Denied => "Authorization denied".to_string(),
                InstallError::InvalidSignature(_) => "Invalid request signature".to_string(),
                InstallError::MissingParameter(_) | InstallError::InvalidShop(_) => {
                    "Missing required parameters".to_string()
                }
                InstallError::StateMismatch => "Invalid state parameter".to_string(),
                InstallError::Exchange(_) => "Failed to get access token".to_string(),
                InstallError::Store(_) => "Internal server error".to_string(),
            },
            Self::NotFound(msg) | Self::Unauthorized(msg) | Self::BadRequest(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_server_side() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        let body = Json(json!({ "detail": self.client_message() }));
        (self.status(), body).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Tag the current Sentry scope with the tenant being served.
pub fn set_sentry_tenant(tenant: &chat_launcher_core::TenantId) {
    sentry::configure_scope(|scope| {
        scope.set_tag("tenant", tenant.as_str());
    });
}
