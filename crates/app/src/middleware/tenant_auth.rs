//! Session token extractors for the embedded admin API.
//!
//! The admin sends `Authorization: Bearer <session token>`; these extractors
//! turn that into the tenant the request acts for.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};

use chat_launcher_core::TenantId;

use crate::error::{AppError, set_sentry_tenant};
use crate::state::AppState;
use crate::verify::verify_session_token;

/// Message for every session rejection; callers never learn which check failed.
pub const INVALID_SESSION: &str = "Missing or invalid session token";

/// The bearer token from the `Authorization` header, if any.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn session_tenant(parts: &Parts, state: &AppState) -> Option<TenantId> {
    let token = bearer_token(&parts.headers)?;
    match verify_session_token(token, state.session_keys()) {
        Ok(tenant) => {
            set_sentry_tenant(&tenant);
            Some(tenant)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Session token rejected");
            None
        }
    }
}

/// Extractor that requires a valid session token.
///
/// Rejects with 401 when the header is missing or the token does not verify.
///
/// ```rust,ignore
/// async fn handler(SessionTenant(tenant): SessionTenant) -> String {
///     tenant.to_string()
/// }
/// ```
pub struct SessionTenant(pub TenantId);

impl FromRequestParts<AppState> for SessionTenant {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        session_tenant(parts, state)
            .map(Self)
            .ok_or_else(|| AppError::Unauthorized(INVALID_SESSION.to_string()))
    }
}

/// Extractor for routes with a fallback identity when the token is absent or
/// invalid. Never rejects.
pub struct OptionalSessionTenant(pub Option<TenantId>);

impl FromRequestParts<AppState> for OptionalSessionTenant {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(session_tenant(parts, state)))
    }
}
