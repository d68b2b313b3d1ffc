//! Tenant identity verification.
//!
//! Three ways a request can prove which shop it speaks for:
//!
//! - [`verify_request_signature`] - signed query string (install callback,
//!   admin links)
//! - [`verify_webhook_signature`] - signed raw webhook body
//! - [`verify_session_token`] - HS256 session token from the embedded admin
//!
//! All three are pure functions of their inputs and the shared secret. An
//! empty secret always fails closed. Callers log the [`VerifyError`] at debug
//! level and answer with a uniform 401; clients never learn which check
//! failed.

pub mod query;
pub mod session_token;
pub mod webhook;

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;

use chat_launcher_core::TenantIdError;

pub use query::{canonical_message, verify_request_signature};
pub use session_token::{DEV_TOKEN_PREFIX, SessionTokenKeys, verify_session_token};
pub use webhook::{WEBHOOK_HMAC_HEADER, verify_webhook_signature};

type HmacSha256 = Hmac<Sha256>;

/// Reasons a signature or token was rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerifyError {
    /// The shared secret is empty.
    #[error("shared secret is not configured")]
    MissingSecret,

    /// A required parameter is absent.
    #[error("missing parameter: {0}")]
    MissingParameter(&'static str),

    /// A parameter appears more than once.
    #[error("duplicate parameter: {0}")]
    DuplicateParameter(String),

    /// The supplied signature is not in the expected encoding.
    #[error("malformed signature")]
    MalformedSignature,

    /// The signature does not match.
    #[error("signature mismatch")]
    BadSignature,

    /// The shop value is not a valid tenant id.
    #[error("invalid shop: {0}")]
    InvalidTenant(#[from] TenantIdError),

    /// The session token could not be decoded.
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// The session token has expired.
    #[error("token expired")]
    Expired,

    /// The session token was issued for a different app.
    #[error("token audience mismatch")]
    AudienceMismatch,

    /// The session token names no shop.
    #[error("token has no destination")]
    MissingDestination,

    /// A development token was presented but they are not accepted.
    #[error("development token rejected")]
    DevTokenRejected,
}

/// HMAC-SHA256 keyed with `secret`, refusing an empty key.
fn keyed_mac(secret: &SecretString) -> Result<HmacSha256, VerifyError> {
    let key = secret.expose_secret();
    if key.is_empty() {
        return Err(VerifyError::MissingSecret);
    }
    HmacSha256::new_from_slice(key.as_bytes()).map_err(|_| VerifyError::MissingSecret)
}
