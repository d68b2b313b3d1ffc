//! Signed webhook bodies.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::Mac;
use secrecy::SecretString;

use super::{VerifyError, keyed_mac};

/// Header carrying base64(HMAC-SHA256(raw body)).
pub const WEBHOOK_HMAC_HEADER: &str = "x-shopify-hmac-sha256";

/// Verify a webhook against the exact bytes received.
///
/// `body` must be the raw request body; re-serialising parsed JSON changes
/// the bytes and the check fails.
///
/// # Errors
///
/// - `MissingSecret` if `secret` is empty
/// - `MalformedSignature` if `header` is not valid base64
/// - `BadSignature` if the MAC does not match
pub fn verify_webhook_signature(
    body: &[u8],
    header: &str,
    secret: &SecretString,
) -> Result<(), VerifyError> {
    let mut mac = keyed_mac(secret)?;
    let supplied = BASE64
        .decode(header)
        .map_err(|_| VerifyError::MalformedSignature)?;

    mac.update(body);
    mac.verify_slice(&supplied)
        .map_err(|_| VerifyError::BadSignature)
}
