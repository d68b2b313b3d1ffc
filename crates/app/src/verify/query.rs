//! Signed query strings.
//!
//! The platform signs redirect query strings: every parameter except `hmac`
//! and `signature`, sorted by key, joined as `k=v` with `&`, HMAC-SHA256 with
//! the app secret, lowercase hex.

use std::collections::BTreeSet;

use hmac::Mac;
use secrecy::SecretString;

use chat_launcher_core::TenantId;

use super::{VerifyError, keyed_mac};

/// Length of a hex-encoded SHA-256 MAC.
const HEX_MAC_LEN: usize = 64;

/// Build the string the platform signs.
#[must_use]
pub fn canonical_message(params: &[(String, String)]) -> String {
    let mut pairs: Vec<(&str, &str)> = params
        .iter()
        .filter(|(key, _)| key != "hmac" && key != "signature")
        .map(|(key, value)| (key.as_str(), value.as_str()))
        .collect();

    pairs.sort_unstable();

    pairs
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Verify a signed query string and return the shop it names.
///
/// `params` are the decoded query pairs in request order.
///
/// # Errors
///
/// - `MissingSecret` if `secret` is empty
/// - `DuplicateParameter` if any key repeats
/// - `MissingParameter` if `hmac` or `shop` is absent
/// - `MalformedSignature` if `hmac` is not 64 lowercase hex digits
/// - `BadSignature` if the MAC does not match
/// - `InvalidTenant` if `shop` is not a valid tenant id
pub fn verify_request_signature(
    params: &[(String, String)],
    secret: &SecretString,
) -> Result<TenantId, VerifyError> {
    let mut mac = keyed_mac(secret)?;

    let mut seen = BTreeSet::new();
    for (key, _) in params {
        if !seen.insert(key.as_str()) {
            return Err(VerifyError::DuplicateParameter(key.clone()));
        }
    }

    let supplied = find(params, "hmac").ok_or(VerifyError::MissingParameter("hmac"))?;
    let shop = find(params, "shop").ok_or(VerifyError::MissingParameter("shop"))?;

    let supplied = decode_hex_mac(supplied)?;

    mac.update(canonical_message(params).as_bytes());
    mac.verify_slice(&supplied)
        .map_err(|_| VerifyError::BadSignature)?;

    Ok(TenantId::parse(shop)?)
}

fn find<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

/// Only the canonical lowercase form is accepted, so a case change is a
/// mismatch like any other edit.
fn decode_hex_mac(supplied: &str) -> Result<Vec<u8>, VerifyError> {
    let canonical = supplied.len() == HEX_MAC_LEN
        && supplied
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));

    if !canonical {
        return Err(VerifyError::MalformedSignature);
    }

    hex::decode(supplied).map_err(|_| VerifyError::MalformedSignature)
}
