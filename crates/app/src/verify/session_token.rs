//! Embedded-admin session tokens.
//!
//! The admin sends `Authorization: Bearer <jwt>`, an HS256 token signed with
//! the app secret whose `aud` is the app's client id and whose `dest` is the
//! shop URL (`https://mystore.myshopify.com`).

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use chat_launcher_core::TenantId;

use super::VerifyError;

/// Prefix of development tokens: `dev-token-<shop>`.
pub const DEV_TOKEN_PREFIX: &str = "dev-token-";

/// Placeholder tokens some admin builds send when no session exists.
const PLACEHOLDER_TOKENS: &[&str] = &["dev-token", "fallback-token"];

/// Everything needed to verify a session token.
///
/// Implements `Debug` manually to redact the secret.
#[derive(Clone)]
pub struct SessionTokenKeys {
    /// Expected `aud`.
    pub client_id: String,
    /// HS256 key.
    pub client_secret: SecretString,
    /// Accept unsigned `dev-token-<shop>` tokens.
    pub allow_dev_tokens: bool,
}

impl std::fmt::Debug for SessionTokenKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTokenKeys")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("allow_dev_tokens", &self.allow_dev_tokens)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct DestinationClaims {
    dest: Option<String>,
    iss: Option<String>,
}

/// Verify a session token and return the shop it was issued for.
///
/// The shop comes from `dest` (falling back to `iss`) with the scheme and any
/// path removed. The token must carry a valid HS256 signature under the
/// client secret, be unexpired, and have `aud` equal to the client id.
///
/// # Errors
///
/// Returns a `VerifyError` describing the first failed check.
pub fn verify_session_token(token: &str, keys: &SessionTokenKeys) -> Result<TenantId, VerifyError> {
    if PLACEHOLDER_TOKENS.contains(&token) {
        return Err(VerifyError::DevTokenRejected);
    }

    if let Some(shop) = token.strip_prefix(DEV_TOKEN_PREFIX) {
        if !keys.allow_dev_tokens {
            return Err(VerifyError::DevTokenRejected);
        }
        return Ok(TenantId::parse(shop)?);
    }

    let secret = keys.client_secret.expose_secret();
    if secret.is_empty() {
        return Err(VerifyError::MissingSecret);
    }

    // Read the destination first so a malformed claim set is reported as such
    // rather than as a signature failure.
    let mut peek = Validation::new(Algorithm::HS256);
    peek.insecure_disable_signature_validation();
    peek.validate_exp = false;
    peek.validate_aud = false;
    peek.required_spec_claims.clear();

    let unverified = decode::<DestinationClaims>(token, &DecodingKey::from_secret(&[]), &peek)
        .map_err(map_jwt_error)?;
    let tenant = tenant_from_claims(&unverified.claims)?;

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[keys.client_id.as_str()]);
    validation.set_required_spec_claims(&["exp", "aud"]);

    decode::<DestinationClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(map_jwt_error)?;

    Ok(tenant)
}

fn tenant_from_claims(claims: &DestinationClaims) -> Result<TenantId, VerifyError> {
    let url = claims
        .dest
        .as_deref()
        .filter(|dest| !dest.is_empty())
        .or_else(|| claims.iss.as_deref().filter(|iss| !iss.is_empty()))
        .ok_or(VerifyError::MissingDestination)?;

    let host = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    let host = host.split('/').next().unwrap_or_default();

    if host.is_empty() {
        return Err(VerifyError::MissingDestination);
    }

    Ok(TenantId::parse(host)?)
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> VerifyError {
    match err.kind() {
        ErrorKind::ExpiredSignature => VerifyError::Expired,
        ErrorKind::InvalidSignature => VerifyError::BadSignature,
        ErrorKind::InvalidAudience => VerifyError::AudienceMismatch,
        ErrorKind::MissingRequiredClaim(claim) if claim == "aud" => VerifyError::AudienceMismatch,
        _ => VerifyError::MalformedToken(err.to_string()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::json;

    use super::*;

    const CLIENT_ID: &str = "client-123";
    const SECRET: &str = "s3cr3t-for-tests";

    fn keys(allow_dev_tokens: bool) -> SessionTokenKeys {
        SessionTokenKeys {
            client_id: CLIENT_ID.to_string(),
            client_secret: SecretString::from(SECRET),
            allow_dev_tokens,
        }
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    fn mint(claims: &serde_json::Value, secret: &str) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("encodable claims")
    }

    fn standard_claims(dest: &str) -> serde_json::Value {
        json!({
            "iss": format!("{dest}/admin"),
            "dest": dest,
            "aud": CLIENT_ID,
            "sub": "42",
            "exp": now() + 60,
            "nbf": now() - 5,
            "iat": now() - 5,
        })
    }

    #[test]
    fn test_dest_with_path_yields_host() {
        let token = mint(
            &json!({ "dest": "https://shop-a.example/admin", "aud": CLIENT_ID, "exp": now() + 60 }),
            SECRET,
        );

        let tenant = verify_session_token(&token, &keys(false)).unwrap();
        assert_eq!(tenant.as_str(), "shop-a.example");
    }

    #[test]
    fn test_standard_token() {
        let token = mint(&standard_claims("https://mystore.myshopify.com"), SECRET);
        let tenant = verify_session_token(&token, &keys(false)).unwrap();
        assert_eq!(tenant.as_str(), "mystore.myshopify.com");
    }

    #[test]
    fn test_falls_back_to_iss() {
        let token = mint(
            &json!({ "iss": "https://t1/admin", "aud": CLIENT_ID, "exp": now() + 60 }),
            SECRET,
        );
        assert_eq!(
            verify_session_token(&token, &keys(false)).unwrap().as_str(),
            "t1"
        );
    }

    #[test]
    fn test_empty_dest_falls_back_to_iss() {
        let token = mint(
            &json!({
                "dest": "",
                "iss": "https://shop-a.example/admin",
                "aud": CLIENT_ID,
                "exp": now() + 60,
            }),
            SECRET,
        );
        assert_eq!(
            verify_session_token(&token, &keys(false)).unwrap().as_str(),
            "shop-a.example"
        );
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = mint(&standard_claims("https://t1"), "some-other-secret");
        assert_eq!(
            verify_session_token(&token, &keys(false)),
            Err(VerifyError::BadSignature)
        );
    }

    #[test]
    fn test_expired_rejected() {
        let mut claims = standard_claims("https://t1");
        claims["exp"] = json!(now() - 3600);
        let token = mint(&claims, SECRET);

        assert_eq!(
            verify_session_token(&token, &keys(false)),
            Err(VerifyError::Expired)
        );
    }

    #[test]
    fn test_wrong_audience_rejected() {
        let mut claims = standard_claims("https://t1");
        claims["aud"] = json!("someone-else");
        let token = mint(&claims, SECRET);

        assert_eq!(
            verify_session_token(&token, &keys(false)),
            Err(VerifyError::AudienceMismatch)
        );
    }

    #[test]
    fn test_missing_destination_rejected() {
        let token = mint(&json!({ "aud": CLIENT_ID, "exp": now() + 60 }), SECRET);
        assert_eq!(
            verify_session_token(&token, &keys(false)),
            Err(VerifyError::MissingDestination)
        );
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(
            verify_session_token("not.a.jwt", &keys(false)),
            Err(VerifyError::MalformedToken(_))
        ));
        assert!(matches!(
            verify_session_token("", &keys(false)),
            Err(VerifyError::MalformedToken(_))
        ));
    }

    #[test]
    fn test_dev_tokens() {
        assert_eq!(
            verify_session_token("dev-token-t1", &keys(false)),
            Err(VerifyError::DevTokenRejected)
        );
        assert_eq!(
            verify_session_token("dev-token-t1", &keys(true))
                .unwrap()
                .as_str(),
            "t1"
        );
        assert!(verify_session_token("dev-token-bad/shop", &keys(true)).is_err());
    }

    #[test]
    fn test_placeholder_tokens_always_rejected() {
        for token in ["dev-token", "fallback-token"] {
            assert_eq!(
                verify_session_token(token, &keys(true)),
                Err(VerifyError::DevTokenRejected)
            );
        }
    }

    #[test]
    fn test_empty_secret_fails_closed() {
        let token = mint(&standard_claims("https://t1"), "");
        let keys = SessionTokenKeys {
            client_id: CLIENT_ID.to_string(),
            client_secret: SecretString::from(""),
            allow_dev_tokens: false,
        };
        assert_eq!(
            verify_session_token(&token, &keys),
            Err(VerifyError::MissingSecret)
        );
    }
}
