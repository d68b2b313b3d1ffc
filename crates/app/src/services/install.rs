//! Install callback handling.

use secrecy::SecretString;
use thiserror::Error;

use chat_launcher_core::{TenantId, TenantIdError};

use crate::shopify::{ShopifyClient, ShopifyError};
use crate::store::{StoreError, TenantStore};
use crate::verify::{VerifyError, verify_request_signature};

/// Reasons an install callback is refused.
#[derive(Debug, Error)]
pub enum InstallError {
    /// The merchant declined the install (`error` parameter present).
    #[error("authorization denied by merchant")]
    Denied,

    /// The callback query string is not signed by Shopify.
    #[error("invalid callback signature: {0}")]
    InvalidSignature(#[source] VerifyError),

    #[error("missing parameter: {0}")]
    MissingParameter(&'static str),

    #[error("invalid shop: {0}")]
    InvalidShop(#[from] TenantIdError),

    /// `state` does not echo the shop the install was started for.
    #[error("state does not match shop")]
    StateMismatch,

    /// The code could not be exchanged; nothing was persisted.
    #[error("token exchange failed: {0}")]
    Exchange(#[source] ShopifyError),

    /// The token was obtained but could not be saved.
    #[error("failed to save installation: {0}")]
    Store(#[source] StoreError),
}

fn param<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

/// Complete an install from the OAuth callback query.
///
/// The code is exchanged exactly once; if the exchange fails nothing is
/// written and the merchant has to start over.
///
/// # Errors
///
/// Returns an `InstallError` for a denied install, a bad signature, missing
/// parameters, a state mismatch, a failed exchange, or a failed save.
#[tracing::instrument(skip_all)]
pub async fn complete_install(
    store: &dyn TenantStore,
    client: &ShopifyClient,
    secret: &SecretString,
    params: &[(String, String)],
) -> Result<TenantId, InstallError> {
    if param(params, "error").is_some() {
        return Err(InstallError::Denied);
    }

    let tenant =
        verify_request_signature(params, secret).map_err(InstallError::InvalidSignature)?;

    let code = param(params, "code")
        .filter(|code| !code.is_empty())
        .ok_or(InstallError::MissingParameter("code"))?;

    if let Some(state) = param(params, "state")
        && state != tenant.as_str()
    {
        return Err(InstallError::StateMismatch);
    }

    let access_token = client
        .exchange_code(&tenant, code)
        .await
        .map_err(InstallError::Exchange)?;

    store
        .save_installation(&tenant, &access_token)
        .await
        .map_err(InstallError::Store)?;

    tracing::info!(tenant = %tenant, "App installed");
    Ok(tenant)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::time::Duration;

    use hmac::{Hmac, Mac};
    use secrecy::ExposeSecret;
    use sha2::Sha256;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::ShopifyAppConfig;
    use crate::store::{FileTenantStore, InstalledAtPolicy};
    use crate::verify::canonical_message;

    const SECRET: &str = "hush";

    fn signed(items: &[(&str, &str)]) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = items
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).expect("any key length");
        mac.update(canonical_message(&params).as_bytes());
        params.push(("hmac".to_string(), hex::encode(mac.finalize().into_bytes())));
        params
    }

    async fn fixture(server: &MockServer) -> (tempfile::TempDir, FileTenantStore, ShopifyClient) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTenantStore::open(dir.path().join("app_data.json"), InstalledAtPolicy::Refresh)
            .await
            .unwrap();
        let client = ShopifyClient::new(&ShopifyAppConfig {
            api_key: "client-123".to_string(),
            api_secret: SecretString::from(SECRET),
            api_version: "2023-10".to_string(),
            scopes: String::new(),
            http_timeout: Duration::from_secs(2),
            api_base_url: Some(server.uri()),
            app_handle: None,
        })
        .unwrap();
        (dir, store, client)
    }

    async fn mount_exchange(server: &MockServer, status: u16, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/admin/oauth/access_token"))
            .respond_with(
                ResponseTemplate::new(status)
                    .set_body_json(serde_json::json!({ "access_token": "tok1", "scope": "" })),
            )
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_success_persists_installation() {
        let server = MockServer::start().await;
        mount_exchange(&server, 200, 1).await;
        let (_dir, store, client) = fixture(&server).await;

        let params = signed(&[("code", "abc"), ("shop", "t1"), ("state", "t1"), ("timestamp", "1")]);
        let tenant = complete_install(&store, &client, &SecretString::from(SECRET), &params)
            .await
            .unwrap();

        assert_eq!(tenant.as_str(), "t1");
        let installation = store.get_installation(&tenant).await.unwrap().unwrap();
        assert_eq!(installation.access_token.expose_secret(), "tok1");
    }

    #[tokio::test]
    async fn test_exchange_failure_persists_nothing() {
        let server = MockServer::start().await;
        mount_exchange(&server, 400, 1).await;
        let (_dir, store, client) = fixture(&server).await;

        let params = signed(&[("code", "used"), ("shop", "t1")]);
        let result = complete_install(&store, &client, &SecretString::from(SECRET), &params).await;

        assert!(matches!(result, Err(InstallError::Exchange(_))));
        assert!(store.list_installations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_denied_makes_no_calls() {
        let server = MockServer::start().await;
        mount_exchange(&server, 200, 0).await;
        let (_dir, store, client) = fixture(&server).await;

        let params = signed(&[("error", "access_denied"), ("shop", "t1")]);
        let result = complete_install(&store, &client, &SecretString::from(SECRET), &params).await;

        assert!(matches!(result, Err(InstallError::Denied)));
    }

    #[tokio::test]
    async fn test_bad_signature_makes_no_calls() {
        let server = MockServer::start().await;
        mount_exchange(&server, 200, 0).await;
        let (_dir, store, client) = fixture(&server).await;

        let mut params = signed(&[("code", "abc"), ("shop", "t1")]);
        params[1].1 = "t2".to_string();
        let result = complete_install(&store, &client, &SecretString::from(SECRET), &params).await;

        assert!(matches!(result, Err(InstallError::InvalidSignature(_))));
        assert!(store.list_installations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_code_and_state_mismatch() {
        let server = MockServer::start().await;
        mount_exchange(&server, 200, 0).await;
        let (_dir, store, client) = fixture(&server).await;
        let secret = SecretString::from(SECRET);

        let params = signed(&[("shop", "t1")]);
        assert!(matches!(
            complete_install(&store, &client, &secret, &params).await,
            Err(InstallError::MissingParameter("code"))
        ));

        let params = signed(&[("code", "abc"), ("shop", "t1"), ("state", "t2")]);
        assert!(matches!(
            complete_install(&store, &client, &secret, &params).await,
            Err(InstallError::StateMismatch)
        ));
    }
}
