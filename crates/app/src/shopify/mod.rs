//! Shopify OAuth and REST client.
//!
//! # Security
//!
//! The offline access token for each shop is high privilege. It only leaves
//! the process as the `X-Shopify-Access-Token` header on calls to that shop,
//! and is kept in `SecretString` everywhere in memory.
//!
//! # Example
//!
//! ```rust,ignore
//! use chat_launcher_app::shopify::ShopifyClient;
//!
//! let client = ShopifyClient::new(&config.shopify)?;
//!
//! // One-time code exchange during install
//! let token = client.exchange_code(&tenant, &code).await?;
//!
//! // Script tags on the storefront
//! let tags = client.list_script_tags(&tenant, &token).await?;
//! ```

pub mod types;

use std::sync::Arc;

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::instrument;

use chat_launcher_core::TenantId;

use crate::config::ShopifyAppConfig;
use types::{
    AccessTokenRequest, AccessTokenResponse, CreateScriptTagRequest, CreateScriptTagResponse,
    NewScriptTag, ScriptTagList,
};

pub use types::ScriptTag;

/// Header carrying the shop's access token on REST calls.
const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

/// Errors that can occur when talking to Shopify.
#[derive(Debug, Error)]
pub enum ShopifyError {
    /// HTTP request failed (transport, timeout, or body decoding).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The code-for-token exchange was refused or returned no token.
    #[error("OAuth error: {0}")]
    OAuth(String),

    /// The shop rejected the access token.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Any other non-success status.
    #[error("API error: {status} from {endpoint}")]
    Api {
        status: StatusCode,
        endpoint: &'static str,
    },
}

/// Client for the per-shop OAuth and REST endpoints.
///
/// Cheap to clone; the underlying `reqwest::Client` carries the configured
/// timeout.
#[derive(Clone)]
pub struct ShopifyClient {
    inner: Arc<ShopifyClientInner>,
}

struct ShopifyClientInner {
    client: reqwest::Client,
    client_id: String,
    client_secret: SecretString,
    api_version: String,
    base_url: Option<String>,
}

impl std::fmt::Debug for ShopifyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifyClient")
            .field("client_id", &self.inner.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("api_version", &self.inner.api_version)
            .field("base_url", &self.inner.base_url)
            .finish_non_exhaustive()
    }
}

impl ShopifyClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::Http` if the HTTP client cannot be built.
    pub fn new(config: &ShopifyAppConfig) -> Result<Self, ShopifyError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(ShopifyClientInner {
                client,
                client_id: config.api_key.clone(),
                client_secret: config.api_secret.clone(),
                api_version: config.api_version.clone(),
                base_url: config
                    .api_base_url
                    .as_ref()
                    .map(|url| url.trim_end_matches('/').to_string()),
            }),
        })
    }

    /// Base URL for calls to `tenant`: `https://{shop}` unless overridden.
    fn shop_url(&self, tenant: &TenantId) -> String {
        self.inner
            .base_url
            .clone()
            .unwrap_or_else(|| format!("https://{tenant}"))
    }

    fn script_tags_url(&self, tenant: &TenantId) -> String {
        format!(
            "{}/admin/api/{}/script_tags.json",
            self.shop_url(tenant),
            self.inner.api_version
        )
    }

    // =========================================================================
    // OAuth Flow
    // =========================================================================

    /// Generate the OAuth authorization URL for `tenant`.
    #[must_use]
    pub fn authorization_url(
        &self,
        tenant: &TenantId,
        scopes: &str,
        redirect_uri: &str,
        state: &str,
    ) -> String {
        format!(
            "{}/admin/oauth/authorize?client_id={}&scope={}&redirect_uri={}&state={}",
            self.shop_url(tenant),
            urlencoding::encode(&self.inner.client_id),
            urlencoding::encode(scopes),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(state)
        )
    }

    /// Exchange an authorization code for an offline access token.
    ///
    /// Codes are single-use, so this is never retried.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::OAuth` if the shop refuses the code or the
    /// response carries no token, and `ShopifyError::Http` on transport
    /// failure or timeout.
    #[instrument(skip(self, code), fields(tenant = %tenant))]
    pub async fn exchange_code(
        &self,
        tenant: &TenantId,
        code: &str,
    ) -> Result<SecretString, ShopifyError> {
        let url = format!("{}/admin/oauth/access_token", self.shop_url(tenant));

        let request = AccessTokenRequest {
            client_id: &self.inner.client_id,
            client_secret: self.inner.client_secret.expose_secret(),
            code,
        };

        let response = self.inner.client.post(&url).json(&request).send().await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %text, "Token exchange refused");
            return Err(ShopifyError::OAuth(format!(
                "token exchange failed with status {status}"
            )));
        }

        let body: AccessTokenResponse = response.json().await?;
        let token = body
            .access_token
            .filter(|token| !token.expose_secret().is_empty())
            .ok_or_else(|| ShopifyError::OAuth("response contained no access token".to_string()))?;

        tracing::info!(scope = ?body.scope, "Access token obtained");
        Ok(token)
    }

    // =========================================================================
    // Script Tags
    // =========================================================================

    /// List the script tags registered on `tenant`'s storefront.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::Unauthorized` on 401/403, `ShopifyError::Api`
    /// for other non-success statuses, and `ShopifyError::Http` on transport
    /// failure or timeout.
    #[instrument(skip(self, access_token), fields(tenant = %tenant))]
    pub async fn list_script_tags(
        &self,
        tenant: &TenantId,
        access_token: &SecretString,
    ) -> Result<Vec<ScriptTag>, ShopifyError> {
        let response = self
            .inner
            .client
            .get(self.script_tags_url(tenant))
            .header(ACCESS_TOKEN_HEADER, access_token.expose_secret())
            .send()
            .await?;

        let response = check_status(response, "script_tags.list").await?;
        let list: ScriptTagList = response.json().await?;
        Ok(list.script_tags)
    }

    /// Register a script tag loading `src` on every storefront page.
    ///
    /// # Errors
    ///
    /// Same as [`Self::list_script_tags`].
    #[instrument(skip(self, access_token), fields(tenant = %tenant))]
    pub async fn create_script_tag(
        &self,
        tenant: &TenantId,
        access_token: &SecretString,
        src: &str,
    ) -> Result<ScriptTag, ShopifyError> {
        let request = CreateScriptTagRequest {
            script_tag: NewScriptTag {
                event: "onload",
                src,
            },
        };

        let response = self
            .inner
            .client
            .post(self.script_tags_url(tenant))
            .header(ACCESS_TOKEN_HEADER, access_token.expose_secret())
            .json(&request)
            .send()
            .await?;

        let response = check_status(response, "script_tags.create").await?;
        let created: CreateScriptTagResponse = response.json().await?;
        Ok(created.script_tag)
    }
}

async fn check_status(
    response: reqwest::Response,
    endpoint: &'static str,
) -> Result<reqwest::Response, ShopifyError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    tracing::warn!(%status, endpoint, body = %text, "Shopify request failed");

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ShopifyError::Unauthorized(format!("{endpoint} returned {status}")));
    }

    Err(ShopifyError::Api { status, endpoint })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::time::Duration;

    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn config(base_url: Option<String>) -> ShopifyAppConfig {
        ShopifyAppConfig {
            api_key: "client-123".to_string(),
            api_secret: SecretString::from("hush"),
            api_version: "2023-10".to_string(),
            scopes: "read_script_tags,write_script_tags".to_string(),
            http_timeout: Duration::from_secs(2),
            api_base_url: base_url,
            app_handle: None,
        }
    }

    fn tenant() -> TenantId {
        TenantId::parse("t1.example").unwrap()
    }

    #[test]
    fn test_authorization_url() {
        let client = ShopifyClient::new(&config(None)).unwrap();
        let url = client.authorization_url(
            &tenant(),
            "read_themes,write_themes",
            "https://app.example/auth/callback",
            "t1.example",
        );

        assert_eq!(
            url,
            "https://t1.example/admin/oauth/authorize?client_id=client-123\
             &scope=read_themes%2Cwrite_themes\
             &redirect_uri=https%3A%2F%2Fapp.example%2Fauth%2Fcallback\
             &state=t1.example"
        );
    }

    #[test]
    fn test_debug_redacts_secret() {
        let client = ShopifyClient::new(&config(None)).unwrap();
        let debug = format!("{client:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("hush"));
    }

    #[tokio::test]
    async fn test_exchange_code_success() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/admin/oauth/access_token"))
            .and(body_json(serde_json::json!({
                "client_id": "client-123",
                "client_secret": "hush",
                "code": "abc",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "shpat_123",
                "scope": "write_script_tags",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ShopifyClient::new(&config(Some(server.uri()))).unwrap();
        let token = client.exchange_code(&tenant(), "abc").await.unwrap();
        assert_eq!(token.expose_secret(), "shpat_123");
    }

    #[tokio::test]
    async fn test_exchange_code_refused() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/admin/oauth/access_token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid code"))
            .expect(1)
            .mount(&server)
            .await;

        let client = ShopifyClient::new(&config(Some(server.uri()))).unwrap();
        let err = client.exchange_code(&tenant(), "used").await.unwrap_err();
        assert!(matches!(err, ShopifyError::OAuth(_)));
        assert!(!err.to_string().contains("invalid code"));
    }

    #[tokio::test]
    async fn test_exchange_code_without_token() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/admin/oauth/access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "scope": "write_script_tags",
            })))
            .mount(&server)
            .await;

        let client = ShopifyClient::new(&config(Some(server.uri()))).unwrap();
        assert!(matches!(
            client.exchange_code(&tenant(), "abc").await,
            Err(ShopifyError::OAuth(_))
        ));
    }

    #[tokio::test]
    async fn test_exchange_code_times_out() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/admin/oauth/access_token"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let mut cfg = config(Some(server.uri()));
        cfg.http_timeout = Duration::from_millis(200);
        let client = ShopifyClient::new(&cfg).unwrap();

        assert!(matches!(
            client.exchange_code(&tenant(), "abc").await,
            Err(ShopifyError::Http(_))
        ));
    }

    #[tokio::test]
    async fn test_list_and_create_script_tags() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/admin/api/2023-10/script_tags.json"))
            .and(header("X-Shopify-Access-Token", "shpat_123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "script_tags": [{ "id": 1, "src": "https://cdn.example/other.js", "event": "onload" }]
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/admin/api/2023-10/script_tags.json"))
            .and(body_json(serde_json::json!({
                "script_tag": { "event": "onload", "src": "https://app.example/w.js?shop=t1.example" }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "script_tag": { "id": 2, "src": "https://app.example/w.js?shop=t1.example", "event": "onload" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ShopifyClient::new(&config(Some(server.uri()))).unwrap();
        let token = SecretString::from("shpat_123");

        let tags = client.list_script_tags(&tenant(), &token).await.unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].src, "https://cdn.example/other.js");

        let created = client
            .create_script_tag(&tenant(), &token, "https://app.example/w.js?shop=t1.example")
            .await
            .unwrap();
        assert_eq!(created.id, Some(2));
    }

    #[tokio::test]
    async fn test_rejected_token_is_unauthorized() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/admin/api/2023-10/script_tags.json"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = ShopifyClient::new(&config(Some(server.uri()))).unwrap();
        assert!(matches!(
            client
                .list_script_tags(&tenant(), &SecretString::from("revoked"))
                .await,
            Err(ShopifyError::Unauthorized(_))
        ));
    }
}
