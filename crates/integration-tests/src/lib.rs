//! Integration tests for Chat Launcher.
//!
//! The full router runs in-process against a file store in a temp directory,
//! with a `wiremock` server standing in for every shop's Admin API.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p chat-launcher-integration-tests
//! ```

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::missing_panics_doc)]

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use secrecy::SecretString;
use serde::Serialize;
use serde_json::Value;
use sha2::Sha256;
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::MockServer;

use chat_launcher_app::config::{AppConfig, STORE_FILE_NAME, ShopifyAppConfig};
use chat_launcher_app::state::AppState;
use chat_launcher_app::store::{self, InstalledAtPolicy, StoreBackend, TenantStore};
use chat_launcher_core::TenantId;

/// Client id the test app is registered with.
pub const API_KEY: &str = "client-123";
/// Shared secret for signatures and session tokens.
pub const API_SECRET: &str = "q7Lw2rN9vK4xT8mB3zH6";
/// Public base URL of the test app.
pub const APP_URL: &str = "https://launcher.example";
/// REST API version the test app calls.
pub const API_VERSION: &str = "2023-10";
/// Script tag endpoint on the mock shop.
pub const SCRIPT_TAGS_PATH: &str = "/admin/api/2023-10/script_tags.json";
/// Client IP sent on rate-limited routes.
pub const CLIENT_IP: &str = "203.0.113.9";

/// Knobs for [`TestContext::with_options`].
#[derive(Debug, Default)]
pub struct TestOptions {
    pub allow_dev_tokens: bool,
    pub app_handle: Option<String>,
}

/// A running app wired to a temp file store and a mock Shopify.
pub struct TestContext {
    pub router: Router,
    pub state: AppState,
    pub shopify: MockServer,
    pub store_path: PathBuf,
    _data_dir: TempDir,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_options(TestOptions::default()).await
    }

    pub async fn with_options(options: TestOptions) -> Self {
        let shopify = MockServer::start().await;
        let data_dir = tempfile::tempdir().expect("temp dir");
        let store_path = data_dir.path().join(STORE_FILE_NAME);

        let config = AppConfig {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            app_url: APP_URL.to_string(),
            store: StoreBackend::File {
                path: store_path.clone(),
            },
            installed_at_policy: InstalledAtPolicy::Refresh,
            allow_dev_tokens: options.allow_dev_tokens,
            shopify: ShopifyAppConfig {
                api_key: API_KEY.to_string(),
                api_secret: SecretString::from(API_SECRET),
                api_version: API_VERSION.to_string(),
                scopes: chat_launcher_app::config::DEFAULT_SCOPES.to_string(),
                http_timeout: Duration::from_secs(2),
                api_base_url: Some(shopify.uri()),
                app_handle: options.app_handle,
            },
            sentry_dsn: None,
            sentry_environment: None,
        };

        let tenant_store = store::open(&config.store, config.installed_at_policy)
            .await
            .expect("open store");
        let state = AppState::new(config, tenant_store).expect("app state");
        let router = chat_launcher_app::app(state.clone());

        Self {
            router,
            state,
            shopify,
            store_path,
            _data_dir: data_dir,
        }
    }

    pub fn store(&self) -> &dyn TenantStore {
        self.state.store()
    }

    /// Send one request through the router.
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    /// Record an installation directly in the store.
    pub async fn install(&self, shop: &str) -> TenantId {
        let tenant = tenant(shop);
        self.store()
            .save_installation(&tenant, &SecretString::from("shpat_test"))
            .await
            .expect("save installation");
        tenant
    }
}

pub fn tenant(shop: &str) -> TenantId {
    TenantId::parse(shop).expect("valid shop")
}

fn mac() -> Hmac<Sha256> {
    Hmac::<Sha256>::new_from_slice(API_SECRET.as_bytes()).expect("any key length")
}

/// Encode `params` as a query string with a valid `hmac` appended.
///
/// The signed message is the `k=v` pairs sorted by key, joined with `&`.
pub fn signed_query(params: &[(&str, &str)]) -> String {
    let mut sorted: Vec<(&str, &str)> = params.to_vec();
    sorted.sort_unstable();
    let message = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut mac = mac();
    mac.update(message.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    let mut query = url::form_urlencoded::Serializer::new(String::new());
    for (k, v) in params {
        query.append_pair(k, v);
    }
    query.append_pair("hmac", &signature);
    query.finish()
}

/// Base64 HMAC of a webhook body, as sent in `X-Shopify-Hmac-Sha256`.
pub fn webhook_signature(body: &[u8]) -> String {
    let mut mac = mac();
    mac.update(body);
    STANDARD.encode(mac.finalize().into_bytes())
}

#[derive(Serialize)]
struct SessionClaims {
    iss: String,
    dest: String,
    aud: String,
    sub: String,
    exp: i64,
    nbf: i64,
    iat: i64,
    jti: String,
}

/// An embedded-admin session token for `shop`, valid for `ttl_secs`
/// (negative for an already expired token).
pub fn session_token(shop: &str, ttl_secs: i64) -> String {
    session_token_signed_with(shop, ttl_secs, API_SECRET)
}

pub fn session_token_signed_with(shop: &str, ttl_secs: i64, secret: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = SessionClaims {
        iss: format!("https://{shop}/admin"),
        dest: format!("https://{shop}"),
        aud: API_KEY.to_string(),
        sub: "42".to_string(),
        exp: now + ttl_secs,
        nbf: now - 10,
        iat: now - 10,
        jti: "test-session".to_string(),
    };
    jsonwebtoken::encode(
        &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("encode session token")
}

/// Read a response body as JSON.
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

/// `Location` header of a redirect.
pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get("location")
        .expect("location header")
        .to_str()
        .expect("ascii location")
        .to_string()
}
