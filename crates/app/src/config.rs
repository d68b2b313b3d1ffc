//! App configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SHOPIFY_API_KEY` - App client id
//! - `SHOPIFY_API_SECRET` - App client secret (signs OAuth redirects, webhooks
//!   and session tokens)
//! - `APP_URL` - Public base URL of this app
//!
//! ## Optional
//! - `APP_HOST` - Bind address (default: 0.0.0.0)
//! - `PORT` - Listen port (default: 8000)
//! - `APP_STORE_BACKEND` - `file` or `postgres` (default: file)
//! - `DATA_DIR` - Directory for `app_data.json` (default: /app/data)
//! - `DATABASE_URL` - `PostgreSQL` connection string (required for postgres)
//! - `SHOPIFY_API_VERSION` - REST API version (default: 2023-10)
//! - `SHOPIFY_SCOPES` - OAuth scopes requested at install
//! - `SHOPIFY_HTTP_TIMEOUT_SECS` - Outbound request timeout (default: 20)
//! - `SHOPIFY_API_BASE_URL` - Send all shop calls here instead of `https://{shop}`
//! - `SHOPIFY_APP_HANDLE` - App handle for the hosted pricing page
//! - `APP_INSTALLED_AT_POLICY` - `refresh` or `preserve` (default: refresh)
//! - `APP_ALLOW_DEV_TOKENS` - Accept `dev-token-<shop>` bearer tokens (default: false)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

use crate::store::{InstalledAtPolicy, StoreBackend};
use crate::verify::SessionTokenKeys;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.0;

/// Scopes the app needs to manage its storefront script.
pub const DEFAULT_SCOPES: &str = "read_themes,write_themes,read_script_tags,write_script_tags";

/// File name of the JSON store inside `DATA_DIR`.
pub const STORE_FILE_NAME: &str = "app_data.json";

/// Path of the widget script, relative to `APP_URL`.
///
/// This app only registers the URL in script tags. The script itself is served
/// by the static host in front of `APP_URL`, not by any route here.
pub const WIDGET_SCRIPT_PATH: &str = "/whatsapp-widget.js";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// App configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL, without trailing slash
    pub app_url: String,
    /// Tenant store backend
    pub store: StoreBackend,
    /// `installed_at` behaviour on re-install
    pub installed_at_policy: InstalledAtPolicy,
    /// Accept unsigned development session tokens
    pub allow_dev_tokens: bool,
    /// Shopify app credentials and API settings
    pub shopify: ShopifyAppConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Shopify app configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct ShopifyAppConfig {
    /// App client id
    pub api_key: String,
    /// App client secret
    pub api_secret: SecretString,
    /// REST API version (e.g., 2023-10)
    pub api_version: String,
    /// Comma-separated OAuth scopes
    pub scopes: String,
    /// Timeout for every outbound call
    pub http_timeout: Duration,
    /// Base URL used instead of `https://{shop}` (testing, proxies)
    pub api_base_url: Option<String>,
    /// App handle for the hosted pricing page
    pub app_handle: Option<String>,
}

impl std::fmt::Debug for ShopifyAppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifyAppConfig")
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("api_version", &self.api_version)
            .field("scopes", &self.scopes)
            .field("http_timeout", &self.http_timeout)
            .field("api_base_url", &self.api_base_url)
            .field("app_handle", &self.app_handle)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the app secret fails validation (placeholder detection, entropy
    /// check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = parse_env("APP_HOST", "0.0.0.0")?;
        let port = parse_env("PORT", "8000")?;
        let app_url = normalize_app_url(&get_required_env("APP_URL")?)?;
        let store = store_backend_from_env(None)?;
        let installed_at_policy = parse_env("APP_INSTALLED_AT_POLICY", "refresh")?;
        let allow_dev_tokens = parse_env("APP_ALLOW_DEV_TOKENS", "false")?;

        if allow_dev_tokens {
            tracing::warn!("APP_ALLOW_DEV_TOKENS is enabled; unsigned dev tokens are accepted");
        }

        Ok(Self {
            host,
            port,
            app_url,
            store,
            installed_at_policy,
            allow_dev_tokens,
            shopify: ShopifyAppConfig::from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// OAuth redirect target registered with Shopify.
    #[must_use]
    pub fn oauth_redirect_uri(&self) -> String {
        format!("{}/auth/callback", self.app_url)
    }

    /// URL of the storefront widget script (without the `shop` query).
    #[must_use]
    pub fn widget_script_url(&self) -> String {
        format!("{}{WIDGET_SCRIPT_PATH}", self.app_url)
    }

    /// Keys for verifying embedded-admin session tokens.
    #[must_use]
    pub fn session_token_keys(&self) -> SessionTokenKeys {
        SessionTokenKeys {
            client_id: self.shopify.api_key.clone(),
            client_secret: self.shopify.api_secret.clone(),
            allow_dev_tokens: self.allow_dev_tokens,
        }
    }
}

impl ShopifyAppConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let timeout_secs: u64 = parse_env("SHOPIFY_HTTP_TIMEOUT_SECS", "20")?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "SHOPIFY_HTTP_TIMEOUT_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            api_key: get_required_env("SHOPIFY_API_KEY")?,
            api_secret: get_validated_secret("SHOPIFY_API_SECRET")?,
            api_version: get_env_or_default("SHOPIFY_API_VERSION", "2023-10"),
            scopes: get_env_or_default("SHOPIFY_SCOPES", DEFAULT_SCOPES),
            http_timeout: Duration::from_secs(timeout_secs),
            api_base_url: get_optional_env("SHOPIFY_API_BASE_URL"),
            app_handle: get_optional_env("SHOPIFY_APP_HANDLE"),
        })
    }
}

/// Resolve the tenant store location from the environment.
///
/// `kind` overrides `APP_STORE_BACKEND` when given.
///
/// # Errors
///
/// Returns `ConfigError` for an unknown backend name, or a missing
/// `DATABASE_URL` when the backend is `postgres`.
pub fn store_backend_from_env(kind: Option<&str>) -> Result<StoreBackend, ConfigError> {
    let kind = kind.map_or_else(
        || get_env_or_default("APP_STORE_BACKEND", "file"),
        String::from,
    );

    match kind.to_ascii_lowercase().as_str() {
        "file" => {
            let data_dir = PathBuf::from(get_env_or_default("DATA_DIR", "/app/data"));
            Ok(StoreBackend::File {
                path: data_dir.join(STORE_FILE_NAME),
            })
        }
        "postgres" => Ok(StoreBackend::Postgres {
            database_url: get_required_secret("DATABASE_URL")?,
        }),
        other => Err(ConfigError::InvalidEnvVar(
            "APP_STORE_BACKEND".to_string(),
            format!("expected 'file' or 'postgres', got '{other}'"),
        )),
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get an optional environment variable, treating empty as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable (or its default) with `FromStr`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Validate `APP_URL` and strip any trailing slash.
fn normalize_app_url(raw: &str) -> Result<String, ConfigError> {
    let url = url::Url::parse(raw)
        .map_err(|e| ConfigError::InvalidEnvVar("APP_URL".to_string(), e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ConfigError::InvalidEnvVar(
            "APP_URL".to_string(),
            "must be an absolute http(s) URL".to_string(),
        ));
    }

    Ok(raw.trim_end_matches('/').to_string())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is present, not a placeholder, and has sufficient
/// entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    if secret.trim().is_empty() {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            "must not be empty".to_string(),
        ));
    }

    let lower = secret.to_lowercase();

    // Check blocklist
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Check entropy (real secrets like API keys have high entropy)
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the secret issued by Shopify."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
