//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::shopify::{ShopifyClient, ShopifyError};
use crate::store::TenantStore;
use crate::verify::SessionTokenKeys;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// tenant store, the Shopify client, and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    store: Arc<dyn TenantStore>,
    shopify: ShopifyClient,
    session_keys: SessionTokenKeys,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the Shopify HTTP client cannot be built.
    pub fn new(config: AppConfig, store: Arc<dyn TenantStore>) -> Result<Self, ShopifyError> {
        let shopify = ShopifyClient::new(&config.shopify)?;
        let session_keys = config.session_token_keys();

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                shopify,
                session_keys,
            }),
        })
    }

    /// Get a reference to the app configuration.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// Get a reference to the tenant store.
    #[must_use]
    pub fn store(&self) -> &dyn TenantStore {
        self.inner.store.as_ref()
    }

    /// Get a reference to the Shopify client.
    #[must_use]
    pub fn shopify(&self) -> &ShopifyClient {
        &self.inner.shopify
    }

    /// Get the keys for verifying session tokens.
    #[must_use]
    pub fn session_keys(&self) -> &SessionTokenKeys {
        &self.inner.session_keys
    }
}
