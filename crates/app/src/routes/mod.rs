//! HTTP route handlers for the launcher app.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                           - App banner
//! GET  /health                     - Liveness
//! GET  /health/ready               - Readiness (store ping)
//!
//! # Install
//! GET  /install                    - Redirect to Shopify OAuth
//! GET  /auth/callback              - Verify, exchange the code, persist
//! GET  /pricing                    - Redirect to the hosted plan page
//!
//! # Widget settings
//! POST /configure-whatsapp         - Form save, 303 back to the dashboard
//! POST /api/configure-whatsapp     - JSON save (session token or installed shop)
//! GET  /api/config                 - Widget settings for the session tenant
//! GET  /api/config-fallback        - Widget settings by `shop` for installed tenants
//! GET  /api/analytics              - Click counter for the session tenant
//! POST /api/widget-click           - Storefront click beacon (rate limited)
//!
//! # Webhooks
//! POST /webhooks/app/uninstalled   - Remove all tenant data
//! ```

pub mod api;
pub mod configure;
pub mod health;
pub mod install;
pub mod pricing;
pub mod webhooks;

use axum::{
    Json, Router,
    routing::{get, post},
};
use serde_json::{Value, json};

use crate::middleware::widget_click_rate_limiter;
use crate::state::AppState;

/// Create the embedded admin and storefront API router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/configure-whatsapp", post(configure::configure_json))
        .route("/config", get(api::config))
        .route("/config-fallback", get(api::config_fallback))
        .route("/analytics", get(api::analytics))
        .route(
            "/widget-click",
            post(api::widget_click).layer(widget_click_rate_limiter()),
        )
}

/// Create all routes for the app.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .route("/install", get(install::install))
        .route("/auth/callback", get(install::callback))
        .route("/pricing", get(pricing::pricing))
        .route("/configure-whatsapp", post(configure::configure_form))
        .nest("/api", api_routes())
        .route("/webhooks/app/uninstalled", post(webhooks::app_uninstalled))
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "Shopify WhatsApp Launcher App" }))
}
