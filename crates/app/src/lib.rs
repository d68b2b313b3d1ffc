//! Chat Launcher app server.
//!
//! A multi-tenant Shopify app: merchants install it over OAuth, pick a
//! WhatsApp number and greeting, and the app registers a storefront script
//! that renders the chat launcher and reports clicks back.
//!
//! # Architecture
//!
//! - Axum HTTP server; every handler returns `Result<T, AppError>`
//! - Tenant data behind [`store::TenantStore`]: an atomic JSON file or `PostgreSQL`
//! - Pure verifiers for query signatures, webhook bodies and session tokens
//! - `reqwest` client for the OAuth exchange and the script tag REST calls
//!
//! # Security
//!
//! Access tokens stay wrapped in `SecretString` and only leave the process
//! as the `X-Shopify-Access-Token` header. Every tenant-scoped request is
//! authenticated by a signature or a session token before the store is read.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod shopify;
pub mod state;
pub mod store;
pub mod verify;

use axum::{Router, http::Request};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use state::AppState;

/// Build the full router with middleware and Sentry layers.
pub fn app(state: AppState) -> Router {
    routes::routes()
        .layer(axum::middleware::from_fn(
            middleware::security_headers_middleware,
        ))
        .layer(CorsLayer::permissive())
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
