//! HTTP middleware stack for the launcher app.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (hub per request, transaction per request)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Security headers (embedding in the Shopify admin only)
//! 5. CORS (permissive; the widget script runs on every storefront origin)
//! 6. Rate limiting on the public click endpoint (governor)

pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod tenant_auth;

pub use rate_limit::widget_click_rate_limiter;
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use tenant_auth::{OptionalSessionTenant, SessionTenant, bearer_token};
