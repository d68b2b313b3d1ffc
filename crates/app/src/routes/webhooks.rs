//! Shopify webhooks.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use serde::Deserialize;
use serde_json::{Value, json};

use chat_launcher_core::TenantId;

use crate::error::{AppError, Result, set_sentry_tenant};
use crate::state::AppState;
use crate::verify::{WEBHOOK_HMAC_HEADER, verify_webhook_signature};

/// Header naming the shop a webhook is about.
pub const SHOP_DOMAIN_HEADER: &str = "x-shopify-shop-domain";

#[derive(Debug, Deserialize)]
struct UninstalledPayload {
    domain: Option<String>,
}

/// `app/uninstalled`: drop everything stored for the shop.
///
/// A store failure answers 500 so Shopify redelivers.
pub async fn app_uninstalled(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let signature = headers
        .get(WEBHOOK_HMAC_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Invalid webhook signature".to_string()))?;

    verify_webhook_signature(&body, signature, &state.config().shopify.api_secret).map_err(|e| {
        tracing::debug!(error = %e, "Webhook signature rejected");
        AppError::Unauthorized("Invalid webhook signature".to_string())
    })?;

    let payload = match serde_json::from_slice::<UninstalledPayload>(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(error = %e, "Unparseable uninstall webhook body");
            return Ok(Json(json!({ "success": true })));
        }
    };

    let shop = payload.domain.or_else(|| {
        headers
            .get(SHOP_DOMAIN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    });

    match shop.as_deref().map(TenantId::parse) {
        Some(Ok(tenant)) => {
            set_sentry_tenant(&tenant);
            state.store().remove_installation(&tenant).await?;
            tracing::info!(tenant = %tenant, "App uninstalled");
        }
        Some(Err(e)) => tracing::warn!(error = %e, "Uninstall webhook names an invalid shop"),
        None => tracing::warn!("Uninstall webhook without a shop"),
    }

    Ok(Json(json!({ "success": true })))
}
