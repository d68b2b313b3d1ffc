//! JSON API for the embedded admin and the storefront widget.

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;

use chat_launcher_core::TenantId;

use crate::error::{AppError, Result};
use crate::middleware::OptionalSessionTenant;
use crate::middleware::tenant_auth::INVALID_SESSION;
use crate::services::widget::require_installation;
use crate::state::AppState;
use crate::store::StoreError;

#[derive(Debug, Deserialize)]
pub struct ShopQuery {
    pub shop: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ClickRequest {
    pub shop: Option<String>,
}

/// Tenant for the admin read endpoints.
///
/// A verified session wins. With dev tokens enabled, `?shop=` naming an
/// installed tenant is accepted too.
async fn dashboard_tenant(
    state: &AppState,
    session: Option<TenantId>,
    shop: Option<&str>,
) -> Result<TenantId> {
    if let Some(tenant) = session {
        return Ok(tenant);
    }

    if state.config().allow_dev_tokens
        && let Some(tenant) = shop.and_then(|s| TenantId::parse(s).ok())
        && state.store().get_installation(&tenant).await?.is_some()
    {
        return Ok(tenant);
    }

    Err(AppError::Unauthorized(INVALID_SESSION.to_string()))
}

/// The tenant's widget settings, or `{}` when none are saved.
async fn widget_config_response(state: &AppState, tenant: &TenantId) -> Result<Response> {
    Ok(match state.store().get_widget_config(tenant).await? {
        Some(config) => Json(config).into_response(),
        None => Json(json!({})).into_response(),
    })
}

pub async fn config(
    State(state): State<AppState>,
    OptionalSessionTenant(session): OptionalSessionTenant,
    Query(query): Query<ShopQuery>,
) -> Result<Response> {
    let tenant = dashboard_tenant(&state, session, query.shop.as_deref()).await?;
    widget_config_response(&state, &tenant).await
}

/// Settings lookup for pages that cannot obtain a session token.
pub async fn config_fallback(
    State(state): State<AppState>,
    Query(query): Query<ShopQuery>,
) -> Result<Response> {
    let tenant = query
        .shop
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest("Shop parameter required".to_string()))
        .and_then(|s| TenantId::parse(s).map_err(|e| AppError::BadRequest(e.to_string())))?;

    require_installation(&state, &tenant).await?;
    widget_config_response(&state, &tenant).await
}

pub async fn analytics(
    State(state): State<AppState>,
    OptionalSessionTenant(session): OptionalSessionTenant,
    Query(query): Query<ShopQuery>,
) -> Result<Response> {
    let tenant = dashboard_tenant(&state, session, query.shop.as_deref()).await?;
    let counter = state.store().get_usage_counter(&tenant).await?;
    Ok(Json(counter).into_response())
}

/// Click beacon from the storefront widget.
///
/// Always answers 200; `success` says whether the click was counted. Clicks
/// for shops without an installation are not counted.
pub async fn widget_click(State(state): State<AppState>, body: Bytes) -> Json<serde_json::Value> {
    let tenant = serde_json::from_slice::<ClickRequest>(&body)
        .ok()
        .and_then(|request| request.shop)
        .and_then(|shop| TenantId::parse(&shop).ok());

    let Some(tenant) = tenant else {
        return Json(json!({ "success": false }));
    };

    match count_click(&state, &tenant).await {
        Ok(counted) => Json(json!({ "success": counted })),
        Err(e) => {
            let event_id = sentry::capture_error(&e);
            tracing::error!(
                tenant = %tenant,
                error = %e,
                sentry_event_id = %event_id,
                "Failed to record widget click"
            );
            Json(json!({ "success": false }))
        }
    }
}

async fn count_click(
    state: &AppState,
    tenant: &TenantId,
) -> std::result::Result<bool, StoreError> {
    if state.store().get_installation(tenant).await?.is_none() {
        tracing::debug!(tenant = %tenant, "Click for uninstalled shop ignored");
        return Ok(false);
    }
    state.store().record_click_event(tenant).await?;
    Ok(true)
}
