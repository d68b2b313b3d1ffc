//! Redirect to the Shopify-hosted plan selection page.

use axum::{
    extract::{Query, State},
    response::Redirect,
};
use serde::Deserialize;

use chat_launcher_core::TenantId;

use crate::error::{AppError, Result};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PricingQuery {
    pub shop: Option<String>,
}

/// Plan selection URL for `tenant` under the app's `app_handle`.
#[must_use]
pub fn plan_selection_url(tenant: &TenantId, app_handle: &str) -> String {
    format!(
        "https://admin.shopify.com/store/{}/charges/{}/pricing_plans",
        tenant.store_handle(),
        urlencoding::encode(app_handle)
    )
}

pub async fn pricing(
    State(state): State<AppState>,
    Query(query): Query<PricingQuery>,
) -> Result<Redirect> {
    let Some(app_handle) = state.config().shopify.app_handle.as_deref() else {
        return Err(AppError::NotFound("Pricing page not configured".to_string()));
    };

    let shop = query
        .shop
        .ok_or_else(|| AppError::BadRequest("Shop parameter required".to_string()))?;
    let tenant = TenantId::parse(&shop).map_err(|e| AppError::BadRequest(e.to_string()))?;

    Ok(Redirect::temporary(&plan_selection_url(&tenant, app_handle)))
}
