//! Install flow: send the merchant to Shopify, then finish on the callback.

use axum::{
    extract::{Query, RawQuery, State},
    response::Redirect,
};
use serde::Deserialize;
use tracing::instrument;

use chat_launcher_core::TenantId;

use crate::error::{AppError, Result, set_sentry_tenant};
use crate::services::install::complete_install;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct InstallQuery {
    pub shop: Option<String>,
}

/// Start OAuth: redirect to the shop's authorize page.
///
/// `state` carries the shop so the callback can check it comes back unchanged.
#[instrument(skip(state))]
pub async fn install(
    State(state): State<AppState>,
    Query(query): Query<InstallQuery>,
) -> Result<Redirect> {
    let shop = query
        .shop
        .ok_or_else(|| AppError::BadRequest("Shop parameter required".to_string()))?;
    let tenant = TenantId::parse(&shop).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let config = state.config();
    let url = state.shopify().authorization_url(
        &tenant,
        &config.shopify.scopes,
        &config.oauth_redirect_uri(),
        tenant.as_str(),
    );

    tracing::info!(tenant = %tenant, "Starting install");
    Ok(Redirect::temporary(&url))
}

/// Finish OAuth and send the merchant to their dashboard.
///
/// The full raw query is kept because the signature covers every parameter.
#[instrument(skip_all)]
pub async fn callback(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Redirect> {
    let params: Vec<(String, String)> =
        url::form_urlencoded::parse(query.unwrap_or_default().as_bytes())
            .into_owned()
            .collect();

    let tenant = complete_install(
        state.store(),
        state.shopify(),
        &state.config().shopify.api_secret,
        &params,
    )
    .await?;

    set_sentry_tenant(&tenant);
    Ok(Redirect::temporary(&format!("/dashboard?shop={tenant}")))
}
