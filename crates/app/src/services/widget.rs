//! Widget settings.

use chat_launcher_core::{ContactAddress, TenantId};

use crate::error::{AppError, Result};
use crate::models::{Installation, WidgetConfig};
use crate::services::provision::provision_best_effort;
use crate::state::AppState;

/// Look up `tenant`'s installation, answering 401 when there is none.
///
/// # Errors
///
/// Returns `AppError::Unauthorized` if the tenant is not installed, or
/// `AppError::Store` if the lookup fails.
pub async fn require_installation(state: &AppState, tenant: &TenantId) -> Result<Installation> {
    state
        .store()
        .get_installation(tenant)
        .await?
        .ok_or_else(|| AppError::Unauthorized("App not installed".to_string()))
}

/// Validate and save `tenant`'s widget settings, then make sure the widget
/// script is registered on the storefront.
///
/// Provisioning failures are logged and do not fail the save.
///
/// # Errors
///
/// Returns `AppError::Unauthorized` if the tenant is not installed,
/// `AppError::BadRequest` if the contact address is invalid, or
/// `AppError::Store` if saving fails.
#[tracing::instrument(skip_all, fields(tenant = %tenant))]
pub async fn save_widget_settings(
    state: &AppState,
    tenant: &TenantId,
    contact_address: &str,
    greeting_text: &str,
) -> Result<WidgetConfig> {
    require_installation(state, tenant).await?;

    let contact = ContactAddress::parse(contact_address)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let config = state
        .store()
        .save_widget_config(tenant, &contact, greeting_text)
        .await?;

    provision_best_effort(
        state.store(),
        state.shopify(),
        &state.config().widget_script_url(),
        tenant,
    )
    .await;

    tracing::info!("Widget settings saved");
    Ok(config)
}
