//! Widget settings saves from the dashboard form and the embedded admin.

use axum::{
    Form, Json,
    body::Bytes,
    extract::State,
    response::Redirect,
};
use serde::Deserialize;
use serde_json::{Value, json};

use chat_launcher_core::TenantId;

use crate::error::{AppError, Result};
use crate::middleware::OptionalSessionTenant;
use crate::middleware::tenant_auth::INVALID_SESSION;
use crate::services::widget::save_widget_settings;
use crate::state::AppState;

/// Dashboard form fields.
#[derive(Debug, Deserialize)]
pub struct ConfigureForm {
    pub shop: String,
    pub phone_number: String,
    pub initial_message: String,
}

/// Embedded admin JSON body. Every field is optional so that identity is
/// settled before field validation.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigureRequest {
    pub shop: Option<String>,
    pub phone_number: Option<String>,
    pub initial_message: Option<String>,
}

/// Save from the dashboard form and go back to the dashboard.
pub async fn configure_form(
    State(state): State<AppState>,
    Form(form): Form<ConfigureForm>,
) -> Result<Redirect> {
    let tenant = TenantId::parse(&form.shop).map_err(|e| AppError::BadRequest(e.to_string()))?;

    save_widget_settings(&state, &tenant, &form.phone_number, &form.initial_message).await?;

    Ok(Redirect::to(&format!("/dashboard?shop={tenant}&success=1")))
}

/// Save from the embedded admin.
///
/// Identity comes from the session token. Without a valid token, the body's
/// `shop` is accepted only in dev mode and only for an installed tenant.
pub async fn configure_json(
    State(state): State<AppState>,
    OptionalSessionTenant(session): OptionalSessionTenant,
    body: Bytes,
) -> Result<Json<Value>> {
    let request: ConfigureRequest = serde_json::from_slice(&body).unwrap_or_default();

    let tenant = match session {
        Some(tenant) => tenant,
        None if state.config().allow_dev_tokens => {
            installed_body_shop(&state, request.shop.as_deref())
                .await?
                .ok_or_else(|| AppError::Unauthorized(INVALID_SESSION.to_string()))?
        }
        None => return Err(AppError::Unauthorized(INVALID_SESSION.to_string())),
    };

    let non_empty = |field: Option<String>| field.filter(|v| !v.is_empty());
    let (Some(phone_number), Some(initial_message)) = (
        non_empty(request.phone_number),
        non_empty(request.initial_message),
    ) else {
        return Err(AppError::BadRequest("Missing required fields".to_string()));
    };

    save_widget_settings(&state, &tenant, &phone_number, &initial_message).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Configuration saved successfully",
    })))
}

async fn installed_body_shop(state: &AppState, shop: Option<&str>) -> Result<Option<TenantId>> {
    let Some(tenant) = shop.and_then(|s| TenantId::parse(s).ok()) else {
        return Ok(None);
    };
    let installed = state.store().get_installation(&tenant).await?.is_some();
    Ok(installed.then_some(tenant))
}
