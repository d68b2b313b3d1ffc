//! Widget script provisioning.
//!
//! Makes sure the storefront loads the widget script exactly once. The
//! list-then-create sequence is not atomic; two concurrent calls for the same
//! tenant can both create a tag.
//!
//! Only the tag is managed here. The widget script at the tagged URL is served
//! by the static host in front of `APP_URL`.

use thiserror::Error;

use chat_launcher_core::TenantId;

use crate::shopify::{ShopifyClient, ShopifyError};
use crate::store::{StoreError, TenantStore};

/// What provisioning did for a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// No installation, so there is no token to call the platform with.
    NotInstalled,
    /// A script tag pointing at the widget already exists.
    AlreadyRegistered,
    /// A new script tag was created.
    Registered,
}

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("shopify error: {0}")]
    Shopify(#[from] ShopifyError),
}

/// Script source registered for `tenant`.
fn tagged_src(widget_script_url: &str, tenant: &TenantId) -> String {
    format!(
        "{widget_script_url}?shop={}",
        urlencoding::encode(tenant.as_str())
    )
}

/// Register the widget script on `tenant`'s storefront unless a tag whose
/// source starts with `widget_script_url` is already there.
///
/// # Errors
///
/// Returns `ProvisionError` if the installation cannot be read or the
/// platform rejects or fails either call.
pub async fn ensure_widget_script_registered(
    store: &dyn TenantStore,
    client: &ShopifyClient,
    widget_script_url: &str,
    tenant: &TenantId,
) -> Result<ProvisionOutcome, ProvisionError> {
    let Some(installation) = store.get_installation(tenant).await? else {
        return Ok(ProvisionOutcome::NotInstalled);
    };

    let existing = client
        .list_script_tags(tenant, &installation.access_token)
        .await?;

    if existing
        .iter()
        .any(|tag| tag.src.starts_with(widget_script_url))
    {
        return Ok(ProvisionOutcome::AlreadyRegistered);
    }

    let src = tagged_src(widget_script_url, tenant);
    let created = client
        .create_script_tag(tenant, &installation.access_token, &src)
        .await?;

    tracing::debug!(tenant = %tenant, script_tag_id = ?created.id, "Script tag created");
    Ok(ProvisionOutcome::Registered)
}

/// Run [`ensure_widget_script_registered`] and swallow failures.
///
/// Saving settings must succeed even when the platform is unreachable, so
/// errors are only logged.
pub async fn provision_best_effort(
    store: &dyn TenantStore,
    client: &ShopifyClient,
    widget_script_url: &str,
    tenant: &TenantId,
) -> Option<ProvisionOutcome> {
    match ensure_widget_script_registered(store, client, widget_script_url, tenant).await {
        Ok(outcome) => {
            tracing::info!(tenant = %tenant, ?outcome, "Widget script provisioning finished");
            Some(outcome)
        }
        Err(e) => {
            tracing::warn!(tenant = %tenant, error = %e, "Widget script provisioning failed");
            None
        }
    }
}
