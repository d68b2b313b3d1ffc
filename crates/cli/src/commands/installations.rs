//! Tenant installation inspection.
//!
//! Prints tenant ids and install times. Access tokens are never printed.

use std::io::Write;

use chat_launcher_app::config::{ConfigError, store_backend_from_env};
use chat_launcher_app::store::{self, InstalledAtPolicy, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InstallationsError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Output error: {0}")]
    Io(#[from] std::io::Error),
}

/// List every installation in the selected backend.
///
/// # Errors
///
/// Returns `InstallationsError` if the backend is misconfigured, cannot be
/// opened, or stdout cannot be written.
pub async fn list(backend: Option<&str>) -> Result<(), InstallationsError> {
    dotenvy::dotenv().ok();

    let backend = store_backend_from_env(backend)?;
    tracing::info!(backend = backend.name(), "Opening tenant store...");

    // The policy only affects writes; listing never writes.
    let tenant_store = store::open(&backend, InstalledAtPolicy::default()).await?;
    let installations = tenant_store.list_installations().await?;

    let mut out = std::io::stdout().lock();
    for (tenant, installation) in &installations {
        writeln!(out, "{tenant}\t{}", installation.installed_at.to_rfc3339())?;
    }

    tracing::info!(count = installations.len(), "Listed installations");
    Ok(())
}
