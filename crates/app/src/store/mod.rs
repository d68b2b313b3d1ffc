//! Tenant persistence.
//!
//! # Backends
//!
//! - [`FileTenantStore`] - a single JSON document on local disk, for
//!   single-process deployments and development
//! - [`PgTenantStore`] - `PostgreSQL`, schema `launcher`
//!
//! The backend is chosen once at startup by [`open`] and handed to the rest
//! of the app as `Arc<dyn TenantStore>`.
//!
//! # Migrations
//!
//! `PostgreSQL` migrations are stored in `crates/app/migrations/` and run via:
//! ```bash
//! cargo run -p chat-launcher-cli -- migrate
//! ```

pub mod file;
pub mod postgres;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use secrecy::SecretString;
use thiserror::Error;

use chat_launcher_core::{ContactAddress, TenantId};

use crate::models::{Installation, UsageCounter, WidgetConfig};

pub use file::FileTenantStore;
pub use postgres::PgTenantStore;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Reading or writing the store file failed.
    #[error("store file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The store file exists but is not a valid store document.
    #[error("store file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Encoding the store document failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Data in the store is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

/// What happens to `installed_at` when a tenant re-installs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InstalledAtPolicy {
    /// Reset to the time of the latest install.
    #[default]
    Refresh,
    /// Keep the time of the first install.
    Preserve,
}

impl FromStr for InstalledAtPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "refresh" => Ok(Self::Refresh),
            "preserve" => Ok(Self::Preserve),
            other => Err(format!("expected 'refresh' or 'preserve', got '{other}'")),
        }
    }
}

/// Which backend to open, with its location.
#[derive(Debug, Clone)]
pub enum StoreBackend {
    /// JSON document at `path`.
    File { path: PathBuf },
    /// `PostgreSQL` database (URL contains the password).
    Postgres { database_url: SecretString },
}

impl StoreBackend {
    /// Short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::File { .. } => "file",
            Self::Postgres { .. } => "postgres",
        }
    }
}

/// Key-value persistence for everything the app knows about a tenant.
///
/// Every mutation is durable before it returns. Implementations serialise
/// concurrent mutations for the same tenant so that no update is lost.
#[async_trait]
pub trait TenantStore: Send + Sync {
    /// Insert or overwrite the tenant's credential.
    async fn save_installation(
        &self,
        tenant: &TenantId,
        access_token: &SecretString,
    ) -> Result<Installation, StoreError>;

    async fn get_installation(&self, tenant: &TenantId)
    -> Result<Option<Installation>, StoreError>;

    /// Delete the installation, widget config and usage counter in one step.
    async fn remove_installation(&self, tenant: &TenantId) -> Result<(), StoreError>;

    /// Insert or overwrite the widget config. `updated_at` always moves forward.
    async fn save_widget_config(
        &self,
        tenant: &TenantId,
        contact: &ContactAddress,
        greeting: &str,
    ) -> Result<WidgetConfig, StoreError>;

    async fn get_widget_config(&self, tenant: &TenantId)
    -> Result<Option<WidgetConfig>, StoreError>;

    /// Count one widget click, creating the counter on first use.
    async fn record_click_event(&self, tenant: &TenantId) -> Result<UsageCounter, StoreError>;

    /// The tenant's counter, or the zero counter if none exists.
    async fn get_usage_counter(&self, tenant: &TenantId) -> Result<UsageCounter, StoreError>;

    async fn list_installations(&self) -> Result<BTreeMap<TenantId, Installation>, StoreError>;

    /// Check that the backend is reachable.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Open the configured backend.
///
/// # Errors
///
/// Returns `StoreError` if the database is unreachable or the store file
/// cannot be read.
pub async fn open(
    backend: &StoreBackend,
    policy: InstalledAtPolicy,
) -> Result<Arc<dyn TenantStore>, StoreError> {
    let store: Arc<dyn TenantStore> = match backend {
        StoreBackend::File { path } => Arc::new(FileTenantStore::open(path, policy).await?),
        StoreBackend::Postgres { database_url } => {
            let pool = postgres::create_pool(database_url).await?;
            Arc::new(PgTenantStore::new(pool, policy))
        }
    };

    tracing::info!(backend = backend.name(), "Tenant store opened");
    Ok(store)
}

/// Next `updated_at` for a record last written at `previous`.
///
/// Wall clocks can step backwards; the result is always later than
/// `previous`.
pub(crate) fn next_timestamp(now: DateTime<Utc>, previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    previous.map_or(now, |prev| now.max(prev + TimeDelta::microseconds(1)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_next_timestamp_uses_now_when_later() {
        let prev = Utc::now();
        let now = prev + TimeDelta::seconds(5);
        assert_eq!(next_timestamp(now, Some(prev)), now);
    }

    #[test]
    fn test_next_timestamp_moves_forward_when_clock_lags() {
        let prev = Utc::now();
        let now = prev - TimeDelta::seconds(5);
        let next = next_timestamp(now, Some(prev));
        assert!(next > prev);
    }

    #[test]
    fn test_next_timestamp_without_previous() {
        let now = Utc::now();
        assert_eq!(next_timestamp(now, None), now);
    }

    #[test]
    fn test_installed_at_policy_parse() {
        assert_eq!(
            "refresh".parse::<InstalledAtPolicy>().unwrap(),
            InstalledAtPolicy::Refresh
        );
        assert_eq!(
            "PRESERVE".parse::<InstalledAtPolicy>().unwrap(),
            InstalledAtPolicy::Preserve
        );
        assert!("sometimes".parse::<InstalledAtPolicy>().is_err());
    }
}
