//! `PostgreSQL` backend.
//!
//! # Tables (schema `launcher`)
//!
//! - `installations` - offline access token per shop
//! - `widget_configs` - phone number and greeting per shop
//! - `usage_counters` - widget click counter per shop
//!
//! Every mutation is a single statement, except `remove_installation` which
//! runs its three deletes in one transaction.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use chat_launcher_core::{ContactAddress, TenantId};

use super::{InstalledAtPolicy, StoreError, TenantStore};
use crate::models::{Installation, UsageCounter, WidgetConfig};

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

// =============================================================================
// Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct InstallationRow {
    tenant_id: TenantId,
    access_token: String,
    installed_at: DateTime<Utc>,
}

impl From<InstallationRow> for Installation {
    fn from(row: InstallationRow) -> Self {
        Self {
            tenant_id: row.tenant_id,
            access_token: SecretString::from(row.access_token),
            installed_at: row.installed_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WidgetConfigRow {
    tenant_id: TenantId,
    contact_address: String,
    greeting_text: String,
    updated_at: DateTime<Utc>,
}

impl TryFrom<WidgetConfigRow> for WidgetConfig {
    type Error = StoreError;

    fn try_from(row: WidgetConfigRow) -> Result<Self, Self::Error> {
        let contact_address = ContactAddress::parse(&row.contact_address).map_err(|e| {
            StoreError::DataCorruption(format!("invalid contact address for {}: {e}", row.tenant_id))
        })?;

        Ok(Self {
            tenant_id: row.tenant_id,
            contact_address,
            greeting_text: row.greeting_text,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UsageCounterRow {
    tenant_id: TenantId,
    click_count: i64,
    first_event_at: Option<DateTime<Utc>>,
    last_event_at: Option<DateTime<Utc>>,
}

impl TryFrom<UsageCounterRow> for UsageCounter {
    type Error = StoreError;

    fn try_from(row: UsageCounterRow) -> Result<Self, Self::Error> {
        let click_count = u64::try_from(row.click_count).map_err(|_| {
            StoreError::DataCorruption(format!(
                "negative click count {} for {}",
                row.click_count, row.tenant_id
            ))
        })?;

        Ok(Self {
            tenant_id: row.tenant_id,
            click_count,
            first_event_at: row.first_event_at,
            last_event_at: row.last_event_at,
        })
    }
}

// =============================================================================
// Store
// =============================================================================

/// Tenant store backed by `PostgreSQL`.
#[derive(Debug, Clone)]
pub struct PgTenantStore {
    pool: PgPool,
    policy: InstalledAtPolicy,
}

impl PgTenantStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool, policy: InstalledAtPolicy) -> Self {
        Self { pool, policy }
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl TenantStore for PgTenantStore {
    async fn save_installation(
        &self,
        tenant: &TenantId,
        access_token: &SecretString,
    ) -> Result<Installation, StoreError> {
        let preserve = self.policy == InstalledAtPolicy::Preserve;

        let row = sqlx::query_as::<_, InstallationRow>(
            r"
            INSERT INTO launcher.installations AS i (tenant_id, access_token, installed_at)
            VALUES ($1, $2, now())
            ON CONFLICT (tenant_id) DO UPDATE SET
                access_token = EXCLUDED.access_token,
                installed_at = CASE WHEN $3 THEN i.installed_at ELSE EXCLUDED.installed_at END,
                updated_at = now()
            RETURNING tenant_id, access_token, installed_at
            ",
        )
        .bind(tenant)
        .bind(access_token.expose_secret())
        .bind(preserve)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn get_installation(
        &self,
        tenant: &TenantId,
    ) -> Result<Option<Installation>, StoreError> {
        let row = sqlx::query_as::<_, InstallationRow>(
            r"
            SELECT tenant_id, access_token, installed_at
            FROM launcher.installations
            WHERE tenant_id = $1
            ",
        )
        .bind(tenant)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Installation::from))
    }

    async fn remove_installation(&self, tenant: &TenantId) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for statement in [
            "DELETE FROM launcher.usage_counters WHERE tenant_id = $1",
            "DELETE FROM launcher.widget_configs WHERE tenant_id = $1",
            "DELETE FROM launcher.installations WHERE tenant_id = $1",
        ] {
            sqlx::query(statement).bind(tenant).execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn save_widget_config(
        &self,
        tenant: &TenantId,
        contact: &ContactAddress,
        greeting: &str,
    ) -> Result<WidgetConfig, StoreError> {
        let row = sqlx::query_as::<_, WidgetConfigRow>(
            r"
            INSERT INTO launcher.widget_configs AS wc (tenant_id, contact_address, greeting_text, updated_at)
            VALUES ($1, $2, $3, clock_timestamp())
            ON CONFLICT (tenant_id) DO UPDATE SET
                contact_address = EXCLUDED.contact_address,
                greeting_text = EXCLUDED.greeting_text,
                updated_at = GREATEST(clock_timestamp(), wc.updated_at + INTERVAL '1 microsecond')
            RETURNING tenant_id, contact_address, greeting_text, updated_at
            ",
        )
        .bind(tenant)
        .bind(contact.as_str())
        .bind(greeting)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn get_widget_config(
        &self,
        tenant: &TenantId,
    ) -> Result<Option<WidgetConfig>, StoreError> {
        let row = sqlx::query_as::<_, WidgetConfigRow>(
            r"
            SELECT tenant_id, contact_address, greeting_text, updated_at
            FROM launcher.widget_configs
            WHERE tenant_id = $1
            ",
        )
        .bind(tenant)
        .fetch_optional(&self.pool)
        .await?;

        row.map(WidgetConfig::try_from).transpose()
    }

    async fn record_click_event(&self, tenant: &TenantId) -> Result<UsageCounter, StoreError> {
        let row = sqlx::query_as::<_, UsageCounterRow>(
            r"
            INSERT INTO launcher.usage_counters AS uc (tenant_id, click_count, first_event_at, last_event_at)
            VALUES ($1, 1, clock_timestamp(), clock_timestamp())
            ON CONFLICT (tenant_id) DO UPDATE SET
                click_count = uc.click_count + 1,
                first_event_at = COALESCE(uc.first_event_at, EXCLUDED.first_event_at),
                last_event_at = GREATEST(uc.last_event_at, EXCLUDED.last_event_at)
            RETURNING tenant_id, click_count, first_event_at, last_event_at
            ",
        )
        .bind(tenant)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn get_usage_counter(&self, tenant: &TenantId) -> Result<UsageCounter, StoreError> {
        let row = sqlx::query_as::<_, UsageCounterRow>(
            r"
            SELECT tenant_id, click_count, first_event_at, last_event_at
            FROM launcher.usage_counters
            WHERE tenant_id = $1
            ",
        )
        .bind(tenant)
        .fetch_optional(&self.pool)
        .await?;

        row.map_or_else(
            || Ok(UsageCounter::empty(tenant.clone())),
            UsageCounter::try_from,
        )
    }

    async fn list_installations(&self) -> Result<BTreeMap<TenantId, Installation>, StoreError> {
        let rows = sqlx::query_as::<_, InstallationRow>(
            r"
            SELECT tenant_id, access_token, installed_at
            FROM launcher.installations
            ORDER BY tenant_id
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.tenant_id.clone(), Installation::from(row)))
            .collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
