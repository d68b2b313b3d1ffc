//! JSON file backend.
//!
//! The whole store is one document:
//!
//! ```json
//! {
//!   "installations":  { "<shop>": { "access_token": "...", "installed_at": "..." } },
//!   "widget_configs": { "<shop>": { "phone_number": "...", "initial_message": "...", "updated_at": "..." } },
//!   "analytics":      { "<shop>": { "widget_clicks": 3, "first_click": "...", "last_click": "..." } }
//! }
//! ```
//!
//! Files written by earlier releases (`whatsapp_configs` key, timestamps
//! without an offset) are read as-is and rewritten in the current layout on
//! the next mutation.
//!
//! A mutation works on a copy of the document while holding the lock, writes
//! the copy to a temp file, fsyncs, renames it over the store file, and only
//! then swaps the copy in. A failed write leaves both memory and disk at the
//! previous state.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

use chat_launcher_core::{ContactAddress, TenantId};

use super::{InstalledAtPolicy, StoreError, TenantStore, next_timestamp};
use crate::models::{Installation, UsageCounter, WidgetConfig};

// =============================================================================
// Document
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    installations: BTreeMap<TenantId, InstallationRecord>,
    #[serde(default, alias = "whatsapp_configs")]
    widget_configs: BTreeMap<TenantId, WidgetConfigRecord>,
    #[serde(default)]
    analytics: BTreeMap<TenantId, UsageRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct InstallationRecord {
    #[serde(with = "secret")]
    access_token: SecretString,
    #[serde(deserialize_with = "timestamp::deserialize")]
    installed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WidgetConfigRecord {
    phone_number: ContactAddress,
    initial_message: String,
    #[serde(deserialize_with = "timestamp::deserialize")]
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct UsageRecord {
    widget_clicks: u64,
    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    first_click: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    last_click: Option<DateTime<Utc>>,
}

impl InstallationRecord {
    fn to_model(&self, tenant_id: &TenantId) -> Installation {
        Installation {
            tenant_id: tenant_id.clone(),
            access_token: self.access_token.clone(),
            installed_at: self.installed_at,
        }
    }
}

impl WidgetConfigRecord {
    fn to_model(&self, tenant_id: &TenantId) -> WidgetConfig {
        WidgetConfig {
            tenant_id: tenant_id.clone(),
            contact_address: self.phone_number.clone(),
            greeting_text: self.initial_message.clone(),
            updated_at: self.updated_at,
        }
    }
}

impl UsageRecord {
    fn to_model(&self, tenant_id: &TenantId) -> UsageCounter {
        UsageCounter {
            tenant_id: tenant_id.clone(),
            click_count: self.widget_clicks,
            first_event_at: self.first_click,
            last_event_at: self.last_click,
        }
    }
}

/// The token is written in clear to the store file; the file is created 0600.
mod secret {
    use secrecy::{ExposeSecret, SecretString};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(value.expose_secret())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
        String::deserialize(deserializer).map(SecretString::from)
    }
}

/// RFC 3339, or a naive ISO 8601 timestamp taken as UTC.
mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, de::Error};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(D::Error::custom)
    }

    pub fn deserialize_option<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|raw| parse(&raw))
            .transpose()
            .map_err(D::Error::custom)
    }

    pub(super) fn parse(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
        DateTime::parse_from_rfc3339(raw)
            .map(|ts| ts.with_timezone(&Utc))
            .or_else(|_| {
                NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|ts| ts.and_utc())
            })
    }
}

// =============================================================================
// Store
// =============================================================================

/// Tenant store backed by a single JSON file.
pub struct FileTenantStore {
    path: PathBuf,
    policy: InstalledAtPolicy,
    document: Mutex<StoreDocument>,
}

impl std::fmt::Debug for FileTenantStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileTenantStore")
            .field("path", &self.path)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl FileTenantStore {
    /// Open the store at `path`.
    ///
    /// A missing file starts an empty store. The parent directory is created
    /// if needed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Corrupt` if the file exists but does not parse,
    /// and `StoreError::Io` if it cannot be read.
    pub async fn open(path: impl AsRef<Path>, policy: InstalledAtPolicy) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StoreError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let document = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "Store file not found, starting empty");
                StoreDocument::default()
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        Ok(Self {
            path,
            policy,
            document: Mutex::new(document),
        })
    }

    /// Location of the store file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `operation` to a copy of the document, persist it, then commit.
    async fn mutate<T, F>(&self, operation: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut StoreDocument) -> T + Send,
        T: Send,
    {
        let mut document = self.document.lock().await;
        let mut next = document.clone();
        let result = operation(&mut next);

        self.persist(&next).await?;
        *document = next;

        Ok(result)
    }

    async fn persist(&self, document: &StoreDocument) -> Result<(), StoreError> {
        let payload = serde_json::to_vec_pretty(document)?;
        let temp_path = self
            .path
            .with_extension(format!("{}.tmp", Uuid::new_v4().simple()));

        if let Err(source) = write_synced(&temp_path, &payload).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(StoreError::Io {
                path: temp_path,
                source,
            });
        }

        if let Err(source) = tokio::fs::rename(&temp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(StoreError::Io {
                path: self.path.clone(),
                source,
            });
        }

        Ok(())
    }
}

async fn write_synced(path: &Path, payload: &[u8]) -> std::io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(payload).await?;
    file.sync_all().await
}

#[async_trait]
impl TenantStore for FileTenantStore {
    async fn save_installation(
        &self,
        tenant: &TenantId,
        access_token: &SecretString,
    ) -> Result<Installation, StoreError> {
        let policy = self.policy;

        self.mutate(|doc| {
            let now = Utc::now();
            let installed_at = match (policy, doc.installations.get(tenant)) {
                (InstalledAtPolicy::Preserve, Some(existing)) => existing.installed_at,
                _ => now,
            };

            let record = InstallationRecord {
                access_token: access_token.clone(),
                installed_at,
            };
            let installation = record.to_model(tenant);
            doc.installations.insert(tenant.clone(), record);
            installation
        })
        .await
    }

    async fn get_installation(
        &self,
        tenant: &TenantId,
    ) -> Result<Option<Installation>, StoreError> {
        let document = self.document.lock().await;
        Ok(document
            .installations
            .get(tenant)
            .map(|record| record.to_model(tenant)))
    }

    async fn remove_installation(&self, tenant: &TenantId) -> Result<(), StoreError> {
        self.mutate(|doc| {
            doc.installations.remove(tenant);
            doc.widget_configs.remove(tenant);
            doc.analytics.remove(tenant);
        })
        .await
    }

    async fn save_widget_config(
        &self,
        tenant: &TenantId,
        contact: &ContactAddress,
        greeting: &str,
    ) -> Result<WidgetConfig, StoreError> {
        self.mutate(|doc| {
            let previous = doc.widget_configs.get(tenant).map(|r| r.updated_at);
            let record = WidgetConfigRecord {
                phone_number: contact.clone(),
                initial_message: greeting.to_owned(),
                updated_at: next_timestamp(Utc::now(), previous),
            };
            let config = record.to_model(tenant);
            doc.widget_configs.insert(tenant.clone(), record);
            config
        })
        .await
    }

    async fn get_widget_config(
        &self,
        tenant: &TenantId,
    ) -> Result<Option<WidgetConfig>, StoreError> {
        let document = self.document.lock().await;
        Ok(document
            .widget_configs
            .get(tenant)
            .map(|record| record.to_model(tenant)))
    }

    async fn record_click_event(&self, tenant: &TenantId) -> Result<UsageCounter, StoreError> {
        self.mutate(|doc| {
            let now = Utc::now();
            let record = doc.analytics.entry(tenant.clone()).or_default();
            record.widget_clicks = record.widget_clicks.saturating_add(1);
            record.first_click.get_or_insert(now);
            record.last_click = Some(record.last_click.map_or(now, |last| last.max(now)));
            record.to_model(tenant)
        })
        .await
    }

    async fn get_usage_counter(&self, tenant: &TenantId) -> Result<UsageCounter, StoreError> {
        let document = self.document.lock().await;
        Ok(document.analytics.get(tenant).map_or_else(
            || UsageCounter::empty(tenant.clone()),
            |record| record.to_model(tenant),
        ))
    }

    async fn list_installations(&self) -> Result<BTreeMap<TenantId, Installation>, StoreError> {
        let document = self.document.lock().await;
        Ok(document
            .installations
            .iter()
            .map(|(tenant, record)| (tenant.clone(), record.to_model(tenant)))
            .collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        tokio::fs::metadata(dir)
            .await
            .map(|_| ())
            .map_err(|source| StoreError::Io {
                path: dir.to_path_buf(),
                source,
            })
    }
}
