//! Per-tenant domain types.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Serialize;

use chat_launcher_core::{ContactAddress, TenantId};

/// A completed install: the credential granted to the app for one shop.
///
/// Implements `Debug` manually to redact the access token. Deliberately not
/// `Serialize` so it cannot end up in an HTTP response.
#[derive(Clone)]
pub struct Installation {
    /// Shop the credential belongs to.
    pub tenant_id: TenantId,
    /// Offline access token (HIGH PRIVILEGE - redacted in debug output).
    pub access_token: SecretString,
    /// When the credential was stored.
    pub installed_at: DateTime<Utc>,
}

impl std::fmt::Debug for Installation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Installation")
            .field("tenant_id", &self.tenant_id)
            .field("access_token", &"[REDACTED]")
            .field("installed_at", &self.installed_at)
            .finish()
    }
}

/// The merchant's widget settings.
///
/// Serialised with the field names the widget script and dashboard read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WidgetConfig {
    #[serde(skip)]
    pub tenant_id: TenantId,
    /// Phone number the chat link opens.
    #[serde(rename = "phone_number")]
    pub contact_address: ContactAddress,
    /// Message pre-filled in the chat.
    #[serde(rename = "initial_message")]
    pub greeting_text: String,
    /// Strictly increases across saves for the same tenant.
    pub updated_at: DateTime<Utc>,
}

/// Widget click counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageCounter {
    #[serde(skip)]
    pub tenant_id: TenantId,
    #[serde(rename = "widget_clicks")]
    pub click_count: u64,
    #[serde(rename = "first_click")]
    pub first_event_at: Option<DateTime<Utc>>,
    #[serde(rename = "last_click")]
    pub last_event_at: Option<DateTime<Utc>>,
}

impl UsageCounter {
    /// The counter for a tenant that has never recorded a click.
    #[must_use]
    pub const fn empty(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            click_count: 0,
            first_event_at: None,
            last_event_at: None,
        }
    }
}
