//! Tenant identifier type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`TenantId`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TenantIdError {
    /// The input string is empty.
    #[error("tenant id cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("tenant id must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains a character that cannot appear in a shop domain.
    #[error("tenant id contains invalid character {0:?}")]
    InvalidCharacter(char),
    /// The input starts or ends with a separator.
    #[error("tenant id cannot start or end with '.' or '-'")]
    BadBoundary,
}

/// A tenant identifier: the merchant's shop domain.
///
/// Every persisted record is keyed by this value, and it is interpolated into
/// outbound URLs (`https://{shop}/admin/...`), so parsing is strict.
///
/// ## Constraints
///
/// - Length: 1-255 characters
/// - ASCII letters, digits, `.` and `-` only
/// - Must not start or end with `.` or `-`
///
/// ## Examples
///
/// ```
/// use chat_launcher_core::TenantId;
///
/// assert!(TenantId::parse("mystore.myshopify.com").is_ok());
/// assert!(TenantId::parse("t1").is_ok());
///
/// assert!(TenantId::parse("").is_err());
/// assert!(TenantId::parse("evil.com/redirect").is_err());
/// assert!(TenantId::parse("user@host").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Maximum length of a tenant id (DNS name limit).
    pub const MAX_LENGTH: usize = 255;

    /// Parse a `TenantId` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, too long, contains anything
    /// other than ASCII alphanumerics, `.` and `-`, or starts/ends with a
    /// separator.
    pub fn parse(s: &str) -> Result<Self, TenantIdError> {
        if s.is_empty() {
            return Err(TenantIdError::Empty);
        }

        if s.len() > Self::MAX_LENGTH {
            return Err(TenantIdError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        if let Some(bad) = s
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '.' || *c == '-'))
        {
            return Err(TenantIdError::InvalidCharacter(bad));
        }

        let is_separator = |c: char| c == '.' || c == '-';
        if s.starts_with(is_separator) || s.ends_with(is_separator) {
            return Err(TenantIdError::BadBoundary);
        }

        Ok(Self(s.to_owned()))
    }

    /// Returns the tenant id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `TenantId` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Returns the store handle used in Shopify admin URLs.
    ///
    /// `mystore.myshopify.com` becomes `mystore`; custom domains are returned
    /// unchanged.
    #[must_use]
    pub fn store_handle(&self) -> &str {
        self.0.strip_suffix(".myshopify.com").unwrap_or(&self.0)
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for TenantId {
    type Err = TenantIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TenantId {
    type Error = TenantIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TenantId> for String {
    fn from(id: TenantId) -> Self {
        id.0
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// SQLx support (with postgres feature)
#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for TenantId {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for TenantId {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::parse(&s)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for TenantId {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}
