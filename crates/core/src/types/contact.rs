//! Contact address type (the phone number the widget opens a chat with).

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`ContactAddress`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ContactAddressError {
    /// Nothing left after removing separators.
    #[error("phone number cannot be empty")]
    Empty,
    /// Something other than digits remained after removing separators.
    #[error("Invalid phone number format")]
    NotNumeric,
}

/// A phone-number-like contact address.
///
/// The address is accepted when, after removing every `+`, `-` and space,
/// what remains is a non-empty run of ASCII digits. The original text is kept
/// so the merchant sees what they typed; [`ContactAddress::digits`] gives the
/// normalised form used in chat links.
///
/// ## Examples
///
/// ```
/// use chat_launcher_core::ContactAddress;
///
/// assert!(ContactAddress::parse("+1 555-123-4567").is_ok());
/// assert!(ContactAddress::parse("15551234567").is_ok());
///
/// assert!(ContactAddress::parse("call-me-maybe").is_err());
/// assert!(ContactAddress::parse("").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContactAddress(String);

impl ContactAddress {
    /// Parse a `ContactAddress` from a string.
    ///
    /// # Errors
    ///
    /// Returns [`ContactAddressError::Empty`] if nothing but separators was
    /// supplied, or [`ContactAddressError::NotNumeric`] if any other
    /// character remains.
    pub fn parse(s: &str) -> Result<Self, ContactAddressError> {
        let mut digits = s.chars().filter(|c| !is_separator(*c)).peekable();

        if digits.peek().is_none() {
            return Err(ContactAddressError::Empty);
        }

        if !digits.all(|c| c.is_ascii_digit()) {
            return Err(ContactAddressError::NotNumeric);
        }

        Ok(Self(s.to_owned()))
    }

    /// Returns the address exactly as it was entered.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns only the digits, e.g. `15551234567` for `+1 555-123-4567`.
    #[must_use]
    pub fn digits(&self) -> String {
        self.0.chars().filter(|c| !is_separator(*c)).collect()
    }
}

const fn is_separator(c: char) -> bool {
    matches!(c, '+' | '-' | ' ')
}

impl fmt::Display for ContactAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ContactAddress {
    type Err = ContactAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ContactAddress {
    type Error = ContactAddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ContactAddress> for String {
    fn from(address: ContactAddress) -> Self {
        address.0
    }
}

impl AsRef<str> for ContactAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
