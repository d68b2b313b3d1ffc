//! Core types for Chat Launcher.
//!
//! This module provides type-safe wrappers for the values every tenant record
//! is keyed or validated by.

pub mod contact;
pub mod tenant;

pub use contact::{ContactAddress, ContactAddressError};
pub use tenant::{TenantId, TenantIdError};
