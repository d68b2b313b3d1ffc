//! Chat Launcher Core - Shared tenant types.
//!
//! This crate provides the validated types used across the Chat Launcher
//! components:
//! - `app` - The Shopify app server (OAuth install, widget configuration, webhooks)
//! - `cli` - Command-line tools for migrations and inspection
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. Everything that crosses a trust boundary is parsed into
//! one of these types before the rest of the system sees it.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for tenant identifiers and contact addresses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
