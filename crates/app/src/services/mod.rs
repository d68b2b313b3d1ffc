//! Business logic that sits between the routes and the store/Shopify client.
//!
//! - [`install`] - OAuth callback: verify, exchange the code once, persist
//! - [`provision`] - make sure the widget script tag exists on the storefront
//! - [`widget`] - validate and save a tenant's widget settings

pub mod install;
pub mod provision;
pub mod widget;
