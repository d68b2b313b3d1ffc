//! Domain models for the launcher app.
//!
//! These types are what the store returns and what handlers hand back to
//! clients. Backend row/record types live next to each backend and convert
//! into these.

pub mod tenant;

pub use tenant::{Installation, UsageCounter, WidgetConfig};
