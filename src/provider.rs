//! Where requests go: authorization-server environments and versioned REST API routing.
//!
//! `endpoints` holds the validated authorization, token, and user-info URLs (HTTPS only,
//! loopback hosts excepted) and the demo/production presets. `api` defines [`ApiVersion`],
//! which maps a caller's relative API path onto the account's base URI.

pub mod api;
pub mod endpoints;

pub use api::*;
pub use endpoints::*;
