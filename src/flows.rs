//! Grant orchestrators that mint tokens and bind them into credentials.
//!
//! [`JwtConfig`] drives the two-legged JWT-bearer grant for service integrations that
//! impersonate a user; [`AuthorizationCodeConfig`] drives the three-legged redirect flow and
//! its refresh grant.

pub mod authorization_code;
pub mod jwt_bearer;

pub use authorization_code::*;
pub use jwt_bearer::*;

/// `grant_type` of the JWT-bearer assertion grant.
pub const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
