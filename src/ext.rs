//! Decorators layered over [`AuthorizedClient`](crate::credential::AuthorizedClient).

pub mod rate_limit;

pub use rate_limit::*;
