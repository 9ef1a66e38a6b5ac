//! Cache notification contract and built-in caches for refreshed credentials.
//!
//! A [`Credential`](crate::credential::Credential) calls its [`CredentialCache`] whenever it
//! obtains a new token or user info, so callers can persist the pair and rebuild the
//! credential later with `AuthorizationCodeConfig::credential` or `JwtConfig::credential`.

pub mod file;
pub mod memory;

pub use file::FileCache;
pub use memory::MemoryCache;

// self
use crate::{
	_prelude::*,
	auth::{Token, UserInfo},
};

/// Boxed future returned by cache operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Receives every newly obtained token and user-info pair.
pub trait CredentialCache
where
	Self: Send + Sync,
{
	/// Records the latest token and user info of one user.
	fn store<'a>(&'a self, token: &'a Token, user_info: &'a UserInfo) -> StoreFuture<'a, ()>;
}
impl<F> CredentialCache for F
where
	F: Send + Sync + Fn(&Token, &UserInfo) -> Result<(), StoreError>,
{
	fn store<'a>(&'a self, token: &'a Token, user_info: &'a UserInfo) -> StoreFuture<'a, ()> {
		Box::pin(async move { self(token, user_info) })
	}
}

/// Token and user info as last reported by a credential.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CachedCredential {
	/// Latest token.
	pub token: Token,
	/// Latest user info.
	pub user_info: UserInfo,
	/// When the pair was recorded.
	#[serde(with = "time::serde::timestamp")]
	pub stored_at: OffsetDateTime,
}
impl CachedCredential {
	/// Captures the pair at the current instant.
	pub fn new(token: &Token, user_info: &UserInfo) -> Self {
		Self {
			token: token.clone(),
			user_info: user_info.clone(),
			stored_at: OffsetDateTime::now_utc(),
		}
	}
}

/// Error type produced by [`CredentialCache`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
