//! Thread-safe in-memory [`CredentialCache`] for tests and short-lived processes.

// self
use crate::{
	_prelude::*,
	auth::{Token, UserInfo},
	store::{CachedCredential, CredentialCache, StoreFuture},
};

type CacheMap = Arc<RwLock<HashMap<String, CachedCredential>>>;

/// Keeps the latest credential per API username in process memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryCache(CacheMap);
impl MemoryCache {
	/// Latest pair recorded for `api_username`.
	pub fn fetch(&self, api_username: &str) -> Option<CachedCredential> {
		self.0.read().get(api_username).cloned()
	}

	/// Number of users with a recorded credential.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when nothing has been recorded.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}
}
impl CredentialCache for MemoryCache {
	fn store<'a>(&'a self, token: &'a Token, user_info: &'a UserInfo) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			self.0
				.write()
				.insert(user_info.api_username.clone(), CachedCredential::new(token, user_info));

			Ok(())
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn keeps_latest_pair_per_user() {
		let cache = MemoryCache::default();
		let user_info: UserInfo = serde_json::from_value(serde_json::json!({
			"sub": "user-1",
			"email": "ada@example.com"
		}))
		.expect("User info fixture should deserialize.");

		assert!(cache.is_empty());

		cache.store(&Token::new("first"), &user_info).await.expect("First store should succeed.");
		cache.store(&Token::new("second"), &user_info).await.expect("Second store should succeed.");

		let cached = cache.fetch("user-1").expect("User should be cached.");

		assert_eq!(cache.len(), 1);
		assert_eq!(cached.token.access_token.expose(), "second");
		assert!(cache.fetch("user-2").is_none());
	}
}
