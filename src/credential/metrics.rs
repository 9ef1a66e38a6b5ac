// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for one credential and every copy derived from it.
#[derive(Debug, Default)]
pub struct CredentialMetrics {
	refreshes: AtomicU64,
	user_info_fetches: AtomicU64,
	cache_notifications: AtomicU64,
	cache_failures: AtomicU64,
	failures: AtomicU64,
}
impl CredentialMetrics {
	/// Number of refresher invocations.
	pub fn refreshes(&self) -> u64 {
		self.refreshes.load(Ordering::Relaxed)
	}

	/// Number of user-info requests.
	pub fn user_info_fetches(&self) -> u64 {
		self.user_info_fetches.load(Ordering::Relaxed)
	}

	/// Number of successful cache notifications.
	pub fn cache_notifications(&self) -> u64 {
		self.cache_notifications.load(Ordering::Relaxed)
	}

	/// Number of cache notifications that returned an error.
	pub fn cache_failures(&self) -> u64 {
		self.cache_failures.load(Ordering::Relaxed)
	}

	/// Number of `token()` calls that failed.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	pub(crate) fn record_refresh(&self) {
		self.refreshes.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_user_info_fetch(&self) {
		self.user_info_fetches.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_cache_notification(&self) {
		self.cache_notifications.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_cache_failure(&self) {
		self.cache_failures.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}
}
