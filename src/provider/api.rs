//! Versioned REST API prefixes and the path rewriting that routes calls to an account.

// self
use crate::{_prelude::*, error::ConfigError};

/// Maps a caller's API path onto an account's base URI.
pub trait ApiVersion
where
	Self: Send + Sync,
{
	/// Path prefix of the API, such as `/restapi/v2.1`.
	fn prefix(&self) -> &str;

	/// Resolves `path` for `account_id` against `base_uri`.
	///
	/// Relative paths become `{origin}{prefix}/accounts/{account_id}/{path}`. Paths starting
	/// with `/` and absolute URLs keep their path and query and are only moved to the base URI's
	/// origin.
	fn resolve(&self, base_uri: &Url, account_id: &str, path: &str) -> Result<Url, ConfigError> {
		let origin = base_uri.origin().ascii_serialization();
		let absolute =
			Url::parse(path).ok().filter(|url| matches!(url.scheme(), "http" | "https"));
		let target = if let Some(absolute) = absolute {
			let rest = &absolute[url::Position::BeforePath..];

			format!("{origin}{rest}")
		} else if path.starts_with('/') {
			format!("{origin}{path}")
		} else {
			format!(
				"{origin}{}/accounts/{account_id}/{}",
				self.prefix().trim_end_matches('/'),
				path.trim_start_matches("./")
			)
		};

		Url::parse(&target).map_err(|e| ConfigError::invalid_url(target, e))
	}
}

/// REST API families served from an account's base URI.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RestApi {
	prefix: &'static str,
}
impl RestApi {
	/// eSignature REST API v2.1.
	pub const V2_1: Self = Self { prefix: "/restapi/v2.1" };
	/// eSignature REST API v2.
	pub const V2: Self = Self { prefix: "/restapi/v2" };
	/// Click API v1.
	pub const CLICK_V1: Self = Self { prefix: "/clickapi/v1" };

	/// API rooted at a custom prefix.
	pub const fn custom(prefix: &'static str) -> Self {
		Self { prefix }
	}
}
impl ApiVersion for RestApi {
	fn prefix(&self) -> &str {
		self.prefix
	}
}
