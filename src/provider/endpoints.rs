//! Authorization-server environments and validated OAuth endpoint sets.
//!
//! Endpoints must use HTTPS; plain HTTP is accepted only for loopback hosts.

// std
use std::net::IpAddr;
// self
use crate::{_prelude::*, error::ConfigError};

/// Authorization-server deployment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
	/// Developer sandbox.
	#[default]
	Demo,
	/// Live accounts.
	Production,
}
impl Environment {
	/// Host of the authorization server; also the `aud` of JWT-bearer assertions.
	pub const fn auth_host(self) -> &'static str {
		match self {
			Self::Demo => "account-d.docusign.com",
			Self::Production => "account.docusign.com",
		}
	}

	/// Endpoints served by this environment's authorization server.
	pub fn endpoints(self) -> Result<Endpoints, ConfigError> {
		let base = format!("https://{}", self.auth_host());
		let base = Url::parse(&base).map_err(|e| ConfigError::invalid_url(base, e))?;

		Endpoints::from_base(&base)
	}
}

/// Validated OAuth endpoint set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
	/// Authorization endpoint the user is redirected to.
	pub authorization: Url,
	/// Token endpoint for code, refresh, and JWT-bearer grants.
	pub token: Url,
	/// User-info endpoint.
	pub user_info: Url,
}
impl Endpoints {
	/// Creates an endpoint set, rejecting non-HTTPS URLs on non-loopback hosts.
	pub fn new(authorization: Url, token: Url, user_info: Url) -> Result<Self, ConfigError> {
		validate_endpoint("authorization", &authorization)?;
		validate_endpoint("token", &token)?;
		validate_endpoint("user_info", &user_info)?;

		Ok(Self { authorization, token, user_info })
	}

	/// Derives `/oauth/auth`, `/oauth/token`, and `/oauth/userinfo` under `base`.
	pub fn from_base(base: &Url) -> Result<Self, ConfigError> {
		let join = |path: &str| {
			base.join(path).map_err(|e| ConfigError::invalid_url(format!("{base}{path}"), e))
		};

		Self::new(join("/oauth/auth")?, join("/oauth/token")?, join("/oauth/userinfo")?)
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ConfigError> {
	if url.scheme() == "https" || (url.scheme() == "http" && is_loopback(url)) {
		Ok(())
	} else {
		Err(ConfigError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host_str() {
		Some("localhost") => true,
		Some(host) => host
			.trim_start_matches('[')
			.trim_end_matches(']')
			.parse::<IpAddr>()
			.map(|ip| ip.is_loopback())
			.unwrap_or(false),
		None => false,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(value: &str) -> Url {
		Url::parse(value).expect("URL fixture should parse.")
	}

	#[test]
	fn environments_point_at_their_hosts() {
		let demo = Environment::Demo.endpoints().expect("Demo endpoints should build.");
		let production =
			Environment::Production.endpoints().expect("Production endpoints should build.");

		assert_eq!(demo.authorization.as_str(), "https://account-d.docusign.com/oauth/auth");
		assert_eq!(demo.token.as_str(), "https://account-d.docusign.com/oauth/token");
		assert_eq!(production.user_info.as_str(), "https://account.docusign.com/oauth/userinfo");
	}

	#[test]
	fn insecure_endpoints_are_rejected_except_on_loopback() {
		let err = Endpoints::from_base(&url("http://auth.example.com"))
			.expect_err("Plain HTTP should be rejected for public hosts.");

		assert!(matches!(err, ConfigError::InsecureEndpoint { endpoint: "authorization", .. }));

		for base in ["http://127.0.0.1:8080", "http://localhost:9000", "http://[::1]:1234"] {
			Endpoints::from_base(&url(base)).expect("Loopback HTTP should be accepted.");
		}
	}

	#[test]
	fn from_base_replaces_existing_path() {
		let endpoints = Endpoints::from_base(&url("https://auth.example.com/ignored/path"))
			.expect("Endpoints should build.");

		assert_eq!(endpoints.token.as_str(), "https://auth.example.com/oauth/token");
	}
}
