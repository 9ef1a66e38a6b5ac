//! OAuth 2.0 credentials for eSignature REST APIs: JWT-bearer and authorization-code flows,
//! lazily refreshed account-bound credentials, and rate-limit reporting in one crate.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod credential;
pub mod error;
pub mod ext;
pub mod flows;
pub mod http;
pub mod jws;
pub mod oauth;
pub mod obs;
pub mod provider;
pub mod store;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::{Account, UserInfo},
		http::ReqwestHttpClient,
		provider::Endpoints,
	};

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Endpoints rooted at a mock server base URL (`/oauth/auth`, `/oauth/token`,
	/// `/oauth/userinfo`).
	pub fn test_endpoints(base: &str) -> Endpoints {
		let base = Url::parse(base).expect("Mock server base URL should parse.");

		Endpoints::from_base(&base).expect("Mock endpoints should build from the base URL.")
	}

	/// User info fixture with a default account and a secondary account, both routed to
	/// `base_uri`.
	pub fn test_user_info(base_uri: &str) -> UserInfo {
		UserInfo {
			api_username: "user-0001".into(),
			name: "Ada Signer".into(),
			given_name: "Ada".into(),
			family_name: "Signer".into(),
			email: "ada@example.com".into(),
			accounts: vec![
				Account {
					account_id: "acct-default".into(),
					is_default: true,
					account_name: "Default Account".into(),
					base_uri: base_uri.into(),
					organization: None,
				},
				Account {
					account_id: "acct-other".into(),
					is_default: false,
					account_name: "Other Account".into(),
					base_uri: base_uri.into(),
					organization: None,
				},
			],
		}
	}

	/// JSON body a user-info endpoint returns for [`test_user_info`].
	pub fn test_user_info_body(base_uri: &str) -> String {
		serde_json::to_string(&test_user_info(base_uri))
			.expect("User info fixture should serialize to JSON.")
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::{Map as JsonMap, Value as JsonValue};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
