//! Crate-level error types shared across signers, flows, credentials, and decorators.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed error used where failures originate in caller-supplied code or transports.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Key material, signing, or compact-token failure.
	#[error(transparent)]
	Signature(#[from] crate::jws::JwsError),
	/// Token endpoint response could not be turned into a token.
	#[error(transparent)]
	TokenParse(#[from] TokenParseError),
	/// Transport failure (DNS, TCP, TLS, I/O).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Upstream answered with a non-success status.
	#[error(transparent)]
	Response(#[from] ResponseError),
	/// User-info endpoint returned a payload that does not match the expected shape.
	#[error("User info response is malformed.")]
	UserInfoParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// The user has no account matching the requested identifier (or no default account).
	#[error("No account {account_id} for {email}.")]
	AccountNotFound {
		/// Requested account identifier; empty when the default account was requested.
		account_id: String,
		/// Email address of the user whose accounts were searched.
		email: String,
	},
	/// Caller-supplied rate-limit report handler rejected the response.
	#[error("Report handler rejected the response.")]
	Handler {
		/// Handler failure.
		#[source]
		source: BoxError,
	},
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// A header value contains characters HTTP does not allow.
	#[error("Header value for {name} is invalid.")]
	InvalidHeader {
		/// Header name.
		name: &'static str,
	},
	/// An API request body could not be serialized.
	#[error("Request body could not be serialized.")]
	RequestBody {
		/// Serialization failure.
		#[source]
		source: serde_json::Error,
	},
	/// A configured or discovered URL cannot be parsed.
	#[error("URL `{url}` is invalid.")]
	InvalidUrl {
		/// Offending URL text.
		url: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A configured endpoint does not use HTTPS.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Cached token is missing a refresh secret.
	#[error("Token is missing a refresh token.")]
	MissingRefreshToken,
	/// The `state` returned on redirect differs from the one sent.
	#[error("Authorization state mismatch.")]
	StateMismatch,
	/// Credential holds an invalid or expired token and cannot obtain a new one.
	#[error("No refresher for invalid/expired token.")]
	MissingRefresher,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}

	pub(crate) fn invalid_url(url: impl Into<String>, source: url::ParseError) -> Self {
		Self::InvalidUrl { url: url.into(), source }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Failures turning a token endpoint response into a [`Token`](crate::auth::Token).
#[derive(Debug, ThisError)]
pub enum TokenParseError {
	/// Token endpoint responded with malformed JSON.
	#[error("Token endpoint returned malformed JSON.")]
	Json {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// A token field holds a value of the wrong JSON type.
	#[error("Token field {field} must be a {expected}.")]
	WrongType {
		/// Offending field.
		field: &'static str,
		/// Expected JSON type.
		expected: &'static str,
	},
	/// The `expires_in` value cannot be read as a number of seconds.
	#[error("Token field expires_in is not a number: {value}.")]
	ExpiresIn {
		/// Raw value as received.
		value: String,
	},
	/// A field a token hook depends on is absent or not a string.
	#[error("Token response is missing {field}.")]
	MissingField {
		/// Missing field.
		field: &'static str,
	},
	/// Token endpoint response omitted the access token.
	#[error("Token endpoint response is missing access_token.")]
	MissingAccessToken,
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {target}.")]
	Network {
		/// Request target, without query.
		target: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during transport.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		target: impl Into<String>,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { target: target.into(), source: Box::new(src) }
	}
}

/// Non-success HTTP response from the token, user-info, or API endpoints.
#[derive(Clone, ThisError)]
#[error("Request failed with HTTP {status}: {}.", self.body_preview())]
pub struct ResponseError {
	/// HTTP status code.
	pub status: u16,
	/// Raw response body.
	pub body: Vec<u8>,
	/// Retry-After hint from upstream, if supplied.
	pub retry_after: Option<Duration>,
}
impl ResponseError {
	const BODY_PREVIEW_LIMIT: usize = 256;

	/// Creates an error for the provided status and body.
	pub fn new(status: u16, body: Vec<u8>) -> Self {
		Self { status, body, retry_after: None }
	}

	/// Attaches a Retry-After hint.
	pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
		self.retry_after = retry_after;

		self
	}

	/// OAuth `error` code from a JSON error body, when present.
	pub fn oauth_error(&self) -> Option<String> {
		serde_json::from_slice::<JsonValue>(&self.body)
			.ok()?
			.get("error")
			.and_then(JsonValue::as_str)
			.map(str::to_owned)
	}

	/// Lossy UTF-8 preview of the body, truncated for display.
	pub fn body_preview(&self) -> String {
		let text = String::from_utf8_lossy(&self.body);

		match text.char_indices().nth(Self::BODY_PREVIEW_LIMIT) {
			Some((idx, _)) => format!("{}...", &text[..idx]),
			None => text.into_owned(),
		}
	}
}
impl Debug for ResponseError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ResponseError")
			.field("status", &self.status)
			.field("body", &self.body_preview())
			.field("retry_after", &self.retry_after)
			.finish()
	}
}
