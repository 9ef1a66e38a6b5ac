//! Access tokens as returned by token endpoints.
//!
//! A [`Token`] keeps the typed fields every grant needs (access token, type, refresh token,
//! expiry) plus the raw response it was parsed from, so provider-specific fields such as
//! `id_token` stay reachable through [`Token::extra`].

pub mod secret;

// self
use crate::{_prelude::*, auth::TokenSecret, error::TokenParseError};

/// Expiry delta applied when callers do not pick one.
pub const DEFAULT_EXPIRY_DELTA: Duration = Duration::seconds(10);

/// Raw token endpoint response captured alongside a [`Token`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenExtra {
	/// JSON object body.
	Json(JsonMap<String, JsonValue>),
	/// URL-encoded body, pairs kept in arrival order.
	Form(Vec<(String, String)>),
}
impl TokenExtra {
	fn get(&self, key: &str) -> Option<JsonValue> {
		match self {
			Self::Json(map) => map.get(key).cloned(),
			Self::Form(pairs) =>
				pairs.iter().find(|(name, _)| name == key).map(|(_, value)| form_value(value)),
		}
	}
}
impl From<JsonMap<String, JsonValue>> for TokenExtra {
	fn from(map: JsonMap<String, JsonValue>) -> Self {
		Self::Json(map)
	}
}
impl From<Vec<(String, String)>> for TokenExtra {
	fn from(pairs: Vec<(String, String)>) -> Self {
		Self::Form(pairs)
	}
}

/// OAuth 2.0 token; immutable once shared as `Arc<Token>`.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Token {
	/// Bearer credential authorizing requests.
	pub access_token: TokenSecret,
	/// Type as reported by the server; see [`Token::token_type`] for the normalized form.
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub token_type: String,
	/// Credential used to mint new access tokens.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<TokenSecret>,
	/// Instant after which the access token is no longer used; `None` never expires.
	#[serde(default, with = "time::serde::timestamp::option")]
	pub expiry: Option<OffsetDateTime>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	raw: Option<TokenExtra>,
}
impl Token {
	/// Creates a token with only an access token set.
	pub fn new(access_token: impl Into<TokenSecret>) -> Self {
		Self { access_token: access_token.into(), ..Default::default() }
	}

	/// Sets the token type.
	pub fn with_token_type(mut self, token_type: impl Into<String>) -> Self {
		self.token_type = token_type.into();

		self
	}

	/// Sets the refresh token.
	pub fn with_refresh_token(mut self, refresh_token: impl Into<TokenSecret>) -> Self {
		self.refresh_token = Some(refresh_token.into());

		self
	}

	/// Sets the expiry instant.
	pub fn with_expiry(mut self, expiry: Option<OffsetDateTime>) -> Self {
		self.expiry = expiry;

		self
	}

	/// Builds a token from a decoded JSON token response.
	///
	/// `expires_in` may be absent, null, a number, or a numeric string; zero means no expiry.
	/// The expiry is pulled forward by `expiry_delta` so tokens are replaced before the server
	/// rejects them.
	pub fn from_map(
		values: JsonMap<String, JsonValue>,
		expiry_delta: Duration,
	) -> Result<Self, TokenParseError> {
		let access_token = string_field(&values, "access_token")?.unwrap_or_default();
		let token_type = string_field(&values, "token_type")?.unwrap_or_default();
		let refresh_token = string_field(&values, "refresh_token")?.map(TokenSecret::from);
		let expires_in = match values.get("expires_in") {
			None | Some(JsonValue::Null) => None,
			Some(JsonValue::Number(n)) => Some(
				n.as_i64()
					.or_else(|| n.as_f64().map(|f| f as i64))
					.ok_or_else(|| TokenParseError::ExpiresIn { value: n.to_string() })?,
			),
			Some(JsonValue::String(s)) => parse_expires_in(s)?,
			Some(other) => return Err(TokenParseError::ExpiresIn { value: other.to_string() }),
		};

		Ok(Self {
			access_token: access_token.into(),
			token_type,
			refresh_token,
			expiry: expiry_from(expires_in, expiry_delta)?,
			raw: Some(TokenExtra::Json(values)),
		})
	}

	/// Builds a token from a URL-encoded token response.
	pub fn from_form<I, K, V>(pairs: I, expiry_delta: Duration) -> Result<Self, TokenParseError>
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		let pairs =
			pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect::<Vec<(String, String)>>();
		let first = |key: &str| {
			pairs.iter().find(|(name, _)| name == key).map(|(_, value)| value.as_str())
		};
		let access_token = first("access_token").unwrap_or_default().to_owned();
		let token_type = first("token_type").unwrap_or_default().to_owned();
		let refresh_token =
			first("refresh_token").filter(|v| !v.is_empty()).map(TokenSecret::from);
		let expires_in = match first("expires_in") {
			Some(value) => parse_expires_in(value)?,
			None => None,
		};

		Ok(Self {
			access_token: access_token.into(),
			token_type,
			refresh_token,
			expiry: expiry_from(expires_in, expiry_delta)?,
			raw: Some(TokenExtra::Form(pairs)),
		})
	}

	/// Returns `true` when the access token is non-empty and not expired.
	pub fn is_valid(&self) -> bool {
		self.is_valid_at(OffsetDateTime::now_utc())
	}

	/// Same as [`Token::is_valid`] evaluated at `instant`.
	pub fn is_valid_at(&self, instant: OffsetDateTime) -> bool {
		!self.access_token.is_empty() && self.expiry.is_none_or(|expiry| instant < expiry)
	}

	/// Normalized token type (`Bearer`, `MAC`, `Basic`, or the raw value); empty means
	/// `Bearer`.
	pub fn token_type(&self) -> &str {
		let raw = self.token_type.as_str();

		if raw.is_empty() || raw.eq_ignore_ascii_case("bearer") {
			"Bearer"
		} else if raw.eq_ignore_ascii_case("mac") {
			"MAC"
		} else if raw.eq_ignore_ascii_case("basic") {
			"Basic"
		} else {
			raw
		}
	}

	/// `Authorization` header value for this token.
	pub fn authorization_value(&self) -> String {
		format!("{} {}", self.token_type(), self.access_token.expose())
	}

	/// Looks up a field of the raw token response.
	///
	/// URL-encoded values are returned as an integer, a float, or a string, whichever parses
	/// first.
	pub fn extra(&self, key: &str) -> Option<JsonValue> {
		self.raw.as_ref()?.get(key)
	}

	/// Returns a copy carrying `raw` as its raw response.
	pub fn with_extra(&self, raw: impl Into<TokenExtra>) -> Self {
		Self { raw: Some(raw.into()), ..self.clone() }
	}
}
impl Debug for Token {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Token")
			.field("access_token", &self.access_token)
			.field("token_type", &self.token_type)
			.field("refresh_token", &self.refresh_token)
			.field("expiry", &self.expiry)
			.field("raw_set", &self.raw.is_some())
			.finish()
	}
}

fn string_field(
	values: &JsonMap<String, JsonValue>,
	field: &'static str,
) -> Result<Option<String>, TokenParseError> {
	match values.get(field) {
		None | Some(JsonValue::Null) => Ok(None),
		Some(JsonValue::String(s)) => Ok(Some(s.clone())),
		Some(_) => Err(TokenParseError::WrongType { field, expected: "string" }),
	}
}

fn parse_expires_in(value: &str) -> Result<Option<i64>, TokenParseError> {
	let trimmed = value.trim();

	if trimmed.is_empty() {
		return Ok(None);
	}

	trimmed
		.parse::<i64>()
		.ok()
		.or_else(|| trimmed.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
		.map(Some)
		.ok_or_else(|| TokenParseError::ExpiresIn { value: value.to_owned() })
}

fn expiry_from(
	expires_in: Option<i64>,
	expiry_delta: Duration,
) -> Result<Option<OffsetDateTime>, TokenParseError> {
	let secs = match expires_in {
		None | Some(0) => return Ok(None),
		Some(secs) => secs,
	};

	// Lifetimes outside the representable date range are rejected rather than clamped.
	Duration::seconds(secs)
		.checked_sub(expiry_delta)
		.and_then(|lifetime| OffsetDateTime::now_utc().checked_add(lifetime))
		.map(Some)
		.ok_or_else(|| TokenParseError::ExpiresIn { value: secs.to_string() })
}

fn form_value(value: &str) -> JsonValue {
	if let Ok(i) = value.parse::<i64>() {
		return JsonValue::from(i);
	}
	if let Some(f) = value.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
		return JsonValue::Number(f);
	}

	JsonValue::String(value.to_owned())
}
