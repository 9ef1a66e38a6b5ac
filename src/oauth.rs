//! Authorization-server plumbing shared by every flow.
//!
//! [`TokenEndpoint`] posts grant forms and turns responses into [`Token`] values, the
//! authorize-URL builder drives the `oauth2` crate's `BasicClient`, and
//! [`fetch_user_info`] reads the signed-in user's accounts.

pub use oauth2;

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
use oauth2::{AuthUrl, ClientId, CsrfToken, RedirectUrl, Scope, basic::BasicClient};
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	auth::{Token, UserInfo},
	error::{ConfigError, ResponseError, TokenParseError},
	http::{HttpClient, HttpRequest, HttpResponse, Method, header, parse_retry_after},
};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// How the client identifier and secret reach the token endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStyle {
	/// HTTP Basic `Authorization` header.
	#[default]
	Header,
	/// `client_id`/`client_secret` form parameters.
	Params,
}

/// One token endpoint call site: URL, client authentication, and expiry delta.
pub struct TokenEndpoint<'a> {
	/// Transport.
	pub http: &'a dyn HttpClient,
	/// Token endpoint URL.
	pub url: &'a Url,
	/// Client identifier; omitted from the request when empty.
	pub client_id: &'a str,
	/// Client secret, when the client is confidential.
	pub client_secret: Option<&'a str>,
	/// Client authentication placement.
	pub auth_style: AuthStyle,
	/// Safety margin subtracted from `expires_in`.
	pub expiry_delta: Duration,
}
impl TokenEndpoint<'_> {
	/// Posts `form` and parses the token response.
	///
	/// Non-2xx statuses surface as [`ResponseError`]; a response without an access token is
	/// rejected.
	pub async fn request(&self, form: Vec<(String, String)>) -> Result<Token> {
		let request = self.build_request(form)?;
		let response = self.http.execute(request).await?;

		check_status(&response)?;

		let token = parse_token_response(&response, self.expiry_delta)?;

		if token.access_token.is_empty() {
			return Err(TokenParseError::MissingAccessToken.into());
		}

		Ok(token)
	}

	fn build_request(&self, mut form: Vec<(String, String)>) -> Result<HttpRequest> {
		let mut builder = oauth2::http::Request::builder()
			.method(Method::POST)
			.uri(self.url.as_str())
			.header(header::CONTENT_TYPE, FORM_CONTENT_TYPE)
			.header(header::ACCEPT, "application/json");

		match self.auth_style {
			AuthStyle::Header if !self.client_id.is_empty() => {
				let credentials = format!(
					"{}:{}",
					form_urlencoded::byte_serialize(self.client_id.as_bytes()).collect::<String>(),
					form_urlencoded::byte_serialize(self.client_secret.unwrap_or_default().as_bytes())
						.collect::<String>()
				);

				builder =
					builder.header(header::AUTHORIZATION, format!("Basic {}", STANDARD.encode(credentials)));
			},
			AuthStyle::Params if !self.client_id.is_empty() => {
				form.push(("client_id".into(), self.client_id.into()));

				if let Some(secret) = self.client_secret {
					form.push(("client_secret".into(), secret.into()));
				}
			},
			_ => {},
		}

		let body = form_urlencoded::Serializer::new(String::new()).extend_pairs(form).finish();

		Ok(builder.body(body.into_bytes()).map_err(ConfigError::from)?)
	}
}
impl Debug for TokenEndpoint<'_> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenEndpoint")
			.field("url", &self.url.as_str())
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.field("auth_style", &self.auth_style)
			.finish()
	}
}

/// Parameters of an authorization-code redirect.
#[derive(Clone, Debug)]
pub struct AuthorizeRequest<'a> {
	/// Authorization endpoint.
	pub endpoint: &'a Url,
	/// Client identifier.
	pub client_id: &'a str,
	/// Where the authorization server sends the user back.
	pub redirect_uri: &'a Url,
	/// Opaque CSRF state echoed back on redirect.
	pub state: &'a str,
	/// Requested scopes.
	pub scopes: &'a [String],
	/// Additional query parameters, appended in order.
	pub extra_params: &'a [(&'static str, String)],
}
impl AuthorizeRequest<'_> {
	/// Renders the redirect URL; scope separators are encoded as `%20` rather than `+`.
	pub fn url(&self) -> Url {
		let client = BasicClient::new(ClientId::new(self.client_id.to_owned()))
			.set_auth_uri(AuthUrl::from_url(self.endpoint.clone()))
			.set_redirect_uri(RedirectUrl::from_url(self.redirect_uri.clone()));
		let state = self.state.to_owned();
		let mut request = client
			.authorize_url(move || CsrfToken::new(state))
			.add_scopes(self.scopes.iter().cloned().map(Scope::new));

		for (name, value) in self.extra_params {
			request = request.add_extra_param(*name, value.clone());
		}

		let (mut url, _) = request.url();

		encode_scope_spaces(&mut url);

		url
	}
}

/// Fetches the user's identity and accounts with `token`.
pub async fn fetch_user_info(http: &dyn HttpClient, url: &Url, token: &Token) -> Result<UserInfo> {
	let authorization = header::HeaderValue::from_str(&token.authorization_value())
		.map_err(|_| ConfigError::InvalidHeader { name: "authorization" })?;
	let request = oauth2::http::Request::builder()
		.method(Method::GET)
		.uri(url.as_str())
		.header(header::ACCEPT, "application/json")
		.header(header::AUTHORIZATION, authorization)
		.body(Vec::new())
		.map_err(ConfigError::from)?;
	let response = http.execute(request).await?;

	check_status(&response)?;

	let mut deserializer = serde_json::Deserializer::from_slice(response.body());

	serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| Error::UserInfoParse { source })
}

/// Maps a non-2xx response to [`ResponseError`].
pub(crate) fn check_status(response: &HttpResponse) -> Result<(), ResponseError> {
	let status = response.status();

	if status.is_success() {
		return Ok(());
	}

	Err(ResponseError::new(status.as_u16(), response.body().clone())
		.with_retry_after(parse_retry_after(response.headers())))
}

fn parse_token_response(response: &HttpResponse, expiry_delta: Duration) -> Result<Token> {
	let content_type = response
		.headers()
		.get(header::CONTENT_TYPE)
		.and_then(|value| value.to_str().ok())
		.unwrap_or_default();

	if content_type.starts_with(FORM_CONTENT_TYPE) || content_type.starts_with("text/plain") {
		let pairs = form_urlencoded::parse(response.body()).into_owned();

		return Ok(Token::from_form(pairs, expiry_delta)?);
	}

	let mut deserializer = serde_json::Deserializer::from_slice(response.body());
	let values: JsonMap<String, JsonValue> = serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| TokenParseError::Json { source })?;

	Ok(Token::from_map(values, expiry_delta)?)
}

fn encode_scope_spaces(url: &mut Url) {
	let Some(query) = url.query() else {
		return;
	};
	let rewritten = query
		.split('&')
		.map(|pair| match pair.strip_prefix("scope=") {
			Some(value) => format!("scope={}", value.replace('+', "%20")),
			None => pair.to_owned(),
		})
		.collect::<Vec<_>>()
		.join("&");

	url.set_query(Some(&rewritten));
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(value: &str) -> Url {
		Url::parse(value).expect("URL fixture should parse.")
	}

	#[test]
	fn authorize_url_encodes_scope_spaces_only() {
		let endpoint = url("https://account-d.docusign.com/oauth/auth");
		let redirect = url("https://app.example.com/callback");
		let scopes = ["signature".to_owned(), "extended".to_owned()];
		let extra = [("ui_locales", "en fr".to_owned())];
		let rendered = AuthorizeRequest {
			endpoint: &endpoint,
			client_id: "integration-key",
			redirect_uri: &redirect,
			state: "state-1",
			scopes: &scopes,
			extra_params: &extra,
		}
		.url();
		let query = rendered.query().expect("Authorize URL should carry a query.");

		assert!(query.contains("response_type=code"));
		assert!(query.contains("client_id=integration-key"));
		assert!(query.contains("state=state-1"));
		assert!(query.contains("scope=signature%20extended"));
		assert!(query.contains("ui_locales=en+fr"));
		assert!(query.contains("redirect_uri=https%3A%2F%2Fapp.example.com%2Fcallback"));
	}

	#[test]
	fn form_token_responses_are_supported() {
		let mut response = HttpResponse::new(
			b"access_token=abc&token_type=bearer&refresh_token=r1&expires_in=3600".to_vec(),
		);

		response.headers_mut().insert(
			header::CONTENT_TYPE,
			header::HeaderValue::from_static("application/x-www-form-urlencoded; charset=utf-8"),
		);

		let token =
			parse_token_response(&response, Duration::ZERO).expect("Form token should parse.");

		assert_eq!(token.access_token.expose(), "abc");
		assert_eq!(token.refresh_token.as_ref().map(|r| r.expose()), Some("r1"));
		assert!(token.expiry.is_some());
	}

	#[test]
	fn malformed_json_is_a_parse_error() {
		let response = HttpResponse::new(b"{\"access_token\":".to_vec());
		let err = parse_token_response(&response, Duration::ZERO)
			.expect_err("Truncated JSON should fail.");

		assert!(matches!(err, Error::TokenParse(TokenParseError::Json { .. })));
	}

	#[test]
	fn non_success_status_carries_body_and_retry_after() {
		let mut response = HttpResponse::new(b"{\"error\":\"invalid_grant\"}".to_vec());

		*response.status_mut() = oauth2::http::StatusCode::TOO_MANY_REQUESTS;
		response
			.headers_mut()
			.insert(header::RETRY_AFTER, header::HeaderValue::from_static("12"));

		let err = check_status(&response).expect_err("429 should be an error.");

		assert_eq!(err.status, 429);
		assert_eq!(err.retry_after, Some(Duration::seconds(12)));
		assert_eq!(err.oauth_error().as_deref(), Some("invalid_grant"));
	}
}
