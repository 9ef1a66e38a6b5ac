//! Two-legged JWT-bearer grant for service integrations.
//!
//! The integration signs a short-lived assertion naming the user it acts for and trades it
//! at the token endpoint for an access token. No refresh token is issued; refreshing means
//! signing a new assertion, which is exactly what [`JwtConfig`] does as a
//! [`Refresher`](crate::credential::Refresher).

// self
use crate::{
	_prelude::*,
	auth::{DEFAULT_EXPIRY_DELTA, ReuseTokenSource, Token, TokenFuture, TokenSource, UserInfo},
	credential::{Credential, RefreshFuture, Refresher},
	error::TokenParseError,
	flows::JWT_BEARER_GRANT_TYPE,
	http::HttpClient,
	jws::{ClaimSet, Signer},
	oauth::{AuthStyle, TokenEndpoint},
	obs::{self, FlowKind},
	provider::Environment,
	store::CredentialCache,
};

/// Post-processing applied to every token the grant returns.
pub type TokenHook = Arc<dyn Fn(Token) -> Result<Token> + Send + Sync>;

/// Scopes requested by [`JwtConfig::for_environment`].
pub const IMPERSONATION_SCOPES: [&str; 2] = ["signature", "impersonation"];

/// Tunables of the assertion and the token request.
#[derive(Clone)]
pub struct JwtOptions {
	/// How far `iat` is backdated to tolerate clock skew.
	pub issued_at_offset: Duration,
	/// Lifetime of the assertion (`exp - iat`).
	pub expires_in: Duration,
	/// Extra claims; `scope` is always set from the configured scopes.
	pub private_claims: JsonMap<String, JsonValue>,
	/// Extra token request form fields.
	pub form_values: Vec<(String, String)>,
	/// Applied to each returned token; an error fails the grant.
	pub token_hook: Option<TokenHook>,
	/// Safety margin subtracted from `expires_in` of returned tokens.
	pub expiry_delta: Duration,
}
impl Default for JwtOptions {
	fn default() -> Self {
		Self {
			issued_at_offset: Duration::seconds(10),
			expires_in: Duration::hours(1),
			private_claims: JsonMap::new(),
			form_values: Vec::new(),
			token_hook: None,
			expiry_delta: DEFAULT_EXPIRY_DELTA,
		}
	}
}
impl Debug for JwtOptions {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("JwtOptions")
			.field("issued_at_offset", &self.issued_at_offset)
			.field("expires_in", &self.expires_in)
			.field("private_claims", &self.private_claims)
			.field("form_values", &self.form_values)
			.field("token_hook_set", &self.token_hook.is_some())
			.field("expiry_delta", &self.expiry_delta)
			.finish()
	}
}

/// JWT-bearer grant configuration.
#[derive(Clone)]
pub struct JwtConfig {
	/// Signs assertions.
	pub signer: Arc<dyn Signer>,
	/// `iss`: the integration key.
	pub issuer: String,
	/// `sub`: the impersonated user's API username, if any.
	pub subject: Option<String>,
	/// Token endpoint.
	pub token_url: Url,
	/// `aud`: the authorization server host.
	pub audience: String,
	/// Requested scopes, sent space-joined in the `scope` claim.
	pub scopes: Vec<String>,
	/// Assertion and request tunables.
	pub options: JwtOptions,
	/// Account bound by [`JwtConfig::credential`]; empty selects the default account.
	pub account_id: String,
	/// User-info endpoint used by credentials built from this config.
	pub user_info_url: Url,
	/// Transport.
	pub http: Arc<dyn HttpClient>,
	/// Notified by credentials built from this config.
	pub cache: Option<Arc<dyn CredentialCache>>,
}
impl JwtConfig {
	/// Creates a configuration with default options and no scopes.
	pub fn new(
		signer: Arc<dyn Signer>,
		issuer: impl Into<String>,
		audience: impl Into<String>,
		token_url: Url,
		user_info_url: Url,
		http: Arc<dyn HttpClient>,
	) -> Self {
		Self {
			signer,
			issuer: issuer.into(),
			subject: None,
			token_url,
			audience: audience.into(),
			scopes: Vec::new(),
			options: JwtOptions::default(),
			account_id: String::new(),
			user_info_url,
			http,
			cache: None,
		}
	}

	/// Configuration for `env` with `signature impersonation` scopes.
	pub fn for_environment(
		env: Environment,
		integration_key: impl Into<String>,
		signer: Arc<dyn Signer>,
		http: Arc<dyn HttpClient>,
	) -> Result<Self> {
		let endpoints = env.endpoints()?;

		Ok(Self::new(
			signer,
			integration_key,
			env.auth_host(),
			endpoints.token,
			endpoints.user_info,
			http,
		)
		.with_scopes(IMPERSONATION_SCOPES))
	}

	/// Sets the impersonated user.
	pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
		self.subject = Some(subject.into());

		self
	}

	/// Replaces the requested scopes.
	pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.scopes = scopes.into_iter().map(Into::into).collect();

		self
	}

	/// Replaces the options.
	pub fn with_options(mut self, options: JwtOptions) -> Self {
		self.options = options;

		self
	}

	/// Installs a token hook.
	pub fn with_token_hook<F>(mut self, hook: F) -> Self
	where
		F: 'static + Send + Sync + Fn(Token) -> Result<Token>,
	{
		self.options.token_hook = Some(Arc::new(hook));

		self
	}

	/// Binds credentials built from this config to `account_id`.
	pub fn with_account_id(mut self, account_id: impl Into<String>) -> Self {
		self.account_id = account_id.into();

		self
	}

	/// Sets the cache notified by credentials built from this config.
	pub fn with_cache(mut self, cache: Arc<dyn CredentialCache>) -> Self {
		self.cache = Some(cache);

		self
	}

	/// Builds and signs a fresh assertion.
	pub fn assertion(&self) -> Result<String> {
		let mut claims = ClaimSet::new(&self.issuer, &self.audience);

		if let Some(subject) = &self.subject {
			claims = claims.with_subject(subject);
		}

		claims.private_claims = self.options.private_claims.clone();
		claims.private_claims.insert("scope".into(), self.scopes.join(" ").into());
		claims.set_expiration_claims(self.options.issued_at_offset, self.options.expires_in)?;

		Ok(claims.jwt(self.signer.as_ref())?)
	}

	/// Runs the grant once and returns the (hooked) token.
	pub async fn fetch_token(&self) -> Result<Token> {
		obs::observe(FlowKind::JwtBearer, "fetch_token", async move {
			let mut form = vec![
				("grant_type".to_owned(), JWT_BEARER_GRANT_TYPE.to_owned()),
				("assertion".to_owned(), self.assertion()?),
			];

			form.extend(self.options.form_values.iter().cloned());

			let token = TokenEndpoint {
				http: self.http.as_ref(),
				url: &self.token_url,
				client_id: "",
				client_secret: None,
				auth_style: AuthStyle::Params,
				expiry_delta: self.options.expiry_delta,
			}
			.request(form)
			.await?;

			match &self.options.token_hook {
				Some(hook) => hook(token),
				None => Ok(token),
			}
		})
		.await
	}

	/// Token source that reuses each granted token until it expires.
	pub fn token_source(&self) -> ReuseTokenSource<Self> {
		ReuseTokenSource::new(None, self.clone())
	}

	/// Credential impersonating `api_username`, optionally seeded with persisted state.
	pub fn credential(
		&self,
		api_username: impl Into<String>,
		token: Option<Token>,
		user_info: Option<UserInfo>,
	) -> Credential {
		let refresher = Arc::new(self.clone().with_subject(api_username));
		let mut credential = Credential::new(self.http.clone(), self.user_info_url.clone())
			.with_refresher(refresher)
			.bind_account(&self.account_id);

		if let Some(token) = token {
			credential = credential.with_token(token);
		}
		if let Some(user_info) = user_info {
			credential = credential.with_user_info(user_info);
		}
		if let Some(cache) = &self.cache {
			credential = credential.with_cache(cache.clone());
		}

		credential
	}
}
impl TokenSource for JwtConfig {
	fn token(&self) -> TokenFuture<'_> {
		Box::pin(async move { Ok(Arc::new(self.fetch_token().await?)) })
	}
}
impl Refresher for JwtConfig {
	fn refresh(&self, _current: Arc<Token>) -> RefreshFuture<'_> {
		Box::pin(self.fetch_token())
	}
}
impl Debug for JwtConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("JwtConfig")
			.field("issuer", &self.issuer)
			.field("subject", &self.subject)
			.field("token_url", &self.token_url.as_str())
			.field("audience", &self.audience)
			.field("scopes", &self.scopes)
			.field("options", &self.options)
			.field("account_id", &self.account_id)
			.finish()
	}
}

/// Token hook that uses the response's `id_token` as the access token.
///
/// The expiry becomes the ID token's `exp` when it carries one.
pub fn id_token_as_access_token(mut token: Token) -> Result<Token> {
	let id_token = id_token(&token)?;
	let claims = ClaimSet::decode(&id_token)?;

	if let Some(expiry) = claims.expiry() {
		token.expiry = Some(expiry);
	}

	token.access_token = id_token.into();

	Ok(token)
}

/// Token hook that takes the expiry from the response's `id_token`.
pub fn id_token_sets_expiry(mut token: Token) -> Result<Token> {
	let claims = ClaimSet::decode(&id_token(&token)?)?;

	token.expiry = claims.expiry();

	Ok(token)
}

fn id_token(token: &Token) -> Result<String, TokenParseError> {
	match token.extra("id_token") {
		Some(JsonValue::String(id_token)) if !id_token.is_empty() => Ok(id_token),
		_ => Err(TokenParseError::MissingField { field: "id_token" }),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		error::TransportError,
		http::{HttpFuture, HttpRequest},
		jws::{Algorithm, HmacSigner},
	};

	struct OfflineHttpClient;
	impl HttpClient for OfflineHttpClient {
		fn execute(&self, request: HttpRequest) -> HttpFuture<'_> {
			let target = request.uri().to_string();

			Box::pin(async move {
				Err(TransportError::network(
					target,
					std::io::Error::new(std::io::ErrorKind::NotConnected, "offline"),
				))
			})
		}
	}

	fn signer() -> HmacSigner {
		HmacSigner::new(Algorithm::Hs256, b"shared-secret".to_vec(), Some("kid-1"))
			.expect("HMAC signer should build.")
	}

	fn config() -> JwtConfig {
		JwtConfig::for_environment(
			Environment::Demo,
			"integration-key",
			Arc::new(signer()),
			Arc::new(OfflineHttpClient),
		)
		.expect("Demo environment config should build.")
	}

	fn token_with_id_token(id_token: &str) -> Token {
		let mut raw = JsonMap::new();

		raw.insert("access_token".into(), "opaque".into());
		raw.insert("id_token".into(), id_token.into());

		Token::new("opaque").with_extra(raw)
	}

	#[test]
	fn assertion_carries_identity_scope_and_lifetime() {
		let config = config()
			.with_subject("user-0001")
			.with_options(JwtOptions {
				private_claims: serde_json::json!({"scope": "ignored", "tenant": "t-1"})
					.as_object()
					.cloned()
					.unwrap_or_default(),
				..Default::default()
			});
		let assertion = config.assertion().expect("Assertion should sign.");
		let claims = ClaimSet::decode_verified(&assertion, &signer().verifier())
			.expect("Assertion should verify with the shared secret.");

		assert_eq!(claims.issuer, "integration-key");
		assert_eq!(claims.audience, "account-d.docusign.com");
		assert_eq!(claims.subject, "user-0001");
		assert_eq!(claims.expires_at - claims.issued_at, 3600);
		assert_eq!(claims.private_claims["scope"], "signature impersonation");
		assert_eq!(claims.private_claims["tenant"], "t-1");
	}

	#[test]
	fn non_positive_lifetime_fails_before_signing() {
		let config = config().with_options(JwtOptions {
			expires_in: Duration::ZERO,
			..Default::default()
		});
		let err = config.assertion().expect_err("Zero lifetime should be rejected.");

		assert!(matches!(err, Error::Signature(crate::jws::JwsError::InvalidExpiration)));
	}

	#[test]
	fn id_token_hooks_rewrite_token() {
		let mut claims = ClaimSet::new("issuer", "audience");

		claims.expires_at = 4_102_444_800;

		let id_token = claims.jwt(&signer()).expect("ID token should sign.");
		let rewritten = id_token_as_access_token(token_with_id_token(&id_token))
			.expect("Hook should accept a token with an id_token.");

		assert_eq!(rewritten.access_token.expose(), id_token);
		assert_eq!(rewritten.expiry.map(OffsetDateTime::unix_timestamp), Some(4_102_444_800));

		let expiring = id_token_sets_expiry(token_with_id_token(&id_token))
			.expect("Hook should accept a token with an id_token.");

		assert_eq!(expiring.access_token.expose(), "opaque");
		assert_eq!(expiring.expiry.map(OffsetDateTime::unix_timestamp), Some(4_102_444_800));

		let err = id_token_sets_expiry(Token::new("opaque"))
			.expect_err("Hook should reject a token without an id_token.");

		assert!(matches!(
			err,
			Error::TokenParse(TokenParseError::MissingField { field: "id_token" })
		));
	}

	#[test]
	fn credential_binds_configured_account() {
		let credential = config().with_account_id("acct-other").credential(
			"user-0001",
			Some(Token::new("seeded")),
			None,
		);

		assert_eq!(credential.account_id(), "acct-other");
		assert_eq!(
			credential.cached_token().map(|token| token.access_token.expose().to_owned()),
			Some("seeded".to_owned())
		);
	}
}
