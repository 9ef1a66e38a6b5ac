//! Three-legged authorization-code grant and its refresh grant.
//!
//! The application redirects the user to [`AuthorizationCodeConfig::auth_url`], receives the
//! code on its redirect URI, and trades it with [`AuthorizationCodeConfig::exchange`] for a
//! [`Credential`] that refreshes itself through this config.

// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::{
	_prelude::*,
	auth::{DEFAULT_EXPIRY_DELTA, Token, TokenSecret, UserInfo},
	credential::{Credential, RefreshFuture, Refresher},
	error::ConfigError,
	http::HttpClient,
	oauth::{self, AuthStyle, AuthorizeRequest, TokenEndpoint},
	obs::{self, FlowKind, FlowSpan},
	provider::{Endpoints, Environment},
	store::CredentialCache,
};

/// Length of the values produced by [`generate_state`].
pub const STATE_LEN: usize = 32;

const DEFAULT_SCOPE: &str = "signature";
const EXTENDED_SCOPE: &str = "extended";

/// Authorization-code client configuration.
#[derive(Clone)]
pub struct AuthorizationCodeConfig {
	/// Integration key.
	pub client_id: String,
	/// Secret key; `None` for public clients.
	pub client_secret: Option<String>,
	/// Registered redirect URI.
	pub redirect_uri: Url,
	/// Authorization-server endpoints.
	pub endpoints: Endpoints,
	/// Client authentication placement on token requests.
	pub auth_style: AuthStyle,
	/// Requests the `extended` scope so refresh tokens outlive the default window.
	pub extended_lifetime: bool,
	/// Forces the login page even when the user has a session.
	pub prompt_login: bool,
	/// Preferred UI locales, most preferred first.
	pub ui_locales: Vec<String>,
	/// Safety margin subtracted from `expires_in`.
	pub expiry_delta: Duration,
	/// Account bound by credentials built from this config; empty selects the default.
	pub account_id: String,
	/// Notified after exchanges and by credentials built from this config.
	pub cache: Option<Arc<dyn CredentialCache>>,
	/// Transport.
	pub http: Arc<dyn HttpClient>,
}
impl AuthorizationCodeConfig {
	/// Creates a public client configuration.
	pub fn new(
		client_id: impl Into<String>,
		redirect_uri: Url,
		endpoints: Endpoints,
		http: Arc<dyn HttpClient>,
	) -> Self {
		Self {
			client_id: client_id.into(),
			client_secret: None,
			redirect_uri,
			endpoints,
			auth_style: AuthStyle::default(),
			extended_lifetime: false,
			prompt_login: false,
			ui_locales: Vec::new(),
			expiry_delta: DEFAULT_EXPIRY_DELTA,
			account_id: String::new(),
			cache: None,
			http,
		}
	}

	/// Configuration against `env`'s authorization server.
	pub fn for_environment(
		env: Environment,
		client_id: impl Into<String>,
		redirect_uri: Url,
		http: Arc<dyn HttpClient>,
	) -> Result<Self> {
		Ok(Self::new(client_id, redirect_uri, env.endpoints()?, http))
	}

	/// Sets the client secret.
	pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(secret.into());

		self
	}

	/// Selects how client credentials reach the token endpoint.
	pub fn with_auth_style(mut self, auth_style: AuthStyle) -> Self {
		self.auth_style = auth_style;

		self
	}

	/// Toggles the `extended` scope.
	pub fn with_extended_lifetime(mut self, extended_lifetime: bool) -> Self {
		self.extended_lifetime = extended_lifetime;

		self
	}

	/// Toggles `prompt=login`.
	pub fn with_prompt_login(mut self, prompt_login: bool) -> Self {
		self.prompt_login = prompt_login;

		self
	}

	/// Sets the preferred UI locales.
	pub fn with_ui_locales<I, S>(mut self, locales: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.ui_locales = locales.into_iter().map(Into::into).collect();

		self
	}

	/// Overrides the expiry delta.
	pub fn with_expiry_delta(mut self, expiry_delta: Duration) -> Self {
		self.expiry_delta = expiry_delta;

		self
	}

	/// Binds credentials built from this config to `account_id`.
	pub fn with_account_id(mut self, account_id: impl Into<String>) -> Self {
		self.account_id = account_id.into();

		self
	}

	/// Sets the cache notified with every new token and user info.
	pub fn with_cache(mut self, cache: Arc<dyn CredentialCache>) -> Self {
		self.cache = Some(cache);

		self
	}

	/// URL the user is sent to for consent.
	///
	/// `scopes` defaults to `signature`; `extended` is appended when the extended lifetime is
	/// enabled.
	pub fn auth_url(&self, state: &str, scopes: &[&str]) -> Url {
		let _span = FlowSpan::new(FlowKind::AuthorizationCode, "auth_url").entered();
		let mut scopes = scopes.iter().map(|scope| (*scope).to_owned()).collect::<Vec<_>>();

		if scopes.is_empty() {
			scopes.push(DEFAULT_SCOPE.into());
		}
		if self.extended_lifetime {
			scopes.push(EXTENDED_SCOPE.into());
		}

		let mut extra_params = Vec::new();

		if self.prompt_login {
			extra_params.push(("prompt", "login".to_owned()));
		}
		if !self.ui_locales.is_empty() {
			extra_params.push(("ui_locales", self.ui_locales.join(" ")));
		}

		AuthorizeRequest {
			endpoint: &self.endpoints.authorization,
			client_id: &self.client_id,
			redirect_uri: &self.redirect_uri,
			state,
			scopes: &scopes,
			extra_params: &extra_params,
		}
		.url()
	}

	/// Trades an authorization code for a credential.
	///
	/// The new token is used once to fetch the user's info; the cache, if any, is notified
	/// with both before the credential is returned.
	pub async fn exchange(&self, code: &str) -> Result<Credential> {
		obs::observe(FlowKind::AuthorizationCode, "exchange", async move {
			let token = self
				.token_endpoint()
				.request(vec![
					("grant_type".into(), "authorization_code".into()),
					("code".into(), code.into()),
					("redirect_uri".into(), self.redirect_uri.to_string()),
				])
				.await?;
			let user_info = obs::observe(
				FlowKind::UserInfo,
				"exchange",
				oauth::fetch_user_info(self.http.as_ref(), &self.endpoints.user_info, &token),
			)
			.await?;
			let token = Arc::new(token);
			let user_info = Arc::new(user_info);
			let credential = self.bind_credential(token.clone(), Some(user_info.clone()));

			credential.notify_cache(&token, &user_info).await;

			Ok(credential)
		})
		.await
	}

	/// Runs the refresh grant for `token`.
	///
	/// Fails with [`ConfigError::MissingRefreshToken`] without a network call when `token` has
	/// no refresh token. A response without a refresh token keeps the previous one.
	pub async fn refresh(&self, token: &Token) -> Result<Token> {
		obs::observe(FlowKind::Refresh, "refresh", async move {
			let refresh_token = token
				.refresh_token
				.as_ref()
				.filter(|secret| !secret.is_empty())
				.ok_or(ConfigError::MissingRefreshToken)?;
			let mut fresh = self
				.token_endpoint()
				.request(vec![
					("grant_type".into(), "refresh_token".into()),
					("refresh_token".into(), refresh_token.expose().into()),
				])
				.await?;

			if fresh.refresh_token.as_ref().is_none_or(TokenSecret::is_empty) {
				fresh.refresh_token = Some(refresh_token.clone());
			}

			Ok(fresh)
		})
		.await
	}

	/// Credential rebuilt from a persisted token and, optionally, user info.
	pub fn credential(&self, token: Token, user_info: Option<UserInfo>) -> Credential {
		self.bind_credential(Arc::new(token), user_info.map(Arc::new))
	}

	fn bind_credential(&self, token: Arc<Token>, user_info: Option<Arc<UserInfo>>) -> Credential {
		let mut credential = Credential::new(self.http.clone(), self.endpoints.user_info.clone())
			.with_refresher(Arc::new(self.clone()))
			.with_token(token)
			.bind_account(&self.account_id);

		if let Some(user_info) = user_info {
			credential = credential.with_user_info(user_info);
		}
		if let Some(cache) = &self.cache {
			credential = credential.with_cache(cache.clone());
		}

		credential
	}

	fn token_endpoint(&self) -> TokenEndpoint<'_> {
		TokenEndpoint {
			http: self.http.as_ref(),
			url: &self.endpoints.token,
			client_id: &self.client_id,
			client_secret: self.client_secret.as_deref(),
			auth_style: self.auth_style,
			expiry_delta: self.expiry_delta,
		}
	}
}
impl Refresher for AuthorizationCodeConfig {
	fn refresh(&self, current: Arc<Token>) -> RefreshFuture<'_> {
		Box::pin(async move { AuthorizationCodeConfig::refresh(self, &current).await })
	}
}
impl Debug for AuthorizationCodeConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizationCodeConfig")
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.field("redirect_uri", &self.redirect_uri.as_str())
			.field("endpoints", &self.endpoints)
			.field("auth_style", &self.auth_style)
			.field("extended_lifetime", &self.extended_lifetime)
			.field("prompt_login", &self.prompt_login)
			.field("ui_locales", &self.ui_locales)
			.field("account_id", &self.account_id)
			.finish()
	}
}

/// Random alphanumeric `state` value for [`AuthorizationCodeConfig::auth_url`].
pub fn generate_state() -> String {
	rand::rng().sample_iter(Alphanumeric).take(STATE_LEN).map(char::from).collect()
}

/// Checks the `state` echoed back on redirect against the one that was sent.
pub fn validate_state(sent: &str, returned: &str) -> Result<(), ConfigError> {
	if !sent.is_empty() && sent == returned { Ok(()) } else { Err(ConfigError::StateMismatch) }
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		error::TransportError,
		http::{HttpFuture, HttpRequest},
	};

	struct CountingHttpClient(Mutex<usize>);
	impl HttpClient for CountingHttpClient {
		fn execute(&self, request: HttpRequest) -> HttpFuture<'_> {
			*self.0.lock() += 1;

			let target = request.uri().to_string();

			Box::pin(async move {
				Err(TransportError::network(
					target,
					std::io::Error::new(std::io::ErrorKind::NotConnected, "offline"),
				))
			})
		}
	}

	fn config(http: Arc<dyn HttpClient>) -> AuthorizationCodeConfig {
		AuthorizationCodeConfig::for_environment(
			Environment::Demo,
			"integration-key",
			Url::parse("https://app.example.com/callback").expect("Redirect URI should parse."),
			http,
		)
		.expect("Demo environment config should build.")
	}

	#[test]
	fn auth_url_defaults_to_signature_scope() {
		let url = config(Arc::new(CountingHttpClient(Mutex::new(0)))).auth_url("state-1", &[]);

		assert_eq!(url.host_str(), Some("account-d.docusign.com"));
		assert_eq!(url.path(), "/oauth/auth");

		let query = url.query().expect("Authorize URL should carry a query.");

		assert!(query.contains("scope=signature"));
		assert!(!query.contains("prompt="));
		assert!(!query.contains("ui_locales="));
	}

	#[test]
	fn auth_url_appends_extended_scope_and_prompts() {
		let url = config(Arc::new(CountingHttpClient(Mutex::new(0))))
			.with_extended_lifetime(true)
			.with_prompt_login(true)
			.with_ui_locales(["en", "fr"])
			.auth_url("state-1", &["signature", "impersonation"]);
		let query = url.query().expect("Authorize URL should carry a query.");

		assert!(query.contains("scope=signature%20impersonation%20extended"));
		assert!(query.contains("prompt=login"));
		assert!(query.contains("ui_locales=en+fr"));
	}

	#[tokio::test]
	async fn refresh_without_refresh_token_skips_network() {
		let http = Arc::new(CountingHttpClient(Mutex::new(0)));
		let err = config(http.clone())
			.refresh(&Token::new("expired"))
			.await
			.expect_err("Refresh without a refresh token should fail.");

		assert!(matches!(err, Error::Config(ConfigError::MissingRefreshToken)));
		assert_eq!(*http.0.lock(), 0);
	}

	#[test]
	fn generated_states_are_random_and_validated() {
		let first = generate_state();
		let second = generate_state();

		assert_eq!(first.len(), STATE_LEN);
		assert!(first.chars().all(|c| c.is_ascii_alphanumeric()));
		assert_ne!(first, second);
		assert!(validate_state(&first, &first).is_ok());
		assert!(matches!(validate_state(&first, &second), Err(ConfigError::StateMismatch)));
		assert!(validate_state("", "").is_err());
	}
}
