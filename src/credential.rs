//! Account-bound credentials that refresh lazily and authorize API calls.
//!
//! A [`Credential`] owns the token, the user's info, and the resolved account routing. Each
//! [`Credential::token`] call runs the whole validate → refresh → fetch user info → resolve
//! account → notify cache sequence under one async lock, so concurrent callers trigger at
//! most one refresh. State is committed only when the sequence succeeds.
//!
//! [`AuthorizedClient`] is the seam decorators such as
//! [`RateLimited`](crate::ext::RateLimited) wrap.

mod metrics;

pub use metrics::CredentialMetrics;

// self
use crate::{
	_prelude::*,
	auth::{Token, UserInfo},
	error::ConfigError,
	ext::ReportSlot,
	http::{HeaderMap, HeaderName, HeaderValue, HttpClient, HttpResponse, Method, header},
	oauth,
	obs::{self, FlowKind, FlowSpan},
	provider::ApiVersion,
	store::CredentialCache,
};

/// Boxed future returned by [`Refresher::refresh`].
pub type RefreshFuture<'a> = Pin<Box<dyn Future<Output = Result<Token>> + 'a + Send>>;

/// Boxed future returned by [`AuthorizedClient::auth_do`].
pub type CallFuture<'a> = Pin<Box<dyn Future<Output = Result<HttpResponse>> + 'a + Send>>;

/// Obtains a replacement for an invalid or expired token.
///
/// Closures `Fn(Arc<Token>) -> impl Future<Output = Result<Token>>` are refreshers too.
pub trait Refresher
where
	Self: Send + Sync,
{
	/// Returns a new token; `current` is the token being replaced (empty when none was held).
	fn refresh(&self, current: Arc<Token>) -> RefreshFuture<'_>;
}
impl<F, Fut> Refresher for F
where
	F: Send + Sync + Fn(Arc<Token>) -> Fut,
	Fut: 'static + Send + Future<Output = Result<Token>>,
{
	fn refresh(&self, current: Arc<Token>) -> RefreshFuture<'_> {
		Box::pin(self(current))
	}
}

/// Executes API requests with authorization applied.
pub trait AuthorizedClient
where
	Self: Send + Sync,
{
	/// Sends `request` to `api` and returns the successful response.
	fn auth_do<'a>(
		&'a self,
		options: &'a CallOptions,
		request: &'a ApiRequest,
		api: &'a dyn ApiVersion,
	) -> CallFuture<'a>;
}
impl<T> AuthorizedClient for Arc<T>
where
	T: ?Sized + AuthorizedClient,
{
	fn auth_do<'a>(
		&'a self,
		options: &'a CallOptions,
		request: &'a ApiRequest,
		api: &'a dyn ApiVersion,
	) -> CallFuture<'a> {
		(**self).auth_do(options, request, api)
	}
}

/// Per-call options threaded through the decorator chain.
#[derive(Clone, Debug, Default)]
pub struct CallOptions {
	/// Receives the rate-limit report of the call, when set.
	pub report_slot: Option<ReportSlot>,
}
impl CallOptions {
	/// Asks rate-limit decorators to write their report into `slot`.
	pub fn with_report_slot(mut self, slot: ReportSlot) -> Self {
		self.report_slot = Some(slot);

		self
	}
}

/// API request described relative to an account.
///
/// The credential never mutates it; each call builds a fresh outgoing request.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Relative API path (`envelopes`), rooted path (`/restapi/v2.1/...`), or absolute URL.
	pub path: String,
	/// Query parameters appended to the resolved URL.
	pub query: Vec<(String, String)>,
	/// Headers copied onto the outgoing request.
	pub headers: HeaderMap,
	/// Request body.
	pub body: Vec<u8>,
}
impl ApiRequest {
	/// Creates a body-less request.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self {
			method,
			path: path.into(),
			query: Vec::new(),
			headers: HeaderMap::new(),
			body: Vec::new(),
		}
	}

	/// Appends a query parameter.
	pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.push((name.into(), value.into()));

		self
	}

	/// Sets a header, replacing any previous value.
	pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Sets a raw body and its content type.
	pub fn with_body(mut self, content_type: HeaderValue, body: impl Into<Vec<u8>>) -> Self {
		self.headers.insert(header::CONTENT_TYPE, content_type);
		self.body = body.into();

		self
	}

	/// Serializes `value` as the JSON body.
	pub fn with_json<T>(self, value: &T) -> Result<Self>
	where
		T: ?Sized + Serialize,
	{
		let body =
			serde_json::to_vec(value).map_err(|source| ConfigError::RequestBody { source })?;

		Ok(self.with_body(HeaderValue::from_static("application/json"), body))
	}
}

#[derive(Clone, Default)]
struct CredentialState {
	account_id: String,
	base_uri: Option<Url>,
	token: Option<Arc<Token>>,
	user_info: Option<Arc<UserInfo>>,
}

struct Binding {
	token: Arc<Token>,
	account_id: String,
	base_uri: Url,
}

/// Token, user info, and account routing for one user and account.
pub struct Credential {
	state: Mutex<CredentialState>,
	guard: AsyncMutex<()>,
	refresher: Option<Arc<dyn Refresher>>,
	cache: Option<Arc<dyn CredentialCache>>,
	http: Arc<dyn HttpClient>,
	user_info_url: Url,
	metrics: Arc<CredentialMetrics>,
}
impl Credential {
	/// Creates a credential without a token; attach a token or refresher before use.
	pub fn new(http: Arc<dyn HttpClient>, user_info_url: Url) -> Self {
		Self {
			state: Default::default(),
			guard: AsyncMutex::new(()),
			refresher: None,
			cache: None,
			http,
			user_info_url,
			metrics: Default::default(),
		}
	}

	/// Seeds the token.
	pub fn with_token(mut self, token: impl Into<Arc<Token>>) -> Self {
		self.state.get_mut().token = Some(token.into());

		self
	}

	/// Seeds the user info, skipping the first user-info request.
	pub fn with_user_info(mut self, user_info: impl Into<Arc<UserInfo>>) -> Self {
		self.state.get_mut().user_info = Some(user_info.into());

		self
	}

	/// Sets the refresher invoked when the token is missing, invalid, or expired.
	pub fn with_refresher(mut self, refresher: Arc<dyn Refresher>) -> Self {
		self.refresher = Some(refresher);

		self
	}

	/// Sets the cache notified after every refresh or user-info fetch.
	pub fn with_cache(mut self, cache: Arc<dyn CredentialCache>) -> Self {
		self.cache = Some(cache);

		self
	}

	/// Binds this credential to `account_id`; empty selects the default account.
	pub(crate) fn bind_account(mut self, account_id: impl Into<String>) -> Self {
		self.state.get_mut().account_id = account_id.into();

		self
	}

	/// Returns an independent credential bound to `account_id`.
	///
	/// The copy shares the refresher, cache, transport, metrics, token, and user info, has no
	/// base URI (so the account is resolved again on first use), and has its own lock.
	pub fn with_account_id(&self, account_id: impl Into<String>) -> Self {
		let state = self.state.lock().clone();

		Self {
			state: Mutex::new(CredentialState {
				account_id: account_id.into(),
				base_uri: None,
				token: state.token,
				user_info: state.user_info,
			}),
			guard: AsyncMutex::new(()),
			refresher: self.refresher.clone(),
			cache: self.cache.clone(),
			http: self.http.clone(),
			user_info_url: self.user_info_url.clone(),
			metrics: self.metrics.clone(),
		}
	}

	/// Bound account; empty until the default account has been resolved.
	pub fn account_id(&self) -> String {
		self.state.lock().account_id.clone()
	}

	/// Resolved base URI of the bound account.
	pub fn base_uri(&self) -> Option<Url> {
		self.state.lock().base_uri.clone()
	}

	/// Token currently held, without validating or refreshing it.
	pub fn cached_token(&self) -> Option<Arc<Token>> {
		self.state.lock().token.clone()
	}

	/// User info currently held.
	pub fn user_info(&self) -> Option<Arc<UserInfo>> {
		self.state.lock().user_info.clone()
	}

	/// Counters shared with every copy made by [`Credential::with_account_id`].
	pub fn metrics(&self) -> &CredentialMetrics {
		&self.metrics
	}

	/// Returns a valid token, refreshing it and resolving the account first when needed.
	pub async fn token(&self) -> Result<Arc<Token>> {
		Ok(self.bind().await?.token)
	}

	/// Authorizes `request`, routes it to the bound account, and executes it.
	///
	/// Non-2xx responses become [`Error::Response`].
	pub async fn auth_do(
		&self,
		_options: &CallOptions,
		request: &ApiRequest,
		api: &dyn ApiVersion,
	) -> Result<HttpResponse> {
		let span = FlowSpan::new(FlowKind::AuthorizedCall, "auth_do");

		obs::observe_span(FlowKind::AuthorizedCall, span.clone(), async move {
			let binding = self.bind().await?;

			span.record_account(&binding.account_id);

			let mut url = api.resolve(&binding.base_uri, &binding.account_id, &request.path)?;

			if !request.query.is_empty() {
				url.query_pairs_mut().extend_pairs(&request.query);
			}

			let authorization = HeaderValue::from_str(&binding.token.authorization_value())
				.map_err(|_| ConfigError::InvalidHeader { name: "authorization" })?;
			let mut outgoing = oauth2::http::Request::builder()
				.method(request.method.clone())
				.uri(url.as_str())
				.body(request.body.clone())
				.map_err(ConfigError::from)?;

			*outgoing.headers_mut() = request.headers.clone();
			outgoing.headers_mut().insert(header::AUTHORIZATION, authorization);

			let response = self.http.execute(outgoing).await?;

			span.record_status(response.status().as_u16());
			oauth::check_status(&response)?;

			Ok(response)
		})
		.await
	}

	async fn bind(&self) -> Result<Binding> {
		let _serialized = self.guard.lock().await;
		let result = self.bind_locked().await;

		if result.is_err() {
			self.metrics.record_failure();
		}

		result
	}

	async fn bind_locked(&self) -> Result<Binding> {
		let mut next = self.state.lock().clone();
		let mut dirty = false;
		let token = match next.token.clone().filter(|token| token.is_valid()) {
			Some(token) => token,
			None => {
				let refresher = self.refresher.as_ref().ok_or(ConfigError::MissingRefresher)?;
				let current = next.token.clone().unwrap_or_default();

				self.metrics.record_refresh();

				let fresh =
					obs::observe(FlowKind::Refresh, "credential", refresher.refresh(current)).await?;

				dirty = true;

				Arc::new(fresh)
			},
		};

		next.token = Some(token.clone());

		let user_info = match next.user_info.clone() {
			Some(user_info) => user_info,
			None => {
				self.metrics.record_user_info_fetch();

				let fetched = obs::observe(
					FlowKind::UserInfo,
					"credential",
					oauth::fetch_user_info(self.http.as_ref(), &self.user_info_url, &token),
				)
				.await?;

				dirty = true;

				Arc::new(fetched)
			},
		};

		next.user_info = Some(user_info.clone());

		let base_uri = match next.base_uri.clone().filter(|_| !next.account_id.is_empty()) {
			Some(base_uri) => base_uri,
			None => {
				let account = user_info.resolve_account(&next.account_id)?;
				let base_uri = Url::parse(&account.base_uri)
					.map_err(|e| ConfigError::invalid_url(&account.base_uri, e))?;

				next.account_id = account.account_id.clone();
				next.base_uri = Some(base_uri.clone());

				base_uri
			},
		};

		if dirty {
			self.notify_cache(&token, &user_info).await;
		}

		let account_id = next.account_id.clone();

		*self.state.lock() = next;

		Ok(Binding { token, account_id, base_uri })
	}

	pub(crate) async fn notify_cache(&self, token: &Token, user_info: &UserInfo) {
		let Some(cache) = &self.cache else {
			return;
		};

		match cache.store(token, user_info).await {
			Ok(()) => self.metrics.record_cache_notification(),
			Err(e) => {
				self.metrics.record_cache_failure();

				#[cfg(feature = "tracing")]
				tracing::warn!(error = %e, "Credential cache notification failed.");
				#[cfg(not(feature = "tracing"))]
				let _ = e;
			},
		}
	}
}
impl AuthorizedClient for Credential {
	fn auth_do<'a>(
		&'a self,
		options: &'a CallOptions,
		request: &'a ApiRequest,
		api: &'a dyn ApiVersion,
	) -> CallFuture<'a> {
		Box::pin(Credential::auth_do(self, options, request, api))
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.state.lock();

		f.debug_struct("Credential")
			.field("account_id", &state.account_id)
			.field("base_uri", &state.base_uri.as_ref().map(Url::as_str))
			.field("token", &state.token)
			.field("user_info_set", &state.user_info.is_some())
			.field("refresher_set", &self.refresher.is_some())
			.field("cache_set", &self.cache.is_some())
			.finish()
	}
}
