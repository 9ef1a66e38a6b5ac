//! Transport primitives shared by token exchanges, user-info lookups, and API calls.
//!
//! The crate's only dependency on an HTTP stack is [`HttpClient`]. Callers provide an
//! implementation (typically behind `Arc<T>`) and every network operation in the crate,
//! from JWT-bearer grants to authorized API calls, funnels through
//! [`HttpClient::execute`]. Non-success statuses are returned as ordinary responses; the
//! callers decide how to classify them.

pub use oauth2::{
	HttpRequest, HttpResponse,
	http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header},
};

// crates.io
use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, error::TransportError};

/// Boxed future returned by [`HttpClient::execute`].
pub type HttpFuture<'a> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP transports.
///
/// Implementations must be `Send + Sync + 'static` so they can be shared across configs and
/// credentials behind an `Arc`. Cancellation is future drop: implementations must not spawn
/// work that outlives the returned future, and the crate adds no timeouts of its own.
pub trait HttpClient
where
	Self: 'static + Send + Sync,
{
	/// Executes `request` and returns the full response, whatever its status.
	fn execute(&self, request: HttpRequest) -> HttpFuture<'_>;
}
impl<T> HttpClient for Arc<T>
where
	T: ?Sized + HttpClient,
{
	fn execute(&self, request: HttpRequest) -> HttpFuture<'_> {
		(**self).execute(request)
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
/// Token requests should not follow redirects, matching OAuth 2.0 guidance that token
/// endpoints return results directly instead of delegating to another URI.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpClient for ReqwestHttpClient {
	fn execute(&self, request: HttpRequest) -> HttpFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let target = request_target(&request);
			let request = reqwest::Request::try_from(request)
				.map_err(|e| TransportError::network(target.clone(), e))?;
			let response =
				client.execute(request).await.map_err(|e| TransportError::network(&target, e))?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body =
				response.bytes().await.map_err(|e| TransportError::network(&target, e))?.to_vec();
			let mut response_new = HttpResponse::new(body);

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}

/// Scheme, authority, and path of a request, without the query string.
pub(crate) fn request_target(request: &HttpRequest) -> String {
	let uri = request.uri();

	format!(
		"{}://{}{}",
		uri.scheme_str().unwrap_or("https"),
		uri.authority().map(|a| a.as_str()).unwrap_or_default(),
		uri.path()
	)
}

/// Parses a `Retry-After` header expressed either in seconds or as an HTTP date.
pub(crate) fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(header::RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(secs as i64));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn retry_after_accepts_seconds() {
		let mut headers = HeaderMap::new();

		headers.insert(header::RETRY_AFTER, HeaderValue::from_static("30"));

		assert_eq!(parse_retry_after(&headers), Some(Duration::seconds(30)));
	}

	#[test]
	fn retry_after_ignores_garbage_and_past_dates() {
		let mut headers = HeaderMap::new();

		assert_eq!(parse_retry_after(&headers), None);

		headers.insert(header::RETRY_AFTER, HeaderValue::from_static("soon"));

		assert_eq!(parse_retry_after(&headers), None);

		headers.insert(
			header::RETRY_AFTER,
			HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 +0000"),
		);

		assert_eq!(parse_retry_after(&headers), None);
	}

	#[test]
	fn request_target_drops_query() {
		let request = oauth2::http::Request::builder()
			.uri("https://demo.example.net/restapi/v2.1/accounts/1/envelopes?from_date=2024")
			.body(Vec::new())
			.expect("Request fixture should build.");

		assert_eq!(
			request_target(&request),
			"https://demo.example.net/restapi/v2.1/accounts/1/envelopes"
		);
	}
}
