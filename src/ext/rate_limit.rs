//! Rate-limit telemetry read from API response headers.
//!
//! [`RateLimited`] wraps any [`AuthorizedClient`]. After each successful call it parses the
//! `X-RateLimit-*` and `X-BurstLimit-*` headers into a [`Report`], writes it into the call's
//! [`ReportSlot`] when one was supplied, and hands it to the optional [`ReportHandler`].

// self
use crate::{
	_prelude::*,
	credential::{ApiRequest, AuthorizedClient, CallFuture, CallOptions},
	error::BoxError,
	http::{HeaderMap, HttpResponse},
	provider::ApiVersion,
};

const RATE_LIMIT: &str = "x-ratelimit-limit";
const RATE_REMAINING: &str = "x-ratelimit-remaining";
const RATE_RESET: &str = "x-ratelimit-reset";
const BURST_LIMIT: &str = "x-burstlimit-limit";
const BURST_REMAINING: &str = "x-burstlimit-remaining";

/// Rate-limit budget reported by one response; missing or unparsable headers read as zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Report {
	/// Calls allowed per window.
	pub rate_limit: u64,
	/// Calls left in the current window.
	pub rate_remaining: u64,
	/// Window reset, seconds since the Unix epoch.
	pub reset_epoch: i64,
	/// Calls allowed per burst window.
	pub burst_limit: u64,
	/// Calls left in the current burst window.
	pub burst_remaining: u64,
}
impl Report {
	/// Reads the rate-limit headers.
	pub fn from_headers(headers: &HeaderMap) -> Self {
		Self {
			rate_limit: header_number(headers, RATE_LIMIT),
			rate_remaining: header_number(headers, RATE_REMAINING),
			reset_epoch: header_number(headers, RATE_RESET),
			burst_limit: header_number(headers, BURST_LIMIT),
			burst_remaining: header_number(headers, BURST_REMAINING),
		}
	}

	/// Window reset instant, when reported.
	pub fn reset(&self) -> Option<OffsetDateTime> {
		if self.reset_epoch == 0 {
			return None;
		}

		OffsetDateTime::from_unix_timestamp(self.reset_epoch).ok()
	}

	/// Returns `true` when the response carried no rate-limit information.
	pub fn is_empty(&self) -> bool {
		*self == Self::default()
	}
}

/// Shared write-back cell receiving the [`Report`] of a call.
#[derive(Clone, Debug, Default)]
pub struct ReportSlot(Arc<Mutex<Option<Report>>>);
impl ReportSlot {
	/// Latest report written into the slot.
	pub fn get(&self) -> Option<Report> {
		*self.0.lock()
	}

	/// Removes and returns the latest report.
	pub fn take(&self) -> Option<Report> {
		self.0.lock().take()
	}

	pub(crate) fn set(&self, report: Report) {
		*self.0.lock() = Some(report);
	}
}

/// Observes every report; an error discards the response and fails the call.
///
/// Closures `Fn(&Report, &HttpResponse) -> Result<(), BoxError>` are handlers too.
pub trait ReportHandler
where
	Self: Send + Sync,
{
	/// Inspects the report of a successful response.
	fn handle(&self, report: &Report, response: &HttpResponse) -> Result<(), BoxError>;
}
impl<F> ReportHandler for F
where
	F: Send + Sync + Fn(&Report, &HttpResponse) -> Result<(), BoxError>,
{
	fn handle(&self, report: &Report, response: &HttpResponse) -> Result<(), BoxError> {
		self(report, response)
	}
}

/// [`AuthorizedClient`] decorator that reports rate-limit headers.
pub struct RateLimited<C> {
	inner: C,
	handler: Option<Arc<dyn ReportHandler>>,
}
impl<C> RateLimited<C>
where
	C: AuthorizedClient,
{
	/// Wraps `inner` without a handler; reports only reach [`ReportSlot`]s.
	pub fn new(inner: C) -> Self {
		Self { inner, handler: None }
	}

	/// Sets the handler called with every report.
	pub fn with_handler(mut self, handler: Arc<dyn ReportHandler>) -> Self {
		self.handler = Some(handler);

		self
	}

	/// Wrapped client.
	pub fn inner(&self) -> &C {
		&self.inner
	}
}
impl<C> AuthorizedClient for RateLimited<C>
where
	C: AuthorizedClient,
{
	fn auth_do<'a>(
		&'a self,
		options: &'a CallOptions,
		request: &'a ApiRequest,
		api: &'a dyn ApiVersion,
	) -> CallFuture<'a> {
		Box::pin(async move {
			let response = self.inner.auth_do(options, request, api).await?;
			let report = Report::from_headers(response.headers());

			if let Some(slot) = &options.report_slot {
				slot.set(report);
			}
			if let Some(handler) = &self.handler {
				handler.handle(&report, &response).map_err(|source| Error::Handler { source })?;
			}

			Ok(response)
		})
	}
}
impl<C> Debug for RateLimited<C>
where
	C: Debug,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RateLimited")
			.field("inner", &self.inner)
			.field("handler_set", &self.handler.is_some())
			.finish()
	}
}

fn header_number<T>(headers: &HeaderMap, name: &str) -> T
where
	T: Default + FromStr,
{
	headers
		.get(name)
		.and_then(|value| value.to_str().ok())
		.and_then(|value| value.trim().parse().ok())
		.unwrap_or_default()
}
