//! Optional observability helpers for flows and credentials.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `esign_auth.flow` with the `flow` and
//!   `stage` (call site) fields; authorized calls also record `account_id` and `status`.
//! - Enable `metrics` to increment the `esign_auth_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Authorization-code exchange.
	AuthorizationCode,
	/// Refresh-token grant.
	Refresh,
	/// JWT-bearer grant.
	JwtBearer,
	/// User-info lookup.
	UserInfo,
	/// API call made through a credential.
	AuthorizedCall,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::AuthorizationCode => "authorization_code",
			FlowKind::Refresh => "refresh",
			FlowKind::JwtBearer => "jwt_bearer",
			FlowKind::UserInfo => "user_info",
			FlowKind::AuthorizedCall => "authorized_call",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Runs `fut` inside a [`FlowSpan`] and records attempt plus success/failure outcomes.
pub(crate) async fn observe<Fut, T>(kind: FlowKind, stage: &'static str, fut: Fut) -> Result<T>
where
	Fut: Future<Output = Result<T>>,
{
	observe_span(kind, FlowSpan::new(kind, stage), fut).await
}

/// Same as [`observe`] for callers that keep a handle on `span` to record late fields.
pub(crate) async fn observe_span<Fut, T>(kind: FlowKind, span: FlowSpan, fut: Fut) -> Result<T>
where
	Fut: Future<Output = Result<T>>,
{
	record_flow_outcome(kind, FlowOutcome::Attempt);

	let result = span.instrument(fut).await;

	match &result {
		Ok(_) => record_flow_outcome(kind, FlowOutcome::Success),
		Err(_) => record_flow_outcome(kind, FlowOutcome::Failure),
	}

	result
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn flow_labels_are_stable() {
		assert_eq!(FlowKind::JwtBearer.to_string(), "jwt_bearer");
		assert_eq!(FlowKind::AuthorizedCall.as_str(), "authorized_call");
		assert_eq!(FlowOutcome::Failure.to_string(), "failure");
	}

	#[tokio::test]
	async fn observe_passes_results_through() {
		let value = observe(FlowKind::UserInfo, "test", async { Ok(7) })
			.await
			.expect("Successful future should pass through.");

		assert_eq!(value, 7);

		let err = observe::<_, ()>(FlowKind::UserInfo, "test", async {
			Err(Error::AccountNotFound { account_id: "a".into(), email: "e".into() })
		})
		.await
		.expect_err("Failing future should pass through.");

		assert!(matches!(err, Error::AccountNotFound { .. }));
	}
}
