// self
use crate::{_prelude::*, obs::FlowKind};

/// Instrumented future when tracing is enabled, the bare future otherwise.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Instrumented future when tracing is enabled, the bare future otherwise.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// `esign_auth.flow` span around one flow or credential operation.
///
/// Besides `flow` and `stage`, the span carries two fields that start empty and are filled
/// in as the operation learns them: `account_id` once a credential is bound to an account,
/// and `status` once an upstream response arrives.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Opens a span for `kind` at the given call site.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"esign_auth.flow",
				flow = kind.as_str(),
				stage,
				account_id = tracing::field::Empty,
				status = tracing::field::Empty,
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Records the account the operation was routed to.
	pub fn record_account(&self, account_id: &str) {
		#[cfg(feature = "tracing")]
		{
			self.span.record("account_id", account_id);
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = account_id;
		}
	}

	/// Records the HTTP status returned upstream.
	pub fn record_status(&self, status: u16) {
		#[cfg(feature = "tracing")]
		{
			self.span.record("status", status);
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = status;
		}
	}

	/// Enters the span for a synchronous section such as URL building.
	pub fn entered(self) -> FlowSpanGuard {
		#[cfg(feature = "tracing")]
		{
			FlowSpanGuard { guard: self.span.entered() }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = self;

			FlowSpanGuard {}
		}
	}

	/// Attaches the span to `fut` so no guard is held across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Guard returned by [`FlowSpan::entered`]; the span closes when it drops.
pub struct FlowSpanGuard {
	#[cfg(feature = "tracing")]
	#[allow(dead_code)]
	guard: tracing::span::EnteredSpan,
}
impl Debug for FlowSpanGuard {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("FlowSpanGuard(..)")
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn entered_guard_exists_with_or_without_tracing() {
		let guard = FlowSpan::new(FlowKind::JwtBearer, "assertion").entered();

		assert_eq!(format!("{guard:?}"), "FlowSpanGuard(..)");
	}

	#[tokio::test]
	async fn late_fields_can_be_recorded_while_instrumented() {
		let span = FlowSpan::new(FlowKind::AuthorizedCall, "auth_do");
		let value = span
			.instrument({
				let span = span.clone();

				async move {
					span.record_account("acct-1");
					span.record_status(200);

					"done"
				}
			})
			.await;

		assert_eq!(value, "done");
	}
}
