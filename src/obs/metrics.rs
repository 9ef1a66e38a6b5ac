// self
use crate::obs::{FlowKind, FlowOutcome};

/// Records a flow outcome via the global metrics recorder (when enabled).
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"esign_auth_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn record_flow_outcome_accepts_every_kind() {
		for kind in [
			FlowKind::AuthorizationCode,
			FlowKind::Refresh,
			FlowKind::JwtBearer,
			FlowKind::UserInfo,
			FlowKind::AuthorizedCall,
		] {
			record_flow_outcome(kind, FlowOutcome::Attempt);
		}
	}
}
