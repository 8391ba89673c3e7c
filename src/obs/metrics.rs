// self
use crate::obs::{OpKind, OpOutcome};

/// Increments `bearer_client_op_total{op, outcome}` when the `metrics` feature is enabled.
pub fn record_op_outcome(kind: OpKind, outcome: OpOutcome) {
	#[cfg(feature = "metrics")]
	metrics::counter!(
		"bearer_client_op_total",
		"op" => kind.as_str(),
		"outcome" => outcome.as_str()
	)
	.increment(1);

	#[cfg(not(feature = "metrics"))]
	let _ = (kind, outcome);
}

/// Records how many queued callers one refresh episode released, labeled by whether the
/// episode produced a token.
pub fn record_waiters_released(count: usize, succeeded: bool) {
	#[cfg(feature = "metrics")]
	metrics::histogram!(
		"bearer_client_refresh_waiters",
		"outcome" => if succeeded { "success" } else { "failure" }
	)
	.record(count as f64);

	#[cfg(not(feature = "metrics"))]
	let _ = (count, succeeded);
}
