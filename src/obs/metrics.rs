// self
use crate::obs::{OpKind, OpOutcome};

/// Bumps `car_svc_op_total` for `kind` and `outcome`; a no-op without the `metrics` feature.
pub fn record_op_outcome(kind: OpKind, outcome: OpOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"car_svc_op_total",
			"op" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records [`OpOutcome::Success`] or [`OpOutcome::Failure`] from a finished operation's result.
pub fn record_op_result<T, E>(kind: OpKind, result: &Result<T, E>) {
	match result {
		Ok(_) => record_op_outcome(kind, OpOutcome::Success),
		Err(_) => record_op_outcome(kind, OpOutcome::Failure),
	}
}
