//! Observability for the three instrumented platform operations.
//!
//! Certificate cache construction, push-token verification and the shutdown cleanup pass each
//! open one `car_svc.op` span. Its `op` field names the [`OpKind`] and its `stage` field names
//! the call site (`certificate_cache_load`, the enforced push policy, `cleanup`). Per-issuer
//! fetch outcomes and fallible closer failures are logged as events inside that span.
//!
//! With the `metrics` feature every operation also bumps `car_svc_op_total{op, outcome}` once
//! on entry and once on completion, so `attempt - success - failure` is the in-flight count.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operation label carried by spans and counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
	/// [`CertificateCache::load`](crate::cert::CertificateCache::load).
	CertificateLoad,
	/// [`TokenVerifier::verify`](crate::auth::TokenVerifier::verify) for any push policy.
	TokenVerification,
	/// [`ShutdownCoordinator::cleanup`](crate::shutdown::ShutdownCoordinator::cleanup).
	Shutdown,
}
impl OpKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpKind::CertificateLoad => "certificate_load",
			OpKind::TokenVerification => "token_verification",
			OpKind::Shutdown => "shutdown",
		}
	}
}
impl Display for OpKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Counter outcome label.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Recorded before any I/O starts.
	Attempt,
	/// Cache published, token accepted, or every fallible closer succeeded.
	Success,
	/// Cache aggregation failed, token rejected, or a fallible closer reported an error.
	Failure,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Failure => "failure",
		}
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
