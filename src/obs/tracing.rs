// crates.io
use tracing::{Instrument, instrument::Instrumented};
// self
use crate::{_prelude::*, obs::OpKind};

/// `car_svc.op` span wrapping one platform operation.
#[derive(Clone, Debug)]
pub struct OpSpan {
	span: tracing::Span,
}
impl OpSpan {
	/// Creates an `info` span for `kind` at `stage`.
	pub fn new(kind: OpKind, stage: &'static str) -> Self {
		Self { span: tracing::info_span!("car_svc.op", op = kind.as_str(), stage) }
	}

	/// Enters the span for synchronous sections.
	pub fn entered(self) -> OpSpanGuard {
		OpSpanGuard { _guard: self.span.entered() }
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		fut.instrument(self.span.clone())
	}
}

/// RAII guard returned by [`OpSpan::entered`].
pub struct OpSpanGuard {
	_guard: tracing::span::EnteredSpan,
}
impl Debug for OpSpanGuard {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("OpSpanGuard(..)")
	}
}
