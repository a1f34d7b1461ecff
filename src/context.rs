//! Cancellation and deadline handle threaded through every I/O-bearing operation.
//!
//! A [`Context`] pairs a [`CancellationToken`] with an optional deadline. Callers derive
//! [`Context::child`] handles for nested work so cancelling a parent stops every descendant,
//! while [`Context::background`] yields a fresh handle that nothing upstream can cancel.

// std
use std::time::Duration as StdDuration;
// crates.io
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
// self
use crate::_prelude::*;

/// Cancellation + deadline handle accepted by I/O operations.
#[derive(Clone, Debug, Default)]
pub struct Context {
	cancel: CancellationToken,
	deadline: Option<Instant>,
}
impl Context {
	/// Returns a fresh handle with no deadline that is not linked to any other context.
	pub fn background() -> Self {
		Self::default()
	}

	/// Tightens the deadline to `timeout` from now; an earlier existing deadline wins.
	pub fn with_timeout(self, timeout: StdDuration) -> Self {
		self.with_deadline(Instant::now() + timeout)
	}

	/// Tightens the deadline to `deadline`; an earlier existing deadline wins.
	pub fn with_deadline(mut self, deadline: Instant) -> Self {
		self.deadline = Some(match self.deadline {
			Some(current) if current <= deadline => current,
			_ => deadline,
		});

		self
	}

	/// Derives a handle that is cancelled whenever `self` is, sharing its deadline.
	pub fn child(&self) -> Self {
		Self { cancel: self.cancel.child_token(), deadline: self.deadline }
	}

	/// Cancels this handle and every child derived from it.
	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	/// Returns `true` once the handle (or an ancestor) has been cancelled.
	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	/// Returns the deadline, if any.
	pub fn deadline(&self) -> Option<Instant> {
		self.deadline
	}

	/// Exposes the underlying token so hosts can wire it into other runtimes.
	pub fn cancellation_token(&self) -> &CancellationToken {
		&self.cancel
	}

	/// Drives `fut` to completion unless the handle is cancelled or its deadline elapses first.
	///
	/// Losing the race drops `fut`, which aborts the in-flight transport operation.
	pub async fn run<F, T>(&self, fut: F) -> Result<T>
	where
		F: Future<Output = Result<T>>,
	{
		if self.cancel.is_cancelled() {
			return Err(Error::Cancelled);
		}

		match self.deadline {
			Some(deadline) => tokio::select! {
				biased;
				_ = self.cancel.cancelled() => Err(Error::Cancelled),
				out = tokio::time::timeout_at(deadline, fut) =>
					out.unwrap_or(Err(Error::DeadlineExceeded)),
			},
			None => tokio::select! {
				biased;
				_ = self.cancel.cancelled() => Err(Error::Cancelled),
				out = fut => out,
			},
		}
	}
}
