//! Signal-driven, single-pass cleanup of registered resources.
//!
//! A [`ShutdownCoordinator`] is assembled at boot from three ordered sequences: closers,
//! fallible closers, and flushers. On the first `SIGINT` or `SIGTERM` it runs them in exactly
//! that order (each sequence in registration order) under a fresh [`Context`], logs fallible
//! closer failures with their registration index, and then exits the process with code 0.

// std
use std::sync::atomic::{AtomicBool, Ordering};
// crates.io
use tokio::task::JoinHandle;
// self
use crate::{
	_prelude::*,
	context::Context,
	error::BoxError,
	obs::{self, OpKind, OpOutcome, OpSpan},
};

/// Boxed future returned by cleanup hooks.
pub type CleanupFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a + Send>>;

/// Resource released without reporting failure.
pub trait Closer
where
	Self: Send + Sync,
{
	/// Releases the resource.
	fn close<'a>(&'a self, ctx: &'a Context) -> CleanupFuture<'a, ()>;
}

/// Resource whose release may fail; failures are logged and never halt the pass.
pub trait FallibleCloser
where
	Self: Send + Sync,
{
	/// Releases the resource.
	fn close<'a>(&'a self, ctx: &'a Context) -> CleanupFuture<'a, Result<(), BoxError>>;
}

/// Buffered sink drained during shutdown.
pub trait Flusher
where
	Self: Send + Sync,
{
	/// Writes out any buffered data.
	fn flush<'a>(&'a self, ctx: &'a Context) -> CleanupFuture<'a, ()>;
}

/// Process exit hook invoked after cleanup.
pub type ExitHook = Arc<dyn Fn(i32) + Send + Sync>;

/// Signal that triggered shutdown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TerminationSignal {
	/// `SIGINT` / Ctrl-C.
	Interrupt,
	/// `SIGTERM`.
	Terminate,
}
impl TerminationSignal {
	/// Returns the conventional signal name.
	pub const fn as_str(self) -> &'static str {
		match self {
			TerminationSignal::Interrupt => "SIGINT",
			TerminationSignal::Terminate => "SIGTERM",
		}
	}
}
impl Display for TerminationSignal {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Failure reported by a fallible closer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloseFailure {
	/// Registration index among the fallible closers.
	pub index: usize,
	/// Rendered error.
	pub message: String,
}

/// Summary of a completed cleanup pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CleanupReport {
	/// Closers invoked.
	pub closed: usize,
	/// Fallible closers invoked, failed or not.
	pub fallible_closed: usize,
	/// Flushers invoked.
	pub flushed: usize,
	/// Fallible closer failures in registration order.
	pub failures: Vec<CloseFailure>,
}
impl CleanupReport {
	/// Returns `true` when every fallible closer succeeded.
	pub fn is_clean(&self) -> bool {
		self.failures.is_empty()
	}
}

/// Ordered cleanup registry bound to termination signals.
///
/// Clones share the same registry and re-entry guard, so the pass runs at most once no matter
/// how many clones or signals trigger it.
#[derive(Clone)]
pub struct ShutdownCoordinator {
	closers: Vec<Arc<dyn Closer>>,
	fallible_closers: Vec<Arc<dyn FallibleCloser>>,
	flushers: Vec<Arc<dyn Flusher>>,
	exit: ExitHook,
	started: Arc<AtomicBool>,
}
impl ShutdownCoordinator {
	/// Exit code used after a cleanup pass.
	pub const EXIT_CODE: i32 = 0;

	/// Creates an empty coordinator that exits the process after cleanup.
	pub fn new() -> Self {
		Self {
			closers: Vec::new(),
			fallible_closers: Vec::new(),
			flushers: Vec::new(),
			exit: Arc::new(exit_process),
			started: Arc::new(AtomicBool::new(false)),
		}
	}

	/// Registers a closer.
	pub fn with_closer<C>(mut self, closer: Arc<C>) -> Self
	where
		C: 'static + Closer,
	{
		self.closers.push(closer);

		self
	}

	/// Registers a fallible closer.
	pub fn with_fallible_closer<C>(mut self, closer: Arc<C>) -> Self
	where
		C: 'static + FallibleCloser,
	{
		self.fallible_closers.push(closer);

		self
	}

	/// Registers a flusher.
	pub fn with_flusher<F>(mut self, flusher: Arc<F>) -> Self
	where
		F: 'static + Flusher,
	{
		self.flushers.push(flusher);

		self
	}

	/// Replaces the process exit hook.
	pub fn with_exit<F>(mut self, exit: F) -> Self
	where
		F: 'static + Fn(i32) + Send + Sync,
	{
		self.exit = Arc::new(exit);

		self
	}

	/// Returns `true` once a cleanup pass has started.
	pub fn has_started(&self) -> bool {
		self.started.load(Ordering::Acquire)
	}

	/// Runs the ordered cleanup pass under a fresh context.
	///
	/// Returns `None` when a pass already started elsewhere.
	pub async fn cleanup(&self) -> Option<CleanupReport> {
		const KIND: OpKind = OpKind::Shutdown;

		if self.started.swap(true, Ordering::AcqRel) {
			tracing::debug!("Shutdown cleanup already started; ignoring.");

			return None;
		}

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let report = OpSpan::new(KIND, "cleanup").instrument(self.run_pass()).await;

		obs::record_op_outcome(
			KIND,
			if report.is_clean() { OpOutcome::Success } else { OpOutcome::Failure },
		);
		tracing::info!(
			closed = report.closed,
			fallible_closed = report.fallible_closed,
			flushed = report.flushed,
			failures = report.failures.len(),
			"Shutdown cleanup finished."
		);

		Some(report)
	}

	async fn run_pass(&self) -> CleanupReport {
		let ctx = Context::background();
		let mut report = CleanupReport::default();

		for closer in &self.closers {
			closer.close(&ctx).await;

			report.closed += 1;
		}
		for (index, closer) in self.fallible_closers.iter().enumerate() {
			if let Err(e) = closer.close(&ctx).await {
				tracing::error!(index, error = %e, "Closer failed during shutdown.");

				report.failures.push(CloseFailure { index, message: e.to_string() });
			}

			report.fallible_closed += 1;
		}
		for flusher in &self.flushers {
			flusher.flush(&ctx).await;

			report.flushed += 1;
		}

		report
	}

	/// Waits for `signal`, runs cleanup, and invokes the exit hook with code 0.
	///
	/// The exit hook only runs when this call performed the pass.
	pub async fn run_until<S>(&self, signal: S) -> Option<CleanupReport>
	where
		S: Future<Output = Result<TerminationSignal>>,
	{
		match signal.await {
			Ok(signal) => tracing::info!(signal = %signal, "Termination signal received."),
			Err(e) => {
				tracing::error!(error = %e, "Failed to listen for termination signals.");

				return None;
			},
		}

		let report = self.cleanup().await?;

		(self.exit)(Self::EXIT_CODE);

		Some(report)
	}

	/// Spawns a task that performs cleanup on the first `SIGINT` or `SIGTERM`.
	///
	/// The signal handlers are registered before this returns. Must be called from within a
	/// Tokio runtime.
	pub fn install(&self) -> Result<JoinHandle<Option<CleanupReport>>> {
		let signals = TerminationSignals::subscribe()?;
		let coordinator = self.clone();

		Ok(tokio::spawn(async move { coordinator.run_until(signals.recv()).await }))
	}
}
impl Default for ShutdownCoordinator {
	fn default() -> Self {
		Self::new()
	}
}
impl Debug for ShutdownCoordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ShutdownCoordinator")
			.field("closers", &self.closers.len())
			.field("fallible_closers", &self.fallible_closers.len())
			.field("flushers", &self.flushers.len())
			.field("started", &self.has_started())
			.finish()
	}
}

fn exit_process(code: i32) {
	std::process::exit(code)
}

/// Registered `SIGINT` and `SIGTERM` handlers.
#[derive(Debug)]
pub struct TerminationSignals {
	#[cfg(unix)]
	interrupt: tokio::signal::unix::Signal,
	#[cfg(unix)]
	terminate: tokio::signal::unix::Signal,
}
impl TerminationSignals {
	/// Registers the handlers; signals delivered from now on are buffered until [`Self::recv`].
	#[cfg(unix)]
	pub fn subscribe() -> Result<Self> {
		// crates.io
		use tokio::signal::unix::{self, SignalKind};

		let subscribe =
			|kind| unix::signal(kind).map_err(|source| Error::SignalSubscription { source });

		Ok(Self {
			interrupt: subscribe(SignalKind::interrupt())?,
			terminate: subscribe(SignalKind::terminate())?,
		})
	}

	/// Ctrl-C is the only termination signal off unix; it registers on first poll.
	#[cfg(not(unix))]
	pub fn subscribe() -> Result<Self> {
		Ok(Self {})
	}

	/// Resolves on the first termination signal.
	#[cfg(unix)]
	pub async fn recv(mut self) -> Result<TerminationSignal> {
		tokio::select! {
			_ = self.interrupt.recv() => Ok(TerminationSignal::Interrupt),
			_ = self.terminate.recv() => Ok(TerminationSignal::Terminate),
		}
	}

	/// Resolves on the first Ctrl-C.
	#[cfg(not(unix))]
	pub async fn recv(self) -> Result<TerminationSignal> {
		tokio::signal::ctrl_c().await.map_err(|source| Error::SignalSubscription { source })?;

		Ok(TerminationSignal::Interrupt)
	}
}

/// Resolves on the first `SIGINT` or `SIGTERM`.
pub async fn wait_for_termination() -> Result<TerminationSignal> {
	TerminationSignals::subscribe()?.recv().await
}
