//! Platform runtime foundation for `car-svc`: certificate bootstrap from object storage,
//! push-token verification, request pagination parsing, and graceful shutdown in one crate.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod cert;
pub mod context;
pub mod env;
pub mod error;
pub mod http;
pub mod obs;
pub mod pagination;
pub mod platform;
pub mod shutdown;
pub mod store;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// crates.io
	use parking_lot::Mutex;
	// self
	#[cfg(feature = "reqwest")] use crate::http::ReqwestIntegrationClient;
	use crate::{
		context::Context,
		env::{Env, EnvId},
		http::{HttpFuture, HttpRequest, HttpResponse, IntegrationClient, LogRedaction},
	};

	/// Service identifier used by test fixtures.
	pub const TEST_SVC_ID: &str = "car-svc";
	/// Task-queue push account used by test fixtures.
	pub const TEST_TASK_QUEUE_ACCOUNT: &str = "tq@p.iam";
	/// Pub/Sub push account used by test fixtures.
	pub const TEST_PUBSUB_ACCOUNT: &str = "ps@p.iam";
	/// Scheduler push account used by test fixtures.
	pub const TEST_SCHEDULER_ACCOUNT: &str = "sch@p.iam";

	/// Builds the `dev` environment shared across tests.
	pub fn test_env() -> Env {
		Env::new(EnvId::Dev, TEST_SVC_ID)
			.with_task_queue_push_service_account(TEST_TASK_QUEUE_ACCOUNT)
			.with_pubsub_push_service_account(TEST_PUBSUB_ACCOUNT)
			.with_scheduler_push_service_account(TEST_SCHEDULER_ACCOUNT)
	}

	/// Builds a reqwest-backed client that trusts the self-signed certificates served by
	/// `httpmock`.
	#[cfg(feature = "reqwest")]
	pub fn test_reqwest_integration_client() -> ReqwestIntegrationClient {
		let client = ReqwestClient::builder()
			.redirect(reqwest::redirect::Policy::none())
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestIntegrationClient::with_client(client)
	}

	/// Request observed by [`ScriptedIntegrationClient`].
	#[derive(Clone, Debug)]
	pub struct RecordedRequest {
		/// Request as handed to the client.
		pub request: HttpRequest,
		/// Whether the caller asked for the service's own authorization.
		pub with_our_authorization: bool,
		/// Redaction flags supplied by the caller.
		pub redaction: LogRedaction,
	}

	/// Integration client that replays a canned response and records every request.
	#[derive(Clone, Debug)]
	pub struct ScriptedIntegrationClient {
		response: HttpResponse,
		requests: Arc<Mutex<Vec<RecordedRequest>>>,
	}
	impl ScriptedIntegrationClient {
		/// Replays `status` with a JSON `body` for every request.
		pub fn responding(status: u16, body: impl Into<String>) -> Self {
			let response = HttpResponse::new(status, body.into().into_bytes())
				.with_header("content-type", "application/json");

			Self { response, requests: Default::default() }
		}

		/// Returns every request dispatched so far.
		pub fn requests(&self) -> Vec<RecordedRequest> {
			self.requests.lock().clone()
		}

		fn replay(
			&self,
			request: HttpRequest,
			redaction: LogRedaction,
			with_our_authorization: bool,
		) -> HttpResponse {
			self.requests.lock().push(RecordedRequest {
				request,
				with_our_authorization,
				redaction,
			});

			self.response.clone()
		}
	}
	impl IntegrationClient for ScriptedIntegrationClient {
		fn execute<'a>(
			&'a self,
			ctx: &'a Context,
			request: HttpRequest,
			redaction: LogRedaction,
		) -> HttpFuture<'a, HttpResponse> {
			Box::pin(ctx.run(async move { Ok(self.replay(request, redaction, true)) }))
		}

		fn execute_without_our_authorization<'a>(
			&'a self,
			ctx: &'a Context,
			request: HttpRequest,
			redaction: LogRedaction,
		) -> HttpFuture<'a, HttpResponse> {
			Box::pin(ctx.run(async move { Ok(self.replay(request, redaction, false)) }))
		}
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap, HashSet},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::RwLock;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _, tracing_subscriber as _};
