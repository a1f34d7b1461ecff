//! HTTP integration client used for outbound calls to platform collaborators.
//!
//! The module exposes [`IntegrationClient`] alongside crate-owned [`HttpRequest`] and
//! [`HttpResponse`] types so callers and fakes never depend on a particular HTTP stack.
//! Two dispatch modes exist: [`IntegrationClient::execute`] attaches the service's own
//! authorization (when configured) and [`IntegrationClient::execute_without_our_authorization`]
//! never does, which is what third-party endpoints such as token introspection require.
//! Both honor a [`LogRedaction`] so sensitive request or response material stays out of logs.

// self
#[cfg(feature = "reqwest")] use crate::error::TransportError;
use crate::{_prelude::*, context::Context};

/// Boxed future returned by [`IntegrationClient`] operations.
pub type HttpFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Abstraction over HTTP transports used for integration calls.
///
/// Implementations must propagate the caller's [`Context`] to the transport so cancellation
/// and deadlines abort in-flight requests, and must honor the [`LogRedaction`] flags in any
/// log line they emit.
pub trait IntegrationClient
where
	Self: 'static + Send + Sync,
{
	/// Dispatches `request`, attaching the service's own authorization when configured.
	fn execute<'a>(
		&'a self,
		ctx: &'a Context,
		request: HttpRequest,
		redaction: LogRedaction,
	) -> HttpFuture<'a, HttpResponse>;

	/// Dispatches `request` without attaching the service's own authorization.
	fn execute_without_our_authorization<'a>(
		&'a self,
		ctx: &'a Context,
		request: HttpRequest,
		redaction: LogRedaction,
	) -> HttpFuture<'a, HttpResponse>;
}

/// Outbound `GET` request description.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpRequest {
	/// Absolute request URL, including query.
	pub url: Url,
	/// Header pairs in insertion order.
	pub headers: Vec<(String, String)>,
}
impl HttpRequest {
	/// Builds a bodiless `GET` request.
	pub fn get(url: Url) -> Self {
		Self { url, headers: Vec::new() }
	}

	/// Appends a header.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));

		self
	}

	/// Returns the first header value matching `name` (case-insensitive).
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers
			.iter()
			.find(|(key, _)| key.eq_ignore_ascii_case(name))
			.map(|(_, value)| value.as_str())
	}
}

/// Response returned by an [`IntegrationClient`], with the body fully read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
	/// HTTP status code.
	pub status: u16,
	/// Headers keyed by lowercase name; repeated headers keep the first value.
	pub headers: BTreeMap<String, String>,
	/// Response body bytes.
	pub body: Vec<u8>,
}
impl HttpResponse {
	/// Creates a response with no headers.
	pub fn new(status: u16, body: Vec<u8>) -> Self {
		Self { status, headers: BTreeMap::new(), body }
	}

	/// Adds a header, normalizing the name to lowercase.
	pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
		self.headers.insert(name.to_ascii_lowercase(), value.into());

		self
	}

	/// Returns the header value for `name` (case-insensitive).
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}
}

/// Controls which halves of an exchange may appear in logs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LogRedaction {
	/// Hide the request URL query, headers, and body.
	pub request: bool,
	/// Hide the response body.
	pub response: bool,
}
impl LogRedaction {
	/// Logs everything.
	pub const NONE: Self = Self { request: false, response: false };
	/// Hides both the request and the response.
	pub const ALL: Self = Self { request: true, response: true };
}

/// Renders a URL for logs, dropping the query when the request is redacted.
pub(crate) fn loggable_url(url: &Url, redact: bool) -> String {
	if !redact || url.query().is_none() {
		return url.to_string();
	}

	let mut view = url.clone();

	view.set_query(Some("REDACTED"));

	view.to_string()
}

fn loggable_body(body: &[u8], redact: bool) -> String {
	const PREVIEW_LIMIT: usize = 512;

	if redact {
		return "REDACTED".into();
	}

	let text = String::from_utf8_lossy(body);

	match text.char_indices().nth(PREVIEW_LIMIT) {
		Some((idx, _)) => format!("{}...", &text[..idx]),
		None => text.into_owned(),
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// When a bearer token is configured it is attached by [`IntegrationClient::execute`] only.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestIntegrationClient {
	client: ReqwestClient,
	authorization: Option<Arc<str>>,
}
#[cfg(feature = "reqwest")]
impl ReqwestIntegrationClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self { client, authorization: None }
	}

	/// Builds a client that does not follow redirects.
	pub fn build() -> Result<Self> {
		let client = ReqwestClient::builder()
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.map_err(crate::error::ConfigError::from)?;

		Ok(Self::with_client(client))
	}

	/// Sets the bearer token representing this service's own authorization.
	pub fn with_bearer_token(mut self, token: impl AsRef<str>) -> Self {
		self.authorization = Some(Arc::from(token.as_ref()));

		self
	}

	async fn dispatch(
		&self,
		ctx: &Context,
		request: HttpRequest,
		redaction: LogRedaction,
		authorize: bool,
	) -> Result<HttpResponse> {
		let mut builder = self.client.get(request.url.clone());

		for (name, value) in &request.headers {
			builder = builder.header(name.as_str(), value.as_str());
		}
		if authorize && let Some(token) = &self.authorization {
			builder = builder.bearer_auth(token);
		}

		tracing::debug!(
			url = %loggable_url(&request.url, redaction.request),
			authorized = authorize && self.authorization.is_some(),
			"Dispatching integration request."
		);

		let response = ctx
			.run(async move {
				let response =
					builder.send().await.map_err(|e| transport_error(e, redaction.request))?;
				let status = response.status().as_u16();
				let mut headers = BTreeMap::new();

				for (name, value) in response.headers() {
					if let Ok(value) = value.to_str() {
						headers.entry(name.as_str().to_owned()).or_insert_with(|| value.to_owned());
					}
				}

				let body = response
					.bytes()
					.await
					.map_err(|e| transport_error(e, redaction.request))?
					.to_vec();

				Ok(HttpResponse { status, headers, body })
			})
			.await?;

		tracing::debug!(
			url = %loggable_url(&request.url, redaction.request),
			status = response.status,
			body = %loggable_body(&response.body, redaction.response),
			"Integration request completed."
		);

		Ok(response)
	}
}
#[cfg(feature = "reqwest")]
impl Debug for ReqwestIntegrationClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ReqwestIntegrationClient")
			.field("authorization_set", &self.authorization.is_some())
			.finish()
	}
}
#[cfg(feature = "reqwest")]
impl IntegrationClient for ReqwestIntegrationClient {
	fn execute<'a>(
		&'a self,
		ctx: &'a Context,
		request: HttpRequest,
		redaction: LogRedaction,
	) -> HttpFuture<'a, HttpResponse> {
		Box::pin(self.dispatch(ctx, request, redaction, true))
	}

	fn execute_without_our_authorization<'a>(
		&'a self,
		ctx: &'a Context,
		request: HttpRequest,
		redaction: LogRedaction,
	) -> HttpFuture<'a, HttpResponse> {
		Box::pin(self.dispatch(ctx, request, redaction, false))
	}
}

/// Reqwest errors carry the request URL; a redacted request must not leak its query through them.
#[cfg(feature = "reqwest")]
fn transport_error(e: ReqwestError, redact_url: bool) -> TransportError {
	if redact_url { TransportError::from(e.without_url()) } else { TransportError::from(e) }
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	#[cfg(feature = "reqwest")] use crate::{_preludet::*, error::ErrorKind};

	#[test]
	fn redacted_urls_hide_the_query() {
		let url = Url::parse("https://oauth2.googleapis.com/tokeninfo?id_token=a.b.c")
			.expect("Fixture URL should parse.");

		assert_eq!(loggable_url(&url, true), "https://oauth2.googleapis.com/tokeninfo?REDACTED");
		assert_eq!(loggable_url(&url, false), url.to_string());
	}

	#[test]
	fn response_headers_are_case_insensitive() {
		let response =
			HttpResponse::new(200, Vec::new()).with_header("Content-Type", "application/json");

		assert_eq!(response.header("content-type"), Some("application/json"));
		assert_eq!(response.header("CONTENT-TYPE"), Some("application/json"));
		assert!(response.is_success());
	}

	#[test]
	fn body_previews_are_truncated_or_redacted() {
		let long = vec![b'x'; 600];

		assert_eq!(loggable_body(b"secret", true), "REDACTED");
		assert!(loggable_body(&long, false).ends_with("..."));
		assert_eq!(loggable_body(b"{}", false), "{}");
	}

	#[cfg(feature = "reqwest")]
	#[tokio::test]
	async fn our_bearer_is_attached_only_when_asked() {
		// crates.io
		use httpmock::prelude::*;

		let server = MockServer::start_async().await;
		let authorized = server
			.mock_async(|when, then| {
				when.method(GET).path("/o").header("authorization", "Bearer svc-token");
				then.status(200).header("content-type", "text/plain").body("ok");
			})
			.await;
		let client = test_reqwest_integration_client().with_bearer_token("svc-token");
		let ctx = Context::background();
		let url = Url::parse(&server.url("/o")).expect("Mock URL should parse.");
		let response = client
			.execute(&ctx, HttpRequest::get(url.clone()), LogRedaction::NONE)
			.await
			.expect("Authorized request should complete.");

		assert_eq!(response.status, 200);
		assert_eq!(response.header("Content-Type"), Some("text/plain"));
		assert_eq!(response.body, b"ok");

		let response = client
			.execute_without_our_authorization(&ctx, HttpRequest::get(url), LogRedaction::ALL)
			.await
			.expect("Unauthorized request should still complete.");

		assert_eq!(response.status, 404, "Only the authorized mock exists.");

		authorized.assert_calls_async(1).await;
	}

	#[cfg(feature = "reqwest")]
	#[tokio::test]
	async fn redacted_transport_errors_drop_the_url() {
		let client = test_reqwest_integration_client();
		let ctx = Context::background();
		let url = Url::parse("http://127.0.0.1:1/tokeninfo?id_token=hdr.body.SECRETSIG")
			.expect("Fixture URL should parse.");
		let err = client
			.execute_without_our_authorization(&ctx, HttpRequest::get(url.clone()), LogRedaction::ALL)
			.await
			.expect_err("Nothing listens on port 1.");

		assert_eq!(err.kind(), ErrorKind::Transport);
		assert!(!format!("{err:?}").contains("SECRETSIG"));

		let mut source: Option<&dyn StdError> = Some(&err);

		while let Some(e) = source {
			assert!(!e.to_string().contains("SECRETSIG"), "Leaked token in `{e}`.");

			source = e.source();
		}

		let err = client
			.execute(&ctx, HttpRequest::get(url), LogRedaction::NONE)
			.await
			.expect_err("Nothing listens on port 1.");

		assert!(format!("{err:?}").contains("127.0.0.1:1"), "Unredacted errors keep the URL.");
	}
}
