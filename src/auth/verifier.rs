//! Remote identity-token verification for push deliveries.
//!
//! [`TokenVerifier`] introspects a token against the Google `tokeninfo` endpoint through an
//! [`IntegrationClient`] without attaching this service's credentials, maps upstream failures
//! into the platform taxonomy, and then enforces a [`PushPolicy`] against the returned claims.
//! The verifier is stateless per call; the policy is chosen by the route that calls it.

// self
use crate::{
	_prelude::*,
	auth::{IdToken, PushPolicy},
	context::Context,
	env::Env,
	error::ConfigError,
	http::{HttpRequest, IntegrationClient, LogRedaction},
	obs::{self, OpKind, OpOutcome, OpSpan},
};

/// Google token introspection endpoint.
pub const TOKEN_INFO_ENDPOINT: &str = "https://oauth2.googleapis.com/tokeninfo";

/// Claims returned by the introspection endpoint.
///
/// Only the claims policy checks consult are kept; anything else in the body is ignored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
	/// Intended recipient of the token.
	#[serde(rename = "aud", default)]
	pub audience: String,
	/// Principal the token was minted for.
	#[serde(default)]
	pub email: String,
	/// Raw `email_verified` claim; only the JSON string `"true"` counts as verified.
	#[serde(default)]
	pub email_verified: serde_json::Value,
}
impl TokenInfo {
	/// Returns `true` only for the literal string `"true"`.
	pub fn is_email_verified(&self) -> bool {
		matches!(&self.email_verified, serde_json::Value::String(value) if value == "true")
	}
}

/// Verifies push-delivery identity tokens by remote introspection.
pub struct TokenVerifier<C>
where
	C: ?Sized + IntegrationClient,
{
	env: Arc<Env>,
	http_client: Arc<C>,
	endpoint: String,
}
impl<C> TokenVerifier<C>
where
	C: ?Sized + IntegrationClient,
{
	/// Creates a verifier for `env` that introspects through `http_client`.
	pub fn new(env: impl Into<Arc<Env>>, http_client: impl Into<Arc<C>>) -> Self {
		Self { env: env.into(), http_client: http_client.into(), endpoint: TOKEN_INFO_ENDPOINT.into() }
	}

	/// Overrides the introspection endpoint.
	pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
		self.endpoint = endpoint.into();

		self
	}

	/// Environment the verifier checks claims against.
	pub fn env(&self) -> &Env {
		&self.env
	}

	/// Verifies a token delivered by a task-queue push.
	pub async fn verify_for_task_queue_push(&self, ctx: &Context, token: &str) -> Result<TokenInfo> {
		self.verify(ctx, token, PushPolicy::TaskQueue).await
	}

	/// Verifies a token delivered by a Pub/Sub push.
	pub async fn verify_for_pubsub_push(&self, ctx: &Context, token: &str) -> Result<TokenInfo> {
		self.verify(ctx, token, PushPolicy::Pubsub).await
	}

	/// Verifies a token delivered by a scheduler push.
	pub async fn verify_for_scheduler_push(&self, ctx: &Context, token: &str) -> Result<TokenInfo> {
		self.verify(ctx, token, PushPolicy::Scheduler).await
	}

	/// Introspects `token` and enforces `policy` against the returned claims.
	pub async fn verify(&self, ctx: &Context, token: &str, policy: PushPolicy) -> Result<TokenInfo> {
		const KIND: OpKind = OpKind::TokenVerification;

		let token = IdToken::new(token);
		let span = OpSpan::new(KIND, policy.as_str());

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span
			.instrument(async {
				let info = self.introspect(ctx, &token).await?;

				check_claims(&self.env, policy, &info)?;

				Ok::<_, Error>(info)
			})
			.await;

		match &result {
			Ok(_) => tracing::debug!(policy = policy.as_str(), token = %token, "Push token verified."),
			Err(e) => tracing::warn!(
				policy = policy.as_str(),
				token = %token,
				kind = %e.kind(),
				error = %e,
				"Push token rejected."
			),
		}

		obs::record_op_result(KIND, &result);

		result
	}

	async fn introspect(&self, ctx: &Context, token: &IdToken) -> Result<TokenInfo> {
		let url = Url::parse_with_params(&self.endpoint, [("id_token", token.expose())]).map_err(
			|source| ConfigError::InvalidUrl { url: self.endpoint.clone(), source: Some(source) },
		)?;
		let request = HttpRequest::get(url).with_header("Accept", "application/json");
		let response = self
			.http_client
			.execute_without_our_authorization(ctx, request, LogRedaction::ALL)
			.await?;

		check_introspection_status(response.status, token)?;

		let mut deserializer = serde_json::Deserializer::from_slice(&response.body);

		serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| Error::MalformedIntrospectionResponse { source })
	}
}
impl<C> Debug for TokenVerifier<C>
where
	C: ?Sized + IntegrationClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenVerifier")
			.field("svc_id", &self.env.svc_id)
			.field("endpoint", &self.endpoint)
			.finish()
	}
}

/// Maps the introspection status into the platform taxonomy.
pub fn check_introspection_status(status: u16, token: &IdToken) -> Result<()> {
	match status {
		200 => Ok(()),
		502 => Err(Error::UpstreamBadGateway),
		503 => Err(Error::UpstreamUnavailable),
		504 => Err(Error::UpstreamGatewayTimeout),
		status => Err(Error::unauthorized(format!(
			"token introspection rejected token `{token}` with status {status}"
		))),
	}
}

/// Enforces `policy` against `info`, naming the first claim that fails.
pub fn check_claims(env: &Env, policy: PushPolicy, info: &TokenInfo) -> Result<()> {
	if info.audience != env.svc_id {
		return Err(Error::unauthorized(format!(
			"audience `{}` does not match service `{}`",
			info.audience, env.svc_id
		)));
	}

	let expected = policy.expected_account(env);

	if info.email != expected {
		return Err(Error::unauthorized(format!(
			"email `{}` is not the {policy} push service account",
			info.email
		)));
	}
	if !info.is_email_verified() {
		return Err(Error::unauthorized(format!(
			"email_verified is `{}`, expected \"true\"",
			info.email_verified
		)));
	}

	Ok(())
}
