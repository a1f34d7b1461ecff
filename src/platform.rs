//! Boot-time composition of the platform runtime pieces a service shares across handlers.

// self
#[cfg(feature = "reqwest")] use crate::{http::ReqwestIntegrationClient, store::GcsObjectStore};
use crate::{
	_prelude::*,
	auth::{TOKEN_INFO_ENDPOINT, TokenVerifier},
	cert::{CertificateCache, CertificateCacheConfig},
	context::Context,
	env::{self, Env},
	error::ConfigError,
	http::IntegrationClient,
	store::ObjectStore,
};

/// Everything needed to boot the platform.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformConfig {
	/// Runtime environment.
	pub env: Env,
	/// Bucket holding issuer certificates.
	pub cert_bucket: String,
	/// Issuers whose certificates must load before serving.
	#[serde(default)]
	pub required_issuers: Vec<String>,
	/// Token introspection endpoint.
	#[serde(default = "default_token_info_endpoint")]
	pub token_info_endpoint: String,
}
impl PlatformConfig {
	/// Variable holding the certificate bucket.
	pub const CERT_BUCKET: &'static str = "CERT_BUCKET";
	/// Variable holding comma-separated required issuers.
	pub const CERT_REQUIRED_ISSUERS: &'static str = "CERT_REQUIRED_ISSUERS";
	/// Optional variable overriding the token introspection endpoint.
	pub const TOKEN_INFO_ENDPOINT: &'static str = "TOKEN_INFO_ENDPOINT";

	/// Creates a configuration with no required issuers.
	pub fn new(env: Env, cert_bucket: impl Into<String>) -> Self {
		Self {
			env,
			cert_bucket: cert_bucket.into(),
			required_issuers: Vec::new(),
			token_info_endpoint: default_token_info_endpoint(),
		}
	}

	/// Appends required issuers.
	pub fn with_required_issuers<I, S>(mut self, issuers: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.required_issuers.extend(issuers.into_iter().map(Into::into));

		self
	}

	/// Overrides the token introspection endpoint.
	pub fn with_token_info_endpoint(mut self, endpoint: impl Into<String>) -> Self {
		self.token_info_endpoint = endpoint.into();

		self
	}

	/// Loads the configuration from the current process's variables.
	pub fn from_process_env() -> Result<Self, ConfigError> {
		Self::from_vars(std::env::vars())
	}

	/// Loads the configuration from an arbitrary variable set.
	///
	/// `CERT_REQUIRED_ISSUERS` may be absent; blank entries in it are skipped. A blank or absent
	/// `TOKEN_INFO_ENDPOINT` keeps the Google endpoint.
	pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		let vars = vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect::<HashMap<_, _>>();
		let cert_bucket = env::required_var(&vars, Self::CERT_BUCKET)?;
		let required_issuers = vars
			.get(Self::CERT_REQUIRED_ISSUERS)
			.map(|value| {
				value
					.split(',')
					.map(str::trim)
					.filter(|issuer| !issuer.is_empty())
					.map(str::to_owned)
					.collect()
			})
			.unwrap_or_default();
		let token_info_endpoint = env::required_var(&vars, Self::TOKEN_INFO_ENDPOINT)
			.unwrap_or_else(|_| default_token_info_endpoint());

		Ok(Self { env: Env::from_vars(vars)?, cert_bucket, required_issuers, token_info_endpoint })
	}

	/// Derives the certificate cache inputs.
	pub fn certificate_cache_config(&self) -> CertificateCacheConfig {
		CertificateCacheConfig::new(&self.cert_bucket, self.env.id)
			.with_required(self.required_issuers.iter().cloned())
	}
}

fn default_token_info_endpoint() -> String {
	TOKEN_INFO_ENDPOINT.into()
}

/// Shared platform runtime: environment, loaded certificates, and the push-token verifier.
pub struct Platform<C>
where
	C: ?Sized + IntegrationClient,
{
	env: Arc<Env>,
	certificates: CertificateCache,
	verifier: Arc<TokenVerifier<C>>,
}
impl<C> Platform<C>
where
	C: ?Sized + IntegrationClient,
{
	/// Loads the certificate cache and wires the verifier.
	///
	/// Fails when any required certificate cannot be loaded; nothing is exposed in that case.
	pub async fn boot(
		ctx: &Context,
		config: &PlatformConfig,
		store: Arc<dyn ObjectStore>,
		http_client: Arc<C>,
	) -> Result<Self> {
		let env = Arc::new(config.env.clone());
		let certificates =
			CertificateCache::load(ctx, store, &config.certificate_cache_config()).await?;
		let verifier = Arc::new(
			TokenVerifier::new(env.clone(), http_client)
				.with_endpoint(&config.token_info_endpoint),
		);

		tracing::info!(
			env = %env.id,
			svc_id = %env.svc_id,
			issuers = certificates.len(),
			"Platform booted."
		);

		Ok(Self { env, certificates, verifier })
	}

	/// Runtime environment.
	pub fn env(&self) -> &Env {
		&self.env
	}

	/// Loaded issuer certificates.
	pub fn certificates(&self) -> &CertificateCache {
		&self.certificates
	}

	/// Shared push-token verifier.
	pub fn verifier(&self) -> Arc<TokenVerifier<C>> {
		self.verifier.clone()
	}
}
#[cfg(feature = "reqwest")]
impl Platform<ReqwestIntegrationClient> {
	/// Boots against Cloud Storage, sharing one reqwest client for downloads and introspection.
	pub async fn boot_with_gcs(
		ctx: &Context,
		config: &PlatformConfig,
		http_client: ReqwestIntegrationClient,
	) -> Result<Self> {
		let http_client = Arc::new(http_client);
		let store = Arc::new(GcsObjectStore::<ReqwestIntegrationClient>::new(http_client.clone()));

		Self::boot(ctx, config, store, http_client).await
	}
}
impl<C> Debug for Platform<C>
where
	C: ?Sized + IntegrationClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Platform")
			.field("env", &self.env)
			.field("certificates", &self.certificates)
			.field("verifier", &self.verifier)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn loads_issuers_from_variables() {
		let config = PlatformConfig::from_vars([
			(Env::ENV_ID, "dev"),
			(Env::SVC_ID, "car-svc"),
			(Env::TASK_QUEUE_PUSH_SERVICE_ACCOUNT, "tq@p.iam"),
			(Env::PUBSUB_PUSH_SERVICE_ACCOUNT, "ps@p.iam"),
			(Env::SCHEDULER_PUSH_SERVICE_ACCOUNT, "sch@p.iam"),
			(PlatformConfig::CERT_BUCKET, "certs"),
			(PlatformConfig::CERT_REQUIRED_ISSUERS, " iam, gcp ,,iam"),
		])
		.expect("Complete variable set should load.");

		assert_eq!(config.cert_bucket, "certs");
		assert_eq!(config.required_issuers, ["iam", "gcp", "iam"]);
		assert_eq!(config.token_info_endpoint, TOKEN_INFO_ENDPOINT);

		let cache_config = config.certificate_cache_config();

		assert_eq!(cache_config.bucket_name, "certs");
		assert_eq!(cache_config.required, ["iam", "gcp", "iam"]);
	}

	#[test]
	fn bucket_is_required() {
		let err = PlatformConfig::from_vars([(Env::ENV_ID, "dev")])
			.expect_err("Missing bucket must be rejected.");

		assert!(matches!(err, ConfigError::MissingVariable { name: "CERT_BUCKET" }));
	}
}
