//! Issuer certificate cache populated once from object storage at service start.
//!
//! [`CertificateCache::load`] fans out one task per distinct required issuer, waits for every
//! task to report (successes and failures alike), and only then publishes the complete mapping.
//! Each per-issuer failure is logged as it arrives; the caller receives a single
//! [`Error::CacheAggregation`] and never observes a partially populated cache.

// crates.io
use sha2::{Digest, Sha256};
use tokio::task::JoinSet;
// self
use crate::{
	_prelude::*,
	context::Context,
	env::EnvId,
	error::ConfigError,
	obs::{self, OpKind, OpOutcome, OpSpan},
	store::ObjectStore,
};

/// Derives the object key holding `issuer`'s certificate in environment `env`.
pub fn certificate_key(issuer: &str, env: EnvId) -> String {
	format!("{issuer}_cert_{env}.pem")
}

/// Deduplicates issuer identifiers, keeping the first occurrence of each in order.
pub fn dedup_required<I, S>(required: I) -> Vec<String>
where
	I: IntoIterator<Item = S>,
	S: AsRef<str>,
{
	let mut seen = HashSet::new();

	required
		.into_iter()
		.filter_map(|issuer| {
			let issuer = issuer.as_ref();

			seen.insert(issuer.to_owned()).then(|| issuer.to_owned())
		})
		.collect()
}

/// Inputs for [`CertificateCache::load`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateCacheConfig {
	/// Bucket holding the certificates.
	pub bucket_name: String,
	/// Environment used to derive object keys.
	pub env: EnvId,
	/// Issuers whose certificates must be present; duplicates are tolerated.
	pub required: Vec<String>,
}
impl CertificateCacheConfig {
	/// Creates a configuration with no required issuers.
	pub fn new(bucket_name: impl Into<String>, env: EnvId) -> Self {
		Self { bucket_name: bucket_name.into(), env, required: Vec::new() }
	}

	/// Appends required issuers.
	pub fn with_required<I, S>(mut self, issuers: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.required.extend(issuers.into_iter().map(Into::into));

		self
	}
}

/// Immutable issuer → certificate mapping.
#[derive(Clone)]
pub struct CertificateCache {
	certificates: Arc<HashMap<String, Vec<u8>>>,
	issuers: Arc<[String]>,
}
impl CertificateCache {
	/// Concurrently loads every required issuer's certificate from `store`.
	///
	/// Fails fast with [`ConfigError::MissingBucket`] when no bucket is configured. Otherwise
	/// every fetch runs to completion before the outcome is decided.
	pub async fn load(
		ctx: &Context,
		store: Arc<dyn ObjectStore>,
		config: &CertificateCacheConfig,
	) -> Result<Self> {
		const KIND: OpKind = OpKind::CertificateLoad;

		let span = OpSpan::new(KIND, "certificate_cache_load");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span.instrument(Self::load_all(ctx, store, config)).await;

		obs::record_op_result(KIND, &result);

		result
	}

	async fn load_all(
		ctx: &Context,
		store: Arc<dyn ObjectStore>,
		config: &CertificateCacheConfig,
	) -> Result<Self> {
		if config.bucket_name.trim().is_empty() {
			return Err(ConfigError::MissingBucket.into());
		}

		let issuers = dedup_required(&config.required);
		let mut tasks = JoinSet::new();

		for issuer in issuers.iter().cloned() {
			let ctx = ctx.child();
			let store = store.clone();
			let bucket = config.bucket_name.clone();
			let env = config.env;

			tasks.spawn(async move {
				let outcome = fetch_certificate(&ctx, store.as_ref(), &bucket, &issuer, env).await;

				(issuer, outcome)
			});
		}

		let mut certificates = HashMap::with_capacity(issuers.len());
		let mut failed_issuers = Vec::new();
		let mut failed = 0;
		let mut last_error = None;

		while let Some(joined) = tasks.join_next().await {
			match joined {
				Ok((issuer, Ok(bytes))) => {
					certificates.insert(issuer, bytes);
				},
				Ok((issuer, Err(e))) => {
					tracing::error!(
						issuer = %issuer,
						bucket = %config.bucket_name,
						kind = %e.kind(),
						error = %e,
						"Failed to load issuer certificate."
					);

					failed += 1;
					failed_issuers.push(issuer);
					last_error = Some(e);
				},
				Err(e) => {
					tracing::error!(error = %e, "Certificate fetch task did not complete.");

					failed += 1;
					last_error = Some(e.into());
				},
			}
		}

		if let Some(source) = last_error {
			return Err(Error::CacheAggregation {
				failed,
				requested: issuers.len(),
				failed_issuers,
				source: Box::new(source),
			});
		}

		tracing::info!(
			bucket = %config.bucket_name,
			count = certificates.len(),
			"Issuer certificates loaded."
		);

		Ok(Self { certificates: Arc::new(certificates), issuers: issuers.into() })
	}

	/// Returns the certificate bytes for `issuer`.
	pub fn for_issuer(&self, issuer: &str) -> Result<&[u8]> {
		self.certificates
			.get(issuer)
			.map(Vec::as_slice)
			.ok_or_else(|| Error::IssuerNotCached { issuer: issuer.to_owned() })
	}

	/// Cached issuers in deduplicated required order.
	pub fn issuers(&self) -> &[String] {
		&self.issuers
	}

	/// Number of cached certificates.
	pub fn len(&self) -> usize {
		self.certificates.len()
	}

	/// Returns `true` when no issuers were required.
	pub fn is_empty(&self) -> bool {
		self.certificates.is_empty()
	}
}
impl Debug for CertificateCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CertificateCache").field("issuers", &self.issuers).finish()
	}
}

async fn fetch_certificate(
	ctx: &Context,
	store: &dyn ObjectStore,
	bucket: &str,
	issuer: &str,
	env: EnvId,
) -> Result<Vec<u8>> {
	if issuer.trim().is_empty() {
		return Err(ConfigError::EmptyIssuer.into());
	}

	let key = certificate_key(issuer, env);
	let object = store.read(ctx, bucket, &key).await?;

	tracing::info!(
		issuer,
		key = %key,
		bytes = object.bytes.len(),
		content_type = object.content_type.as_deref().unwrap_or(""),
		sha256 = %fingerprint(&object.bytes),
		"Issuer certificate fetched."
	);

	Ok(object.bytes)
}

/// Hex-encoded SHA-256 of `bytes`, used to identify certificates in logs.
pub fn fingerprint(bytes: &[u8]) -> String {
	format!("{:x}", Sha256::digest(bytes))
}
