//! Google Cloud Storage [`ObjectStore`] backed by the JSON API media download endpoint.
//!
//! Reads issue `GET {base}/storage/v1/b/{bucket}/o/{object}?alt=media` through an
//! [`IntegrationClient`] with the service's own authorization attached.

// self
use crate::{
	_prelude::*,
	context::Context,
	error::ConfigError,
	http::{HttpRequest, IntegrationClient, LogRedaction},
	store::{ObjectStore, ObjectStoreError, StoreFuture, StoredObject},
};

/// Production Cloud Storage endpoint.
pub const GCS_BASE_URL: &str = "https://storage.googleapis.com/";

/// Cloud Storage reader that downloads whole objects.
pub struct GcsObjectStore<C>
where
	C: ?Sized + IntegrationClient,
{
	http_client: Arc<C>,
	base_url: String,
}
impl<C> GcsObjectStore<C>
where
	C: ?Sized + IntegrationClient,
{
	/// Creates a store that talks to the production endpoint.
	pub fn new(http_client: impl Into<Arc<C>>) -> Self {
		Self { http_client: http_client.into(), base_url: GCS_BASE_URL.into() }
	}

	/// Overrides the endpoint, e.g. for an emulator.
	pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
		self.base_url = base_url.into();

		self
	}

	/// Builds the media download URL for `bucket`/`key`, percent-encoding both segments.
	pub fn object_url(&self, bucket: &str, key: &str) -> Result<Url, ConfigError> {
		let invalid = |source| ConfigError::InvalidUrl { url: self.base_url.clone(), source };
		let mut url = Url::parse(&self.base_url).map_err(|e| invalid(Some(e)))?;

		url.path_segments_mut()
			.map_err(|_| invalid(None))?
			.pop_if_empty()
			.extend(["storage", "v1", "b", bucket, "o", key]);
		url.query_pairs_mut().append_pair("alt", "media");

		Ok(url)
	}

	async fn read_object(&self, ctx: &Context, bucket: &str, key: &str) -> Result<StoredObject> {
		let request = HttpRequest::get(self.object_url(bucket, key)?);
		let response = self
			.http_client
			.execute(ctx, request, LogRedaction { request: false, response: true })
			.await
			.map_err(|err| match err {
				Error::Transport(source) => ObjectStoreError::Transport {
					bucket: bucket.to_owned(),
					key: key.to_owned(),
					source,
				}
				.into(),
				other => other,
			})?;

		match response.status {
			200 => Ok(StoredObject::new(response.body.clone(), response.header("content-type"))),
			404 => Err(ObjectStoreError::not_found(bucket, key).into()),
			status => Err(ObjectStoreError::Backend {
				bucket: bucket.to_owned(),
				key: key.to_owned(),
				message: format!("unexpected status {status}"),
			}
			.into()),
		}
	}
}
#[cfg(feature = "reqwest")]
impl GcsObjectStore<crate::http::ReqwestIntegrationClient> {
	/// Creates a store that authenticates with `bearer_token` against the production endpoint.
	pub fn with_bearer_token(bearer_token: impl AsRef<str>) -> Result<Self> {
		let client = crate::http::ReqwestIntegrationClient::build()?.with_bearer_token(bearer_token);

		Ok(Self::new(client))
	}
}
impl<C> ObjectStore for GcsObjectStore<C>
where
	C: ?Sized + IntegrationClient,
{
	fn read<'a>(
		&'a self,
		ctx: &'a Context,
		bucket: &'a str,
		key: &'a str,
	) -> StoreFuture<'a, StoredObject> {
		Box::pin(self.read_object(ctx, bucket, key))
	}
}
impl<C> Debug for GcsObjectStore<C>
where
	C: ?Sized + IntegrationClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("GcsObjectStore").field("base_url", &self.base_url).finish()
	}
}
