//! Object store contracts and built-in adapters used to bootstrap issuer certificates.

pub mod gcs;
pub mod memory;

pub use gcs::GcsObjectStore;
pub use memory::MemoryObjectStore;

// self
use crate::{_prelude::*, context::Context};

/// Boxed future returned by [`ObjectStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Read-only object storage contract.
pub trait ObjectStore
where
	Self: Send + Sync,
{
	/// Reads `key` from `bucket`, honoring the caller's cancellation and deadline.
	///
	/// A missing object must surface as [`ObjectStoreError::NotFound`] so callers can tell a
	/// missing artifact apart from a transport failure.
	fn read<'a>(
		&'a self,
		ctx: &'a Context,
		bucket: &'a str,
		key: &'a str,
	) -> StoreFuture<'a, StoredObject>;
}

/// Object payload returned by [`ObjectStore::read`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
	/// Raw object bytes.
	pub bytes: Vec<u8>,
	/// Content type recorded by the store, when known.
	pub content_type: Option<String>,
}
impl StoredObject {
	/// Creates an object payload.
	pub fn new(bytes: impl Into<Vec<u8>>, content_type: Option<&str>) -> Self {
		Self { bytes: bytes.into(), content_type: content_type.map(str::to_owned) }
	}
}

/// Error type produced by [`ObjectStore`] implementations, always carrying bucket/key context.
#[derive(Debug, ThisError)]
pub enum ObjectStoreError {
	/// The object does not exist.
	#[error("Object `{key}` does not exist in bucket `{bucket}`.")]
	NotFound {
		/// Bucket name.
		bucket: String,
		/// Object key.
		key: String,
	},
	/// The backend answered with an unexpected status or payload.
	#[error("Object store failed to read `{key}` from bucket `{bucket}`: {message}.")]
	Backend {
		/// Bucket name.
		bucket: String,
		/// Object key.
		key: String,
		/// Backend-supplied message.
		message: String,
	},
	/// The backend could not be reached.
	#[error("Object store transport failed while reading `{key}` from bucket `{bucket}`.")]
	Transport {
		/// Bucket name.
		bucket: String,
		/// Object key.
		key: String,
		/// Underlying transport failure.
		#[source]
		source: crate::error::TransportError,
	},
}
impl ObjectStoreError {
	/// Builds a [`ObjectStoreError::NotFound`] for `bucket`/`key`.
	pub fn not_found(bucket: &str, key: &str) -> Self {
		Self::NotFound { bucket: bucket.to_owned(), key: key.to_owned() }
	}

	/// Returns `true` when the object is missing.
	pub fn is_not_found(&self) -> bool {
		matches!(self, Self::NotFound { .. })
	}
}
