//! Thread-safe in-memory [`ObjectStore`] implementation for local development and tests.

// std
use std::{
	sync::atomic::{AtomicUsize, Ordering},
	time::Duration as StdDuration,
};
// self
use crate::{
	_prelude::*,
	context::Context,
	store::{ObjectStore, ObjectStoreError, StoreFuture, StoredObject},
};

type ObjectMap = Arc<RwLock<HashMap<(String, String), StoredObject>>>;

/// Storage backend that keeps objects in-process, optionally simulating read latency.
#[derive(Clone, Debug, Default)]
pub struct MemoryObjectStore {
	objects: ObjectMap,
	latency: HashMap<String, StdDuration>,
	reads: Arc<AtomicUsize>,
}
impl MemoryObjectStore {
	/// Stores `bytes` under `bucket`/`key`, replacing any previous object.
	pub fn insert(
		&self,
		bucket: impl Into<String>,
		key: impl Into<String>,
		bytes: impl Into<Vec<u8>>,
		content_type: Option<&str>,
	) {
		self.objects
			.write()
			.insert((bucket.into(), key.into()), StoredObject::new(bytes, content_type));
	}

	/// Builder-style variant of [`MemoryObjectStore::insert`].
	pub fn with_object(
		self,
		bucket: impl Into<String>,
		key: impl Into<String>,
		bytes: impl Into<Vec<u8>>,
		content_type: Option<&str>,
	) -> Self {
		self.insert(bucket, key, bytes, content_type);

		self
	}

	/// Delays every read of `key` by `latency`.
	pub fn with_latency(mut self, key: impl Into<String>, latency: StdDuration) -> Self {
		self.latency.insert(key.into(), latency);

		self
	}

	/// Returns the number of reads served so far, including misses.
	pub fn reads(&self) -> usize {
		self.reads.load(Ordering::Relaxed)
	}

	fn read_now(&self, bucket: &str, key: &str) -> Result<StoredObject, ObjectStoreError> {
		self.reads.fetch_add(1, Ordering::Relaxed);
		self.objects
			.read()
			.get(&(bucket.to_owned(), key.to_owned()))
			.cloned()
			.ok_or_else(|| ObjectStoreError::not_found(bucket, key))
	}
}
impl ObjectStore for MemoryObjectStore {
	fn read<'a>(
		&'a self,
		ctx: &'a Context,
		bucket: &'a str,
		key: &'a str,
	) -> StoreFuture<'a, StoredObject> {
		let latency = self.latency.get(key).copied();

		Box::pin(ctx.run(async move {
			if let Some(latency) = latency {
				tokio::time::sleep(latency).await;
			}

			Ok(self.read_now(bucket, key)?)
		}))
	}
}
