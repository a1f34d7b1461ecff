// std
use std::{sync::Arc, time::Duration};
// crates.io
use httpmock::prelude::*;
use tracing::Level;
// self
use car_svc::{
	cert::{CertificateCache, CertificateCacheConfig},
	context::Context,
	env::EnvId,
	error::{Error, ErrorKind},
	http::ReqwestIntegrationClient,
	store::{GcsObjectStore, MemoryObjectStore, ObjectStoreError},
};

mod common;

const BUCKET: &str = "car-certs";

fn config(required: &[&str]) -> CertificateCacheConfig {
	CertificateCacheConfig::new(BUCKET, EnvId::Dev).with_required(required.iter().copied())
}

#[tokio::test]
async fn loads_deduplicated_issuers() {
	let store = Arc::new(
		MemoryObjectStore::default()
			.with_object(BUCKET, "iam_cert_dev.pem", "A", Some("application/x-pem-file"))
			.with_object(BUCKET, "gcp_cert_dev.pem", "B", None),
	);
	let cache =
		CertificateCache::load(&Context::background(), store.clone(), &config(&["iam", "gcp", "iam"]))
			.await
			.expect("Every required certificate is present.");

	assert_eq!(cache.for_issuer("iam").expect("iam should be cached."), b"A");
	assert_eq!(cache.for_issuer("gcp").expect("gcp should be cached."), b"B");
	assert_eq!(cache.issuers(), ["iam", "gcp"]);
	assert_eq!(cache.len(), 2);
	assert_eq!(store.reads(), 2, "Duplicate issuers must be fetched once.");

	let err = cache.for_issuer("x").expect_err("Unknown issuer must miss.");

	assert!(matches!(&err, Error::IssuerNotCached { issuer } if issuer == "x"));
	assert_eq!(err.http_status(), 404);
}

#[tokio::test]
async fn partial_failure_exposes_no_cache() {
	let store = Arc::new(MemoryObjectStore::default().with_object(
		BUCKET,
		"iam_cert_dev.pem",
		"A",
		None,
	));
	let logs = common::EventCollector::default();
	let _guard = logs.install();
	let err = CertificateCache::load(&Context::background(), store.clone(), &config(&["iam", "gcp"]))
		.await
		.expect_err("Missing gcp certificate must fail construction.");

	assert_eq!(err.kind(), ErrorKind::CacheAggregationFailed);
	assert_eq!(store.reads(), 2, "Both fetches must run to completion.");

	let fetched = logs.with_message("Issuer certificate fetched.");
	let failed = logs.with_message("Failed to load issuer certificate.");

	assert_eq!(fetched.len(), 1, "Events: {:?}.", logs.events());
	assert_eq!(fetched[0].level, Level::INFO);
	assert_eq!(fetched[0].field("issuer"), Some("iam"));
	assert_eq!(fetched[0].field("key"), Some("iam_cert_dev.pem"));
	assert_eq!(failed.len(), 1, "Events: {:?}.", logs.events());
	assert_eq!(failed[0].level, Level::ERROR);
	assert_eq!(failed[0].field("issuer"), Some("gcp"));
	assert_eq!(failed[0].field("kind"), Some("object_not_found"));
	assert!(logs.with_message("Issuer certificates loaded.").is_empty());

	match err {
		Error::CacheAggregation { failed, requested, failed_issuers, source } => {
			assert_eq!((failed, requested), (1, 2));
			assert_eq!(failed_issuers, ["gcp"]);
			assert_eq!(source.kind(), ErrorKind::ObjectNotFound);
			assert!(source.to_string().contains("gcp_cert_dev.pem"));
		},
		other => panic!("Unexpected error variant: {other:?}."),
	}
}

#[tokio::test(start_paused = true)]
async fn fetches_run_concurrently() {
	let latency = Duration::from_millis(200);
	let store = Arc::new(
		MemoryObjectStore::default()
			.with_object(BUCKET, "iam_cert_dev.pem", "A", None)
			.with_object(BUCKET, "gcp_cert_dev.pem", "B", None)
			.with_object(BUCKET, "aws_cert_dev.pem", "C", None)
			.with_latency("iam_cert_dev.pem", latency)
			.with_latency("gcp_cert_dev.pem", latency)
			.with_latency("aws_cert_dev.pem", latency),
	);
	let started = tokio::time::Instant::now();
	let cache =
		CertificateCache::load(&Context::background(), store, &config(&["iam", "gcp", "aws"]))
			.await
			.expect("Every required certificate is present.");

	assert_eq!(cache.len(), 3);
	assert!(started.elapsed() < latency * 2, "Fetches should overlap rather than run serially.");
}

#[tokio::test(start_paused = true)]
async fn deadline_fails_every_slow_fetch() {
	let store = Arc::new(
		MemoryObjectStore::default()
			.with_object(BUCKET, "iam_cert_dev.pem", "A", None)
			.with_object(BUCKET, "gcp_cert_dev.pem", "B", None)
			.with_latency("gcp_cert_dev.pem", Duration::from_secs(60)),
	);
	let ctx = Context::background().with_timeout(Duration::from_secs(5));
	let err = CertificateCache::load(&ctx, store, &config(&["iam", "gcp"]))
		.await
		.expect_err("Slow fetch must exceed the deadline.");

	match err {
		Error::CacheAggregation { failed_issuers, source, .. } => {
			assert_eq!(failed_issuers, ["gcp"]);
			assert!(matches!(*source, Error::DeadlineExceeded));
		},
		other => panic!("Unexpected error variant: {other:?}."),
	}
}

#[tokio::test]
async fn cancelled_context_fails_construction() {
	let store = Arc::new(MemoryObjectStore::default().with_object(
		BUCKET,
		"iam_cert_dev.pem",
		"A",
		None,
	));
	let ctx = Context::background();

	ctx.cancel();

	let err = CertificateCache::load(&ctx, store.clone(), &config(&["iam"]))
		.await
		.expect_err("Cancelled context must fail construction.");

	match err {
		Error::CacheAggregation { source, .. } => assert!(matches!(*source, Error::Cancelled)),
		other => panic!("Unexpected error variant: {other:?}."),
	}

	assert_eq!(store.reads(), 0);
}

#[tokio::test]
async fn loads_from_cloud_storage_media_endpoint() {
	let server = MockServer::start_async().await;
	let iam = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/storage/v1/b/car-certs/o/iam_cert_dev.pem")
				.query_param("alt", "media")
				.header("authorization", "Bearer svc-token");
			then.status(200).header("content-type", "application/x-pem-file").body("A");
		})
		.await;
	let gcp = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/storage/v1/b/car-certs/o/gcp_cert_dev.pem")
				.query_param("alt", "media");
			then.status(404).body(r#"{"error":{"code":404}}"#);
		})
		.await;
	let client = common::test_reqwest_integration_client().with_bearer_token("svc-token");
	let store = Arc::new(
		GcsObjectStore::<ReqwestIntegrationClient>::new(client).with_base_url(server.base_url()),
	);
	let ok = CertificateCache::load(&Context::background(), store.clone(), &config(&["iam"]))
		.await
		.expect("iam certificate should download.");

	assert_eq!(ok.for_issuer("iam").expect("iam should be cached."), b"A");

	let err = CertificateCache::load(&Context::background(), store, &config(&["iam", "gcp"]))
		.await
		.expect_err("Missing gcp object must fail construction.");

	match err {
		Error::CacheAggregation { source, .. } => assert!(matches!(
			*source,
			Error::ObjectStore(ObjectStoreError::NotFound { ref key, .. }) if key == "gcp_cert_dev.pem"
		)),
		other => panic!("Unexpected error variant: {other:?}."),
	}

	iam.assert_calls_async(2).await;
	gcp.assert_async().await;
}
