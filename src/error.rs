//! Platform-level error types shared by the certificate cache, token verifier, pagination
//! parser, and shutdown coordinator.

// self
use crate::{_prelude::*, store::ObjectStoreError};

/// Platform-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed error used where collaborators bring their own error types.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical platform error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Object store failure carrying bucket/key context.
	#[error(transparent)]
	ObjectStore(#[from] ObjectStoreError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// One or more required certificates could not be loaded.
	///
	/// The source is the last per-issuer failure observed while draining the fetches; every
	/// individual failure was logged as it arrived.
	#[error("Failed to load {failed} of {requested} required certificates.")]
	CacheAggregation {
		/// Number of issuers that failed.
		failed: usize,
		/// Number of distinct issuers requested.
		requested: usize,
		/// Issuers whose fetch reported a failure.
		failed_issuers: Vec<String>,
		/// Last underlying failure.
		#[source]
		source: Box<Error>,
	},
	/// Certificate lookup for an issuer that was never loaded.
	#[error("Certificate not found for issuer `{issuer}`.")]
	IssuerNotCached {
		/// Issuer that missed.
		issuer: String,
	},
	/// Token was rejected by the introspection endpoint or failed a policy check.
	#[error("Unauthorized: {reason}.")]
	Unauthorized {
		/// Human-readable reason; never contains an unredacted token.
		reason: String,
	},
	/// Introspection endpoint answered 502.
	#[error("Token introspection endpoint returned 502 Bad Gateway.")]
	UpstreamBadGateway,
	/// Introspection endpoint answered 504.
	#[error("Token introspection endpoint returned 504 Gateway Timeout.")]
	UpstreamGatewayTimeout,
	/// Introspection endpoint answered 503.
	#[error("Token introspection endpoint returned 503 Service Unavailable.")]
	UpstreamUnavailable,
	/// Introspection endpoint answered 200 with a body that could not be parsed.
	#[error("Token introspection endpoint returned a malformed response.")]
	MalformedIntrospectionResponse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Client-supplied request parameters were rejected.
	#[error("{message}")]
	BadRequest {
		/// Message surfaced to the client verbatim.
		message: String,
	},
	/// A spawned task panicked or was aborted before reporting.
	#[error("Background task failed to complete.")]
	TaskJoin {
		/// Join failure reported by the runtime.
		#[source]
		source: tokio::task::JoinError,
	},
	/// Termination signal handlers could not be installed.
	#[error("Failed to subscribe to termination signals.")]
	SignalSubscription {
		/// Runtime registration failure.
		#[source]
		source: std::io::Error,
	},
	/// The caller's context was cancelled.
	#[error("Operation was cancelled.")]
	Cancelled,
	/// The caller's context deadline elapsed.
	#[error("Operation exceeded its deadline.")]
	DeadlineExceeded,
}
impl Error {
	/// Builds a [`Error::BadRequest`] from a client-facing message.
	pub fn bad_request(message: impl Into<String>) -> Self {
		Self::BadRequest { message: message.into() }
	}

	/// Builds an [`Error::Unauthorized`] from a reason.
	pub fn unauthorized(reason: impl Into<String>) -> Self {
		Self::Unauthorized { reason: reason.into() }
	}

	/// Classifies the error into its public kind.
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::Config(_) => ErrorKind::ConfigurationInvalid,
			Self::ObjectStore(ObjectStoreError::NotFound { .. }) => ErrorKind::ObjectNotFound,
			Self::ObjectStore(_) => ErrorKind::ObjectStoreTransport,
			Self::Transport(_) => ErrorKind::Transport,
			Self::CacheAggregation { .. } => ErrorKind::CacheAggregationFailed,
			Self::IssuerNotCached { .. } => ErrorKind::IssuerNotCached,
			Self::Unauthorized { .. } => ErrorKind::Unauthorized,
			Self::UpstreamBadGateway => ErrorKind::UpstreamBadGateway,
			Self::UpstreamGatewayTimeout => ErrorKind::UpstreamGatewayTimeout,
			Self::UpstreamUnavailable => ErrorKind::UpstreamUnavailable,
			Self::MalformedIntrospectionResponse { .. } => ErrorKind::MalformedIntrospectionResponse,
			Self::BadRequest { .. } => ErrorKind::BadRequest,
			Self::TaskJoin { .. } | Self::SignalSubscription { .. } => ErrorKind::Internal,
			Self::Cancelled => ErrorKind::Cancelled,
			Self::DeadlineExceeded => ErrorKind::DeadlineExceeded,
		}
	}

	/// HTTP status a handler should answer with for this error.
	pub fn http_status(&self) -> u16 {
		self.kind().http_status()
	}
}
impl From<tokio::task::JoinError> for Error {
	fn from(source: tokio::task::JoinError) -> Self {
		Self::TaskJoin { source }
	}
}

/// Public error kinds, independent of the concrete variant that produced them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	/// Missing bucket, unknown environment, empty issuer, bad endpoint.
	ConfigurationInvalid,
	/// Object store reported that the object does not exist.
	ObjectNotFound,
	/// Object store failed for any other reason.
	ObjectStoreTransport,
	/// One or more certificate fetches failed.
	CacheAggregationFailed,
	/// Post-boot certificate lookup miss.
	IssuerNotCached,
	/// Token rejected.
	Unauthorized,
	/// Upstream 502.
	UpstreamBadGateway,
	/// Upstream 504.
	UpstreamGatewayTimeout,
	/// Upstream 503.
	UpstreamUnavailable,
	/// Introspection body could not be parsed.
	MalformedIntrospectionResponse,
	/// Client input rejected.
	BadRequest,
	/// Outbound transport failure.
	Transport,
	/// Caller cancelled.
	Cancelled,
	/// Caller deadline elapsed.
	DeadlineExceeded,
	/// Any other internal failure.
	Internal,
}
impl ErrorKind {
	/// Returns a stable label suitable for log or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::ConfigurationInvalid => "configuration_invalid",
			Self::ObjectNotFound => "object_not_found",
			Self::ObjectStoreTransport => "object_store_transport",
			Self::CacheAggregationFailed => "cache_aggregation_failed",
			Self::IssuerNotCached => "issuer_not_cached",
			Self::Unauthorized => "unauthorized",
			Self::UpstreamBadGateway => "upstream_bad_gateway",
			Self::UpstreamGatewayTimeout => "upstream_gateway_timeout",
			Self::UpstreamUnavailable => "upstream_unavailable",
			Self::MalformedIntrospectionResponse => "malformed_introspection_response",
			Self::BadRequest => "bad_request",
			Self::Transport => "transport",
			Self::Cancelled => "cancelled",
			Self::DeadlineExceeded => "deadline_exceeded",
			Self::Internal => "internal",
		}
	}

	/// Maps the kind to the HTTP status surfaced to clients.
	pub const fn http_status(self) -> u16 {
		match self {
			Self::BadRequest => 400,
			Self::Unauthorized => 401,
			Self::ObjectNotFound | Self::IssuerNotCached => 404,
			Self::Cancelled => 499,
			Self::UpstreamBadGateway => 502,
			Self::UpstreamUnavailable => 503,
			Self::UpstreamGatewayTimeout | Self::DeadlineExceeded => 504,
			_ => 500,
		}
	}
}
impl Display for ErrorKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Configuration and validation failures raised while booting platform components.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Certificate bucket name is missing.
	#[error("Certificate bucket name must not be empty.")]
	MissingBucket,
	/// Required issuer list contains an empty entry.
	#[error("Required issuer identifiers must not be empty.")]
	EmptyIssuer,
	/// Environment identifier is not one of the known environments.
	#[error("Unknown environment `{value}`; expected one of dev, stg, uat, prd.")]
	UnknownEnvironment {
		/// Rejected value.
		value: String,
	},
	/// Required environment variable is missing or blank.
	#[error("Environment variable `{name}` must be set.")]
	MissingVariable {
		/// Variable name.
		name: &'static str,
	},
	/// Configured URL cannot be parsed or extended.
	#[error("URL `{url}` is invalid.")]
	InvalidUrl {
		/// Offending URL text.
		url: String,
		/// Underlying parsing failure, when one is available.
		#[source]
		source: Option<url::ParseError>,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures reported by the HTTP stack.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling an integration endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn kinds_map_to_http_statuses() {
		assert_eq!(Error::bad_request("Not recognized: limit = x").http_status(), 400);
		assert_eq!(Error::unauthorized("audience mismatch").http_status(), 401);
		assert_eq!(Error::UpstreamBadGateway.http_status(), 502);
		assert_eq!(Error::UpstreamUnavailable.http_status(), 503);
		assert_eq!(Error::UpstreamGatewayTimeout.http_status(), 504);
		assert_eq!(Error::from(ConfigError::MissingBucket).http_status(), 500);

		let not_found = Error::from(ObjectStoreError::NotFound {
			bucket: "certs".into(),
			key: "iam_cert_dev.pem".into(),
		});

		assert_eq!(not_found.kind(), ErrorKind::ObjectNotFound);
		assert_eq!(not_found.http_status(), 404);
	}

	#[test]
	fn aggregation_preserves_cause_but_overrides_kind() {
		let cause = Error::from(ObjectStoreError::NotFound {
			bucket: "certs".into(),
			key: "gcp_cert_dev.pem".into(),
		});
		let aggregated = Error::CacheAggregation {
			failed: 1,
			requested: 2,
			failed_issuers: vec!["gcp".into()],
			source: Box::new(cause),
		};

		assert_eq!(aggregated.kind(), ErrorKind::CacheAggregationFailed);
		assert_eq!(aggregated.http_status(), 500);

		let source = StdError::source(&aggregated)
			.expect("Aggregated error should expose the last failure as its source.");

		assert!(source.to_string().contains("gcp_cert_dev.pem"));
	}

	#[test]
	fn bad_request_displays_message_verbatim() {
		let err = Error::bad_request("Not recognized: o = xyz");

		assert_eq!(err.to_string(), "Not recognized: o = xyz");
	}
}
