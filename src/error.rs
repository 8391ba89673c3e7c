//! Client-level error types shared across the dispatcher, refresh coordinator, and stores.

// self
use crate::{_prelude::*, refresh::RefreshFailure};

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Token store failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// No response was received (timeout, connectivity).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Session refresh failed; the session has been terminated.
	#[error(transparent)]
	Refresh(#[from] RefreshFailure),

	/// Server answered with an error status that is not recovered locally.
	#[error("Server responded with HTTP {status}.")]
	Http {
		/// HTTP status code.
		status: u16,
		/// Response body decoded as lossy UTF-8.
		body: String,
	},
	/// Response body could not be decoded into the expected shape.
	#[error("Response body could not be decoded.")]
	ResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code of the response.
		status: u16,
	},
	/// A login or registration response carried no usable token.
	#[error("The {endpoint} response did not contain an access token.")]
	MissingToken {
		/// Endpoint label.
		endpoint: &'static str,
	},
	/// Request was still rejected with 401 after replaying it with a refreshed token.
	#[error("Session expired; the request was rejected after a token refresh.")]
	SessionExpired,
}
impl Error {
	/// Returns the HTTP status carried by the error, when one was received.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Http { status, .. } | Self::ResponseParse { status, .. } => Some(*status),
			Self::SessionExpired => Some(401),
			_ => None,
		}
	}

	/// Returns `true` when the request cannot succeed without the user signing in again.
	///
	/// Only [`Error::Refresh`] failures end the session and trip the guard. A
	/// [`Error::SessionExpired`] replay rejection leaves the session in place.
	pub fn is_session_terminal(&self) -> bool {
		match self {
			Self::SessionExpired => true,
			Self::Refresh(failure) => failure.is_terminal(),
			_ => false,
		}
	}
}

/// Configuration and request-construction failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] http::Error),
	/// Base URL is missing from the environment.
	#[error("Environment variable `{var}` is not set.")]
	MissingBaseUrl {
		/// Variable that was consulted.
		var: &'static str,
	},
	/// Base URL or a request path cannot be parsed.
	#[error("URL `{value}` is invalid.")]
	InvalidUrl {
		/// Raw value that failed to parse.
		value: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Base URL uses a scheme other than http(s) or cannot carry paths.
	#[error("Base URL `{url}` must be an absolute http(s) URL.")]
	UnsupportedBaseUrl {
		/// Rejected URL.
		url: String,
	},
	/// An endpoint path was left empty.
	#[error("The {endpoint} endpoint path cannot be empty.")]
	EmptyEndpoint {
		/// Endpoint label.
		endpoint: &'static str,
	},
	/// Request timeout must be positive.
	#[error("Request timeout must be greater than zero.")]
	ZeroTimeout,
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	BodySerialize(#[source] serde_json::Error),
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

/// Transport-level failures: no HTTP response was received.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {url}.")]
	Network {
		/// Target URL of the failed call.
		url: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The call exceeded the configured request timeout.
	#[error("Request to {url} timed out after {timeout:?}.")]
	Timeout {
		/// Target URL of the failed call.
		url: String,
		/// Timeout that elapsed.
		timeout: StdDuration,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(url: impl Into<String>, src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { url: url.into(), source: Box::new(src) }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn session_expired_reports_unauthorized_status() {
		assert_eq!(Error::SessionExpired.status(), Some(401));
		assert!(Error::SessionExpired.is_session_terminal());
	}

	#[test]
	fn http_errors_are_not_terminal() {
		let err = Error::Http { status: 503, body: "maintenance".into() };

		assert_eq!(err.status(), Some(503));
		assert!(!err.is_session_terminal());
		assert_eq!(err.to_string(), "Server responded with HTTP 503.");
	}

	#[test]
	fn abandoned_refresh_is_not_terminal() {
		assert!(!Error::from(RefreshFailure::Abandoned).is_session_terminal());
		assert!(Error::from(RefreshFailure::MissingToken).is_session_terminal());
	}

	#[test]
	fn timeout_renders_target() {
		let err = TransportError::Timeout {
			url: "https://api.example.com/auth/me".into(),
			timeout: StdDuration::from_secs(15),
		};

		assert_eq!(err.to_string(), "Request to https://api.example.com/auth/me timed out after 15s.");
	}
}
