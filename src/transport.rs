//! Transport primitives for authenticated API calls.
//!
//! [`HttpTransport`] is the client's only dependency on an HTTP stack. The dispatcher and the
//! refresh coordinator hand it fully built [`HttpRequest`] values (headers already injected)
//! together with the configured timeout, and receive raw [`HttpResponse`] values back. Any
//! failure to obtain a response, including an elapsed timeout, is a [`TransportError`].

// self
use crate::{_prelude::*, error::TransportError};

/// Outbound request handed to a transport.
pub type HttpRequest = http::Request<Vec<u8>>;
/// Response returned by a transport.
pub type HttpResponse = http::Response<Vec<u8>>;
/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP stacks capable of executing API calls.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared by the
/// dispatcher and the refresh coordinator behind an `Arc`. Implementations must send
/// credentials-bearing cookies with every call, since the refresh endpoint authenticates
/// through them rather than through the bearer header.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Executes `request`, failing with [`TransportError::Timeout`] once `timeout` elapses.
	fn execute(&self, request: HttpRequest, timeout: StdDuration) -> TransportFuture<'_>;
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// The default client keeps a cookie store (the refresh endpoint relies on server-set
/// cookies) and does not follow redirects, so a redirect to a login page surfaces as a
/// status instead of a silently swapped response.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Builds the default cookie-aware client.
	pub fn new() -> Result<Self, crate::error::ConfigError> {
		let client = ReqwestClient::builder()
			.cookie_store(true)
			.redirect(reqwest::redirect::Policy::none())
			.build()?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	///
	/// The client should be built with `cookie_store(true)` for the refresh flow to work.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestHttpClient {
	fn execute(&self, request: HttpRequest, timeout: StdDuration) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let url = request.uri().to_string();
			let mut request = reqwest::Request::try_from(request)
				.map_err(|e| TransportError::network(url.clone(), e))?;

			*request.timeout_mut() = Some(timeout);

			let response = client
				.execute(request)
				.await
				.map_err(|e| map_reqwest_error(&url, timeout, e))?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await.map_err(|e| map_reqwest_error(&url, timeout, e))?;
			let mut mapped = HttpResponse::new(body.to_vec());

			*mapped.status_mut() = status;
			*mapped.headers_mut() = headers;

			Ok(mapped)
		})
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(url: &str, timeout: StdDuration, e: ReqwestError) -> TransportError {
	if e.is_timeout() {
		TransportError::Timeout { url: url.to_owned(), timeout }
	} else {
		TransportError::network(url, e)
	}
}
