//! Request dispatch: bearer injection, cache busting, and 401 recovery.
//!
//! Every call made on behalf of the application goes through [`RequestDispatcher::send`].
//! Requests to the public auth endpoints travel untouched. All other requests carry the
//! current bearer token; a 401 on the first attempt hands control to the
//! [`RefreshCoordinator`] and, once a new token is available, the request is replayed exactly
//! once. A second 401 ends as [`Error::SessionExpired`].

// crates.io
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::AccessToken,
	config::ClientConfig,
	error::ConfigError,
	obs::OpSpan,
	refresh::RefreshCoordinator,
	store::TokenStore,
	transport::{HttpRequest, HttpResponse, HttpTransport},
};

/// Immutable description of an API call, replayable once with a new bearer header.
#[derive(Clone, Debug)]
pub struct RequestDescriptor {
	method: Method,
	target: String,
	query: Vec<(String, String)>,
	headers: HeaderMap,
	body: Vec<u8>,
	attempt: u8,
}
impl RequestDescriptor {
	/// Highest attempt index a descriptor may reach; attempt 0 is the original send.
	pub const MAX_ATTEMPT: u8 = 1;

	/// Creates a descriptor for `method` against `target` (a path relative to the base URL,
	/// or an absolute URL).
	pub fn new(method: Method, target: impl Into<String>) -> Self {
		Self {
			method,
			target: target.into(),
			query: Vec::new(),
			headers: HeaderMap::new(),
			body: Vec::new(),
			attempt: 0,
		}
	}

	/// Creates a `GET` descriptor.
	pub fn get(target: impl Into<String>) -> Self {
		Self::new(Method::GET, target)
	}

	/// Creates a `POST` descriptor.
	pub fn post(target: impl Into<String>) -> Self {
		Self::new(Method::POST, target)
	}

	/// Creates a `PUT` descriptor.
	pub fn put(target: impl Into<String>) -> Self {
		Self::new(Method::PUT, target)
	}

	/// Creates a `PATCH` descriptor.
	pub fn patch(target: impl Into<String>) -> Self {
		Self::new(Method::PATCH, target)
	}

	/// Creates a `DELETE` descriptor.
	pub fn delete(target: impl Into<String>) -> Self {
		Self::new(Method::DELETE, target)
	}

	/// Adds a header. An `Authorization` header is replaced by the dispatcher on non-public
	/// endpoints whenever a token is available.
	pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.append(name, value);

		self
	}

	/// Appends a query parameter.
	pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.push((key.into(), value.into()));

		self
	}

	/// Sets a raw body.
	pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = body.into();

		self
	}

	/// Serializes `body` as JSON and sets the matching content type.
	pub fn json<B>(mut self, body: &B) -> Result<Self, ConfigError>
	where
		B: ?Sized + Serialize,
	{
		self.body = serde_json::to_vec(body).map_err(ConfigError::BodySerialize)?;
		self.headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

		Ok(self)
	}

	/// HTTP method.
	pub fn method(&self) -> &Method {
		&self.method
	}

	/// Request target as supplied by the caller.
	pub fn target(&self) -> &str {
		&self.target
	}

	/// Attempt index: 0 for the original send, 1 for the replay.
	pub fn attempt(&self) -> u8 {
		self.attempt
	}

	/// Returns `true` for the replayed copy of a request.
	pub fn is_replay(&self) -> bool {
		self.attempt > 0
	}

	/// Returns `true` for methods that never change server state and may be cache-busted.
	pub fn is_read_only(&self) -> bool {
		matches!(self.method, Method::GET | Method::HEAD)
	}

	/// Returns the replay copy of this request, or `None` once the replay budget is spent.
	pub fn replay(&self) -> Option<Self> {
		if self.attempt >= Self::MAX_ATTEMPT {
			return None;
		}

		Some(Self { attempt: self.attempt + 1, ..self.clone() })
	}

	/// Builds the wire request for `url`, injecting `token` as the bearer header.
	pub(crate) fn build(
		&self,
		config: &ClientConfig,
		mut url: Url,
		token: Option<&AccessToken>,
	) -> Result<HttpRequest, ConfigError> {
		if !self.query.is_empty() {
			url.query_pairs_mut().extend_pairs(self.query.iter());
		}
		if let Some(param) = config.cache_bust_param.as_deref().filter(|_| self.is_read_only()) {
			let stamp = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;

			url.query_pairs_mut().append_pair(param, &stamp.to_string());
		}

		let mut headers = self.headers.clone();

		if let Some(token) = token {
			let mut value =
				HeaderValue::from_str(&token.bearer_value()).map_err(http::Error::from)?;

			value.set_sensitive(true);
			headers.insert(header::AUTHORIZATION, value);
		}

		let mut request = http::Request::builder()
			.method(self.method.clone())
			.uri(url.as_str())
			.body(self.body.clone())?;

		*request.headers_mut() = headers;

		Ok(request)
	}
}

/// Successful (non-error status) response returned by the dispatcher.
#[derive(Clone, Debug)]
pub struct ApiResponse(HttpResponse);
impl ApiResponse {
	/// HTTP status.
	pub fn status(&self) -> StatusCode {
		self.0.status()
	}

	/// Response headers.
	pub fn headers(&self) -> &HeaderMap {
		self.0.headers()
	}

	/// Raw body bytes.
	pub fn body(&self) -> &[u8] {
		self.0.body()
	}

	/// Body decoded as lossy UTF-8.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(self.0.body()).into_owned()
	}

	/// Decodes the body as JSON.
	pub fn json<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		decode_json(self.0.body())
			.map_err(|source| Error::ResponseParse { source, status: self.status().as_u16() })
	}

	/// Returns the underlying response.
	pub fn into_inner(self) -> HttpResponse {
		self.0
	}

	fn from_http(response: HttpResponse) -> Result<Self> {
		let status = response.status();

		if status.is_client_error() || status.is_server_error() {
			Err(Error::Http {
				status: status.as_u16(),
				body: String::from_utf8_lossy(response.body()).into_owned(),
			})
		} else {
			Ok(Self(response))
		}
	}
}

/// Sends requests, attaching credentials and recovering from expired tokens.
pub struct RequestDispatcher<T>
where
	T: ?Sized + HttpTransport,
{
	transport: Arc<T>,
	config: Arc<ClientConfig>,
	store: Arc<dyn TokenStore>,
	coordinator: Arc<RefreshCoordinator<T>>,
}
impl<T> RequestDispatcher<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a dispatcher sharing `coordinator` with every other dispatcher of the client.
	pub fn new(
		transport: Arc<T>,
		config: Arc<ClientConfig>,
		store: Arc<dyn TokenStore>,
		coordinator: Arc<RefreshCoordinator<T>>,
	) -> Self {
		Self { transport, config, store, coordinator }
	}

	/// Returns the refresh coordinator this dispatcher delegates 401s to.
	pub fn coordinator(&self) -> &Arc<RefreshCoordinator<T>> {
		&self.coordinator
	}

	/// Sends `descriptor`, replaying it once with a refreshed token after a 401.
	///
	/// Transport failures and error statuses other than 401 are returned unchanged. A 401
	/// from a public auth endpoint is an ordinary [`Error::Http`].
	pub async fn send(&self, descriptor: RequestDescriptor) -> Result<ApiResponse> {
		let span = OpSpan::request(&descriptor);
		let result = span.instrument(self.dispatch(descriptor)).await;

		span.finish(&result);

		result
	}

	async fn dispatch(&self, descriptor: RequestDescriptor) -> Result<ApiResponse> {
		let url = self.config.resolve(descriptor.target())?;

		if self.config.is_public(&url) {
			let response = self.execute(&descriptor, url, None).await?;

			return ApiResponse::from_http(response);
		}

		let token = self.store.get();
		let response = self.execute(&descriptor, url.clone(), token.as_ref()).await?;

		if response.status() != StatusCode::UNAUTHORIZED {
			return ApiResponse::from_http(response);
		}

		let Some(replay) = descriptor.replay() else {
			return Err(Error::SessionExpired);
		};

		#[cfg(feature = "tracing")]
		tracing::debug!(url = %url, "request unauthorized; awaiting refresh");

		let token = self.coordinator.request_refresh().await?;
		let response = self.execute(&replay, url, Some(&token)).await?;

		if response.status() == StatusCode::UNAUTHORIZED {
			return Err(Error::SessionExpired);
		}

		ApiResponse::from_http(response)
	}

	async fn execute(
		&self,
		descriptor: &RequestDescriptor,
		url: Url,
		token: Option<&AccessToken>,
	) -> Result<HttpResponse> {
		let request = descriptor.build(&self.config, url, token)?;

		Ok(self.transport.execute(request, self.config.request_timeout).await?)
	}
}
impl<T> Debug for RequestDispatcher<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestDispatcher")
			.field("base_url", &self.config.base_url.as_str())
			.field("coordinator", &self.coordinator)
			.finish()
	}
}

/// Decodes a JSON body, reporting the path of the first mismatch.
pub(crate) fn decode_json<T>(
	bytes: &[u8],
) -> Result<T, serde_path_to_error::Error<serde_json::Error>>
where
	T: DeserializeOwned,
{
	let mut deserializer = serde_json::Deserializer::from_slice(bytes);

	serde_path_to_error::deserialize(&mut deserializer)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn config() -> ClientConfig {
		ClientConfig::builder("https://api.example.com/v1")
			.build()
			.expect("Test configuration should build.")
	}

	fn build(
		descriptor: &RequestDescriptor,
		config: &ClientConfig,
		token: Option<&AccessToken>,
	) -> HttpRequest {
		let url = config.resolve(descriptor.target()).expect("Target should resolve.");

		descriptor.build(config, url, token).expect("Request should build.")
	}

	#[test]
	fn bearer_header_is_injected_and_marked_sensitive() {
		let config = config();
		let token = AccessToken::new("t1");
		let request = build(&RequestDescriptor::post("orders"), &config, Some(&token));
		let value = &request.headers()[header::AUTHORIZATION];

		assert_eq!(value, "Bearer t1");
		assert!(value.is_sensitive());
		assert_eq!(request.uri().to_string(), "https://api.example.com/v1/orders");
	}

	#[test]
	fn reads_are_cache_busted_and_writes_are_not() {
		let config = config();
		let read = build(&RequestDescriptor::get("products").query("page", "2"), &config, None);
		let write = build(&RequestDescriptor::delete("products/9"), &config, None);
		let query = read.uri().query().expect("Reads should carry a query string.");

		assert!(query.starts_with("page=2&_t="), "Unexpected query: {query}.");
		assert!(write.uri().query().is_none());
	}

	#[test]
	fn cache_busting_respects_configuration() {
		let config = ClientConfig::builder("https://api.example.com")
			.without_cache_busting()
			.build()
			.expect("Test configuration should build.");
		let request = build(&RequestDescriptor::get("auth/me"), &config, None);

		assert!(request.uri().query().is_none());
	}

	#[test]
	fn json_bodies_set_content_type() {
		let descriptor = RequestDescriptor::post("orders")
			.json(&serde_json::json!({ "sku": "A-1", "qty": 2 }))
			.expect("JSON body should serialize.");
		let request = build(&descriptor, &config(), None);

		assert_eq!(request.headers()[header::CONTENT_TYPE], "application/json");
		assert_eq!(request.body().as_slice(), br#"{"qty":2,"sku":"A-1"}"#);
	}

	#[test]
	fn replay_budget_is_one() {
		let original = RequestDescriptor::get("auth/me");
		let replay = original.replay().expect("Original should be replayable.");

		assert!(!original.is_replay());
		assert!(replay.is_replay());
		assert_eq!(replay.attempt(), RequestDescriptor::MAX_ATTEMPT);
		assert!(replay.replay().is_none());
	}

	#[test]
	fn error_statuses_become_http_errors() {
		let mut response = HttpResponse::new(b"nope".to_vec());

		*response.status_mut() = StatusCode::FORBIDDEN;

		match ApiResponse::from_http(response) {
			Err(Error::Http { status, body }) => {
				assert_eq!(status, 403);
				assert_eq!(body, "nope");
			},
			other => panic!("Unexpected result: {other:?}."),
		}
	}

	#[test]
	fn json_decode_failures_report_the_path() {
		let response = ApiResponse(HttpResponse::new(br#"{"data":{"access_token":5}}"#.to_vec()));
		let err = response
			.json::<crate::auth::AuthPayload>()
			.expect_err("Numeric tokens must be rejected.");

		match err {
			Error::ResponseParse { source, status } => {
				assert_eq!(status, 200);
				assert_eq!(source.path().to_string(), "data.access_token");
			},
			other => panic!("Unexpected error: {other:?}."),
		}
	}
}
