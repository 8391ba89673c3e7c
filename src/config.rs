//! Client configuration: base URL, auth endpoint paths, timeouts, and the login boundary.

// self
use crate::{_prelude::*, error::ConfigError};

/// Environment variable holding the API base URL.
pub const BASE_URL_ENV: &str = "BEARER_CLIENT_BASE_URL";

const BUILD_TIME_BASE_URL: Option<&str> = option_env!("BEARER_CLIENT_BASE_URL");

/// Paths (relative to the base URL) of the auth endpoints the client talks to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthEndpoints {
	/// Login endpoint; public.
	pub login: String,
	/// Registration endpoint; public.
	pub register: String,
	/// Refresh endpoint; public, and its failure is terminal.
	pub refresh: String,
	/// Current-user endpoint.
	pub me: String,
	/// Logout endpoint.
	pub logout: String,
}
impl Default for AuthEndpoints {
	fn default() -> Self {
		Self {
			login: "auth/login".into(),
			register: "auth/register".into(),
			refresh: "auth/refresh-token".into(),
			me: "auth/me".into(),
			logout: "auth/logout".into(),
		}
	}
}

/// Validated, immutable client configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
	/// Base URL every relative request path is joined onto; always ends with `/`.
	pub base_url: Url,
	/// Auth endpoint paths.
	pub endpoints: AuthEndpoints,
	/// Timeout applied to every network call (initial send, refresh, replay).
	pub request_timeout: StdDuration,
	/// Navigation target the session guard redirects to.
	pub login_route: String,
	/// Query parameter appended to read-only requests, if cache busting is enabled.
	pub cache_bust_param: Option<String>,
	public_paths: [String; 3],
}
impl ClientConfig {
	/// Default per-request timeout.
	pub const DEFAULT_TIMEOUT: StdDuration = StdDuration::from_secs(15);

	/// Creates a builder for the provided base URL.
	pub fn builder(base_url: impl Into<String>) -> ClientConfigBuilder {
		ClientConfigBuilder::new(base_url)
	}

	/// Builds a default configuration from [`BASE_URL_ENV`].
	///
	/// The value captured at compile time wins; the runtime environment is the fallback.
	pub fn from_env() -> Result<Self, ConfigError> {
		let base_url = match BUILD_TIME_BASE_URL {
			Some(value) => value.to_owned(),
			None => std::env::var(BASE_URL_ENV)
				.map_err(|_| ConfigError::MissingBaseUrl { var: BASE_URL_ENV })?,
		};

		Self::builder(base_url).build()
	}

	/// Resolves a request target: absolute URLs pass through, anything else is joined onto
	/// the base URL.
	pub fn resolve(&self, target: &str) -> Result<Url, ConfigError> {
		let parsed = match Url::parse(target) {
			Ok(url) => Ok(url),
			Err(url::ParseError::RelativeUrlWithoutBase) =>
				self.base_url.join(target.trim_start_matches('/')),
			Err(e) => Err(e),
		};

		parsed.map_err(|source| ConfigError::InvalidUrl { value: target.to_owned(), source })
	}

	/// Returns `true` when `url` targets login, register, or refresh.
	///
	/// These calls never carry the bearer header and their 401s are never intercepted.
	pub fn is_public(&self, url: &Url) -> bool {
		if url.origin() != self.base_url.origin() {
			return false;
		}

		let path = url.path().trim_end_matches('/');

		self.public_paths.iter().any(|public| public == path)
	}

	/// Resolves the absolute URL of one of the configured endpoints.
	pub fn endpoint_url(&self, select: fn(&AuthEndpoints) -> &str) -> Result<Url, ConfigError> {
		self.resolve(select(&self.endpoints))
	}
}

/// Builder for [`ClientConfig`] values.
#[derive(Debug)]
pub struct ClientConfigBuilder {
	base_url: String,
	endpoints: AuthEndpoints,
	request_timeout: StdDuration,
	login_route: String,
	cache_bust_param: Option<String>,
}
impl ClientConfigBuilder {
	/// Creates a builder seeded with defaults.
	pub fn new(base_url: impl Into<String>) -> Self {
		Self {
			base_url: base_url.into(),
			endpoints: AuthEndpoints::default(),
			request_timeout: ClientConfig::DEFAULT_TIMEOUT,
			login_route: "/login".into(),
			cache_bust_param: Some("_t".into()),
		}
	}

	/// Overrides every endpoint path.
	pub fn endpoints(mut self, endpoints: AuthEndpoints) -> Self {
		self.endpoints = endpoints;

		self
	}

	/// Overrides the refresh endpoint path.
	pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
		self.endpoints.refresh = path.into();

		self
	}

	/// Overrides the per-request timeout.
	pub fn request_timeout(mut self, timeout: StdDuration) -> Self {
		self.request_timeout = timeout;

		self
	}

	/// Overrides the login navigation boundary.
	pub fn login_route(mut self, route: impl Into<String>) -> Self {
		self.login_route = route.into();

		self
	}

	/// Overrides the cache-busting query parameter name.
	pub fn cache_bust_param(mut self, name: impl Into<String>) -> Self {
		self.cache_bust_param = Some(name.into());

		self
	}

	/// Disables cache busting on read-only requests.
	pub fn without_cache_busting(mut self) -> Self {
		self.cache_bust_param = None;

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		let mut base_url = Url::parse(self.base_url.trim())
			.map_err(|source| ConfigError::InvalidUrl { value: self.base_url.clone(), source })?;

		if !matches!(base_url.scheme(), "http" | "https") || base_url.cannot_be_a_base() {
			return Err(ConfigError::UnsupportedBaseUrl { url: base_url.to_string() });
		}
		if !base_url.path().ends_with('/') {
			let path = format!("{}/", base_url.path());

			base_url.set_path(&path);
		}
		if self.request_timeout.is_zero() {
			return Err(ConfigError::ZeroTimeout);
		}

		validate_endpoint("login", &self.endpoints.login)?;
		validate_endpoint("register", &self.endpoints.register)?;
		validate_endpoint("refresh", &self.endpoints.refresh)?;
		validate_endpoint("me", &self.endpoints.me)?;
		validate_endpoint("logout", &self.endpoints.logout)?;

		let public_path = |path: &str| -> Result<String, ConfigError> {
			let url = base_url
				.join(path.trim_start_matches('/'))
				.map_err(|source| ConfigError::InvalidUrl { value: path.to_owned(), source })?;

			Ok(url.path().trim_end_matches('/').to_owned())
		};
		let public_paths = [
			public_path(&self.endpoints.login)?,
			public_path(&self.endpoints.register)?,
			public_path(&self.endpoints.refresh)?,
		];

		Ok(ClientConfig {
			base_url,
			endpoints: self.endpoints,
			request_timeout: self.request_timeout,
			login_route: self.login_route,
			cache_bust_param: self.cache_bust_param.filter(|name| !name.is_empty()),
			public_paths,
		})
	}
}

fn validate_endpoint(name: &'static str, path: &str) -> Result<(), ConfigError> {
	if path.trim().trim_matches('/').is_empty() {
		Err(ConfigError::EmptyEndpoint { endpoint: name })
	} else {
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn config() -> ClientConfig {
		ClientConfig::builder("https://api.example.com/v1")
			.build()
			.expect("Default configuration should build.")
	}

	#[test]
	fn base_url_is_normalized_with_trailing_slash() {
		assert_eq!(config().base_url.as_str(), "https://api.example.com/v1/");
	}

	#[test]
	fn relative_targets_join_the_base_path() {
		let config = config();

		assert_eq!(
			config.resolve("/products?page=2").expect("Path should resolve.").as_str(),
			"https://api.example.com/v1/products?page=2",
		);
		assert_eq!(
			config.resolve("https://cdn.example.com/x").expect("URL should pass through.").as_str(),
			"https://cdn.example.com/x",
		);
	}

	#[test]
	fn auth_endpoints_are_public_but_profile_is_not() {
		let config = config();
		let url = |path: &str| config.resolve(path).expect("Path should resolve.");

		assert!(config.is_public(&url("auth/login")));
		assert!(config.is_public(&url("/auth/register/")));
		assert!(config.is_public(&url("auth/refresh-token")));
		assert!(!config.is_public(&url("auth/me")));
		assert!(!config.is_public(&url("auth/logout")));
		assert!(!config.is_public(
			&Url::parse("https://other.example.com/v1/auth/login").expect("URL should parse.")
		));
	}

	#[test]
	fn builder_rejects_invalid_settings() {
		assert!(matches!(
			ClientConfig::builder("ftp://files.example.com").build(),
			Err(ConfigError::UnsupportedBaseUrl { .. })
		));
		assert!(matches!(
			ClientConfig::builder("not a url").build(),
			Err(ConfigError::InvalidUrl { .. })
		));
		assert!(matches!(
			ClientConfig::builder("https://api.example.com").request_timeout(StdDuration::ZERO).build(),
			Err(ConfigError::ZeroTimeout)
		));
		assert!(matches!(
			ClientConfig::builder("https://api.example.com").refresh_path("/").build(),
			Err(ConfigError::EmptyEndpoint { endpoint: "refresh" })
		));
	}

	#[test]
	fn cache_busting_can_be_disabled() {
		let disabled = ClientConfig::builder("https://api.example.com")
			.without_cache_busting()
			.build()
			.expect("Configuration should build.");

		assert!(disabled.cache_bust_param.is_none());
		assert_eq!(config().cache_bust_param.as_deref(), Some("_t"));
	}
}
