//! Client facade tying the dispatcher, refresh coordinator, token store, and session guard
//! together behind the login/register/logout surface used by the application.

// crates.io
use http::HeaderValue;
// self
use crate::{
	_prelude::*,
	auth::{
		AuthPayload, AuthSession, Credentials, Registration, UserProfile,
		credentials::ProfileEnvelope,
	},
	config::ClientConfig,
	dispatch::{ApiResponse, RequestDescriptor, RequestDispatcher},
	obs::{OpKind, OpSpan},
	refresh::{RefreshCoordinator, RefreshMetrics},
	session::{LoginRedirect, SessionEvent, SessionGuard, SessionObserver, SubscriptionId},
	store::TokenStore,
	transport::HttpTransport,
};
#[cfg(feature = "reqwest")]
use crate::{session::NoRedirect, store::MemoryTokenStore, transport::ReqwestHttpClient};

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport.
pub type ReqwestAuthClient = AuthClient<ReqwestHttpClient>;

/// Authenticated API client.
///
/// One client owns one session: a single token store, a single refresh coordinator, and a
/// single session guard shared by every request sent through it. Clones share all of them.
pub struct AuthClient<T>
where
	T: ?Sized + HttpTransport,
{
	config: Arc<ClientConfig>,
	store: Arc<dyn TokenStore>,
	guard: Arc<SessionGuard>,
	dispatcher: Arc<RequestDispatcher<T>>,
	user: Arc<RwLock<Option<UserProfile>>>,
}
impl<T> AuthClient<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a client over a caller-provided transport, token store, and navigation hook.
	pub fn with_transport(
		config: ClientConfig,
		transport: impl Into<Arc<T>>,
		store: Arc<dyn TokenStore>,
		redirect: Arc<dyn LoginRedirect>,
	) -> Self {
		let config = Arc::new(config);
		let transport = transport.into();
		let guard = Arc::new(SessionGuard::new(config.login_route.clone(), redirect));
		let user = Arc::new(RwLock::new(None));

		{
			let user = Arc::clone(&user);

			guard.on_cleanup(move || *user.write() = None);
		}

		let coordinator = Arc::new(RefreshCoordinator::new(
			Arc::clone(&transport),
			Arc::clone(&config),
			Arc::clone(&store),
			Arc::clone(&guard),
		));
		let dispatcher = Arc::new(RequestDispatcher::new(
			transport,
			Arc::clone(&config),
			Arc::clone(&store),
			coordinator,
		));

		Self { config, store, guard, dispatcher, user }
	}

	/// Client configuration.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Token store backing this client.
	pub fn store(&self) -> &Arc<dyn TokenStore> {
		&self.store
	}

	/// Session guard backing this client.
	pub fn guard(&self) -> &Arc<SessionGuard> {
		&self.guard
	}

	/// Refresh coordinator shared by every request of this client.
	pub fn coordinator(&self) -> &Arc<RefreshCoordinator<T>> {
		self.dispatcher.coordinator()
	}

	/// Refresh counters.
	pub fn metrics(&self) -> &RefreshMetrics {
		self.coordinator().metrics()
	}

	/// Returns `true` iff the store holds a non-blank token.
	pub fn is_authenticated(&self) -> bool {
		self.store.is_authenticated()
	}

	/// Last user profile received from login, registration, or [`me`](Self::me).
	pub fn current_user(&self) -> Option<UserProfile> {
		self.user.read().clone()
	}

	/// Registers a session observer.
	pub fn subscribe(&self, observer: Arc<dyn SessionObserver>) -> SubscriptionId {
		self.guard.subscribe(observer)
	}

	/// Removes a session observer.
	pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
		self.guard.unsubscribe(id)
	}

	/// Sends an arbitrary API request through the dispatcher.
	pub async fn send(&self, descriptor: RequestDescriptor) -> Result<ApiResponse> {
		self.dispatcher.send(descriptor).await
	}

	/// Logs in and stores the issued token.
	pub async fn login(&self, credentials: &Credentials) -> Result<AuthSession> {
		let span = OpSpan::start(OpKind::Login, "login");
		let result = span.instrument(self.login_inner(credentials)).await;

		span.finish(&result);

		result
	}

	/// Registers an account.
	///
	/// Returns `Ok(None)` when the backend created the account without issuing a token; the
	/// caller is expected to log in afterwards.
	pub async fn register(&self, registration: &Registration) -> Result<Option<AuthSession>> {
		let span = OpSpan::start(OpKind::Register, "register");
		let result = span.instrument(self.register_inner(registration)).await;

		span.finish(&result);

		result
	}

	/// Logs out.
	///
	/// Local session state is cleared and observers are notified whether or not the server
	/// call succeeds; the server outcome is still returned.
	pub async fn logout(&self) -> Result<()> {
		let span = OpSpan::start(OpKind::Logout, "logout");
		let descriptor = RequestDescriptor::post(self.config.endpoints.logout.as_str());
		let result = span.instrument(self.send(accept_json(descriptor))).await.map(|_| ());

		self.store.clear();
		*self.user.write() = None;
		self.guard.notify(&SessionEvent::LoggedOut);

		span.finish(&result);

		result
	}

	/// Fetches the current user and caches it.
	pub async fn me(&self) -> Result<UserProfile> {
		let span = OpSpan::start(OpKind::Profile, "me");
		let result = span.instrument(self.me_inner()).await;

		span.finish(&result);

		result
	}

	async fn login_inner(&self, credentials: &Credentials) -> Result<AuthSession> {
		let descriptor =
			RequestDescriptor::post(self.config.endpoints.login.as_str()).json(credentials)?;
		let payload: AuthPayload = self.send(accept_json(descriptor)).await?.json()?;

		self.start_session(payload).ok_or(Error::MissingToken { endpoint: "login" })
	}

	async fn register_inner(&self, registration: &Registration) -> Result<Option<AuthSession>> {
		let descriptor =
			RequestDescriptor::post(self.config.endpoints.register.as_str()).json(registration)?;
		let response = self.send(accept_json(descriptor)).await?;

		if response.body().iter().all(u8::is_ascii_whitespace) {
			return Ok(None);
		}

		Ok(self.start_session(response.json()?))
	}

	async fn me_inner(&self) -> Result<UserProfile> {
		let descriptor = RequestDescriptor::get(self.config.endpoints.me.as_str());
		let envelope: ProfileEnvelope = self.send(accept_json(descriptor)).await?.json()?;
		let user = envelope.into_profile();

		*self.user.write() = Some(user.clone());

		Ok(user)
	}

	fn start_session(&self, payload: AuthPayload) -> Option<AuthSession> {
		let token = payload.token()?;
		let user = payload.into_user();

		self.store.set(token.clone());
		*self.user.write() = user.clone();
		self.guard.rearm();
		self.guard.notify(&SessionEvent::LoggedIn);

		#[cfg(feature = "tracing")]
		tracing::debug!(user = ?user.as_ref().map(|user| user.id.as_str()), "session started");

		Some(AuthSession { token, user })
	}
}
#[cfg(feature = "reqwest")]
impl AuthClient<ReqwestHttpClient> {
	/// Creates a client with the default cookie-aware reqwest transport, an in-memory token
	/// store, and no navigation hook.
	pub fn new(config: ClientConfig) -> Result<Self> {
		Ok(Self::with_transport(
			config,
			ReqwestHttpClient::new()?,
			Arc::new(MemoryTokenStore::default()),
			Arc::new(NoRedirect),
		))
	}
}
impl<T> Clone for AuthClient<T>
where
	T: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			config: Arc::clone(&self.config),
			store: Arc::clone(&self.store),
			guard: Arc::clone(&self.guard),
			dispatcher: Arc::clone(&self.dispatcher),
			user: Arc::clone(&self.user),
		}
	}
}
impl<T> Debug for AuthClient<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthClient")
			.field("base_url", &self.config.base_url.as_str())
			.field("authenticated", &self.is_authenticated())
			.field("guard", &self.guard)
			.finish()
	}
}

fn accept_json(descriptor: RequestDescriptor) -> RequestDescriptor {
	descriptor.header(http::header::ACCEPT, HeaderValue::from_static("application/json"))
}
