//! Single-flight session refresh with a waiter queue.
//!
//! [`RefreshCoordinator::request_refresh`] may be called by any number of requests at once.
//! The first caller to find the coordinator idle becomes the leader: it flips the state to
//! refreshing before its first await and performs the only network call of the episode.
//! Every caller that arrives while the refresh is in flight joins the waiter queue and
//! receives the leader's outcome. The queue is drained exactly once, in arrival order, when
//! the leader settles: all waiters resolve with the new token, or all reject with the same
//! failure. A failure also clears the token store and trips the [`SessionGuard`] once.

mod metrics;

pub use self::metrics::RefreshMetrics;

// std
use std::mem;
// crates.io
use futures::channel::oneshot;
use http::{Method, header};
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, AuthPayload},
	config::ClientConfig,
	dispatch,
	obs::{self, OpKind, OpOutcome, OpSpan},
	session::{SessionEvent, SessionGuard},
	store::TokenStore,
	transport::HttpTransport,
};

/// Why a refresh did not produce a token. One value is shared by every waiter of an episode.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RefreshFailure {
	/// Refresh endpoint answered with a non-success status.
	#[error("Refresh endpoint rejected the session with HTTP {status}.")]
	Rejected {
		/// HTTP status code.
		status: u16,
	},
	/// Refresh endpoint succeeded but returned no usable token.
	#[error("Refresh response did not contain a usable access token.")]
	MissingToken,
	/// Refresh response body could not be decoded.
	#[error("Refresh response could not be decoded: {message}.")]
	MalformedResponse {
		/// Decoder message.
		message: String,
	},
	/// No response was received from the refresh endpoint.
	#[error("Refresh call failed before a response arrived: {message}.")]
	Network {
		/// Transport message.
		message: String,
	},
	/// Refresh request could not be constructed from the configuration.
	#[error("Refresh request could not be built: {message}.")]
	Request {
		/// Construction failure message.
		message: String,
	},
	/// The caller driving the refresh was dropped before the call settled.
	#[error("The in-flight refresh was abandoned before it settled.")]
	Abandoned,
}
impl RefreshFailure {
	/// Returns `true` when the failure ended the session.
	///
	/// An abandoned refresh says nothing about the session, so it leaves the store and the
	/// guard untouched.
	pub fn is_terminal(&self) -> bool {
		!matches!(self, Self::Abandoned)
	}
}

type RefreshOutcome = Result<AccessToken, RefreshFailure>;
type Waiter = oneshot::Sender<RefreshOutcome>;

#[derive(Debug, Default)]
enum RefreshState {
	#[default]
	Idle,
	Refreshing {
		waiters: Vec<Waiter>,
	},
}
impl RefreshState {
	fn into_waiters(self) -> Vec<Waiter> {
		match self {
			Self::Idle => Vec::new(),
			Self::Refreshing { waiters } => waiters,
		}
	}
}

enum Role {
	Leader,
	Follower(oneshot::Receiver<RefreshOutcome>),
}

/// Owner of the refresh state and the waiter queue.
///
/// Construct one per client and share it behind an `Arc`; the dispatcher is its only caller.
pub struct RefreshCoordinator<T>
where
	T: ?Sized + HttpTransport,
{
	transport: Arc<T>,
	config: Arc<ClientConfig>,
	store: Arc<dyn TokenStore>,
	guard: Arc<SessionGuard>,
	metrics: RefreshMetrics,
	state: Mutex<RefreshState>,
}
impl<T> RefreshCoordinator<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates an idle coordinator.
	pub fn new(
		transport: Arc<T>,
		config: Arc<ClientConfig>,
		store: Arc<dyn TokenStore>,
		guard: Arc<SessionGuard>,
	) -> Self {
		Self {
			transport,
			config,
			store,
			guard,
			metrics: RefreshMetrics::default(),
			state: Default::default(),
		}
	}

	/// Returns the refresh counters.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Returns `true` while a refresh call is in flight.
	pub fn is_refreshing(&self) -> bool {
		matches!(*self.state.lock(), RefreshState::Refreshing { .. })
	}

	/// Returns the number of callers waiting on the in-flight refresh.
	pub fn pending_waiters(&self) -> usize {
		match &*self.state.lock() {
			RefreshState::Idle => 0,
			RefreshState::Refreshing { waiters } => waiters.len(),
		}
	}

	/// Obtains a fresh token, joining the in-flight refresh if there is one.
	pub async fn request_refresh(&self) -> Result<AccessToken, RefreshFailure> {
		match self.join_or_lead() {
			Role::Follower(outcome) => {
				self.metrics.record_coalesced();
				obs::record_op_outcome(OpKind::Refresh, OpOutcome::Coalesced);

				outcome.await.unwrap_or(Err(RefreshFailure::Abandoned))
			},
			Role::Leader => {
				let span = OpSpan::start(OpKind::Refresh, "request_refresh");
				let episode = Episode { coordinator: self, settled: false };

				self.metrics.record_attempt();

				#[cfg(feature = "tracing")]
				tracing::debug!("refresh started");

				let outcome = span.instrument(self.fetch_token()).await;

				span.finish(&outcome);

				episode.settle(outcome)
			},
		}
	}

	// The state flips to `Refreshing` here, before the leader awaits anything.
	fn join_or_lead(&self) -> Role {
		let mut state = self.state.lock();

		match &mut *state {
			RefreshState::Idle => {
				*state = RefreshState::Refreshing { waiters: Vec::new() };

				Role::Leader
			},
			RefreshState::Refreshing { waiters } => {
				let (tx, rx) = oneshot::channel();

				waiters.push(tx);

				Role::Follower(rx)
			},
		}
	}

	async fn fetch_token(&self) -> RefreshOutcome {
		let url = self
			.config
			.endpoint_url(|endpoints| endpoints.refresh.as_str())
			.map_err(|e| RefreshFailure::Request { message: e.to_string() })?;
		let request = http::Request::builder()
			.method(Method::POST)
			.uri(url.as_str())
			.header(header::ACCEPT, "application/json")
			.body(Vec::new())
			.map_err(|e| RefreshFailure::Request { message: e.to_string() })?;
		let response = self
			.transport
			.execute(request, self.config.request_timeout)
			.await
			.map_err(|e| RefreshFailure::Network { message: e.to_string() })?;
		let status = response.status();

		if !status.is_success() {
			return Err(RefreshFailure::Rejected { status: status.as_u16() });
		}
		if response.body().iter().all(u8::is_ascii_whitespace) {
			return Err(RefreshFailure::MissingToken);
		}

		let payload: AuthPayload = dispatch::decode_json(response.body())
			.map_err(|e| RefreshFailure::MalformedResponse { message: e.to_string() })?;

		payload.token().ok_or(RefreshFailure::MissingToken)
	}

	fn settle(&self, outcome: RefreshOutcome) -> RefreshOutcome {
		match &outcome {
			Ok(token) => {
				let waiters = {
					let mut state = self.state.lock();

					self.store.set(token.clone());

					mem::take(&mut *state).into_waiters()
				};

				obs::record_waiters_released(waiters.len(), true);

				for waiter in waiters {
					let _ = waiter.send(Ok(token.clone()));
				}

				self.metrics.record_success();

				#[cfg(feature = "tracing")]
				tracing::debug!("refresh succeeded");

				// A recovered session must be able to end again.
				self.guard.rearm();
				self.guard.notify(&SessionEvent::TokenRefreshed);
			},
			Err(failure) => {
				let waiters = {
					let mut state = self.state.lock();

					self.store.clear();

					mem::take(&mut *state).into_waiters()
				};

				obs::record_waiters_released(waiters.len(), false);

				for waiter in waiters {
					let _ = waiter.send(Err(failure.clone()));
				}

				self.metrics.record_failure();

				#[cfg(feature = "tracing")]
				tracing::debug!(error = %failure, "refresh failed");

				self.guard.on_terminal_failure(failure);
			},
		}

		outcome
	}

	fn abandon(&self) {
		let waiters = mem::take(&mut *self.state.lock()).into_waiters();

		for waiter in waiters {
			let _ = waiter.send(Err(RefreshFailure::Abandoned));
		}

		self.metrics.record_abandoned();
	}
}
impl<T> Debug for RefreshCoordinator<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshCoordinator")
			.field("refreshing", &self.is_refreshing())
			.field("pending_waiters", &self.pending_waiters())
			.field("metrics", &self.metrics)
			.finish()
	}
}

// Returns the coordinator to `Idle` if the leader's future is dropped mid-flight.
struct Episode<'a, T>
where
	T: ?Sized + HttpTransport,
{
	coordinator: &'a RefreshCoordinator<T>,
	settled: bool,
}
impl<T> Episode<'_, T>
where
	T: ?Sized + HttpTransport,
{
	fn settle(mut self, outcome: RefreshOutcome) -> RefreshOutcome {
		self.settled = true;

		self.coordinator.settle(outcome)
	}
}
impl<T> Drop for Episode<'_, T>
where
	T: ?Sized + HttpTransport,
{
	fn drop(&mut self) {
		if !self.settled {
			self.coordinator.abandon();
		}
	}
}
