//! Session termination and session-state notifications.
//!
//! [`SessionGuard`] is the single place where an unrecoverable refresh failure turns into
//! user-visible behavior: local session artifacts are cleared, observers are told once, and
//! navigation is sent to the login boundary unless it is already there. The guard trips at
//! most once per session; a successful login re-arms it.

// std
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
// self
use crate::{_prelude::*, refresh::RefreshFailure};

/// Navigation hook owned by the embedding application.
pub trait LoginRedirect
where
	Self: Send + Sync,
{
	/// Returns the current navigation target, if the host tracks one.
	fn current_location(&self) -> Option<String>;

	/// Sends navigation to `target`.
	fn redirect(&self, target: &str);
}

/// [`LoginRedirect`] for headless hosts; never navigates.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoRedirect;
impl LoginRedirect for NoRedirect {
	fn current_location(&self) -> Option<String> {
		None
	}

	fn redirect(&self, _target: &str) {}
}

/// Session-state changes published to observers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
	/// A login or registration stored a new token.
	LoggedIn,
	/// The coordinator replaced an expired token.
	TokenRefreshed,
	/// The user logged out.
	LoggedOut,
	/// The session ended because a refresh failed.
	Terminated {
		/// Failure that ended the session.
		reason: RefreshFailure,
	},
}

/// Receiver of [`SessionEvent`]s; the bridge to whatever owns UI state.
pub trait SessionObserver
where
	Self: Send + Sync,
{
	/// Handles one event. Called synchronously; keep it short.
	fn on_event(&self, event: &SessionEvent);
}
impl<F> SessionObserver for F
where
	F: Fn(&SessionEvent) + Send + Sync,
{
	fn on_event(&self, event: &SessionEvent) {
		self(event)
	}
}

/// Handle returned by [`SessionGuard::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type CleanupHook = Box<dyn Fn() + Send + Sync>;

/// One-shot terminator for unrecoverable sessions, plus the observer registry.
pub struct SessionGuard {
	login_route: String,
	redirect: Arc<dyn LoginRedirect>,
	tripped: AtomicBool,
	cleanups: Mutex<Vec<CleanupHook>>,
	observers: RwLock<Vec<(SubscriptionId, Arc<dyn SessionObserver>)>>,
	next_id: AtomicU64,
}
impl SessionGuard {
	/// Creates an armed guard that redirects to `login_route`.
	pub fn new(login_route: impl Into<String>, redirect: Arc<dyn LoginRedirect>) -> Self {
		Self {
			login_route: login_route.into(),
			redirect,
			tripped: AtomicBool::new(false),
			cleanups: Default::default(),
			observers: Default::default(),
			next_id: AtomicU64::new(0),
		}
	}

	/// Registers a hook that clears a local session artifact when the session terminates.
	pub fn on_cleanup(&self, hook: impl Fn() + Send + Sync + 'static) {
		self.cleanups.lock().push(Box::new(hook));
	}

	/// Registers an observer and returns its handle.
	pub fn subscribe(&self, observer: Arc<dyn SessionObserver>) -> SubscriptionId {
		let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));

		self.observers.write().push((id, observer));

		id
	}

	/// Removes an observer; returns `false` if the handle was unknown.
	pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
		let mut observers = self.observers.write();
		let before = observers.len();

		observers.retain(|(existing, _)| *existing != id);

		observers.len() != before
	}

	/// Delivers `event` to every observer registered at call time.
	pub fn notify(&self, event: &SessionEvent) {
		let snapshot: Vec<_> =
			self.observers.read().iter().map(|(_, observer)| Arc::clone(observer)).collect();

		for observer in snapshot {
			observer.on_event(event);
		}
	}

	/// Ends the session after an unrecoverable refresh failure.
	///
	/// Only the first call after arming acts; later calls return `false` without side
	/// effects. Navigation is skipped when the host is already on the login route.
	pub fn on_terminal_failure(&self, reason: &RefreshFailure) -> bool {
		if self.tripped.swap(true, Ordering::AcqRel) {
			return false;
		}

		#[cfg(feature = "tracing")]
		tracing::warn!(reason = %reason, "session terminated");

		for hook in self.cleanups.lock().iter() {
			hook();
		}

		self.notify(&SessionEvent::Terminated { reason: reason.clone() });

		if !self.at_login_route() {
			self.redirect.redirect(&self.login_route);
		}

		true
	}

	/// Arms the guard again after a login or a successful refresh.
	pub fn rearm(&self) {
		self.tripped.store(false, Ordering::Release);
	}

	/// Returns `true` once the guard has fired for the current session.
	pub fn is_tripped(&self) -> bool {
		self.tripped.load(Ordering::Acquire)
	}

	fn at_login_route(&self) -> bool {
		let Some(location) = self.redirect.current_location() else {
			return false;
		};
		let path = location.split(['?', '#']).next().unwrap_or_default();

		path.trim_end_matches('/') == self.login_route.trim_end_matches('/')
	}
}
impl Debug for SessionGuard {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionGuard")
			.field("login_route", &self.login_route)
			.field("tripped", &self.is_tripped())
			.field("observers", &self.observers.read().len())
			.finish()
	}
}
