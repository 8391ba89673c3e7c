#![allow(dead_code)]

// std
use std::{
	collections::{HashMap, VecDeque},
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};
// crates.io
use bearer_client::{
	AccessToken, AuthClient, ClientConfig, LoginRedirect, MemoryTokenStore, SessionEvent,
	TokenStore,
	error::TransportError,
	http::{Method, StatusCode, header},
	transport::{HttpRequest, HttpResponse, HttpTransport, TransportFuture},
};
use futures::channel::oneshot;
use parking_lot::Mutex;

pub const REFRESH_PATH: &str = "/auth/refresh-token";

/// One request as seen by [`ScriptedTransport`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Seen {
	pub method: Method,
	pub path: String,
	pub authorization: Option<String>,
}

/// Canned reply for a fixed path.
#[derive(Clone, Debug)]
pub enum Reply {
	Status(u16, &'static str),
	Unreachable,
}

/// In-process backend.
///
/// Protected paths answer 200 only for `Bearer <valid_token>` and 401 otherwise. The refresh
/// endpoint waits for the gate, if one is installed, before answering with the next queued
/// refresh reply, falling back to `refresh_reply`.
pub struct ScriptedTransport {
	valid_token: Mutex<String>,
	refresh_reply: Reply,
	queued_refreshes: Mutex<VecDeque<Reply>>,
	refresh_gate: Mutex<Option<oneshot::Receiver<()>>>,
	fixed: Mutex<HashMap<String, Reply>>,
	refresh_calls: AtomicUsize,
	seen: Mutex<Vec<Seen>>,
}
impl ScriptedTransport {
	pub fn new(valid_token: &str, refresh_reply: Reply) -> Arc<Self> {
		Arc::new(Self {
			valid_token: Mutex::new(valid_token.to_owned()),
			refresh_reply,
			queued_refreshes: Default::default(),
			refresh_gate: Mutex::new(None),
			fixed: Default::default(),
			refresh_calls: AtomicUsize::new(0),
			seen: Default::default(),
		})
	}

	/// Holds refresh calls until the returned sender fires.
	pub fn gate_refresh(&self) -> oneshot::Sender<()> {
		let (tx, rx) = oneshot::channel();

		*self.refresh_gate.lock() = Some(rx);

		tx
	}

	/// Answers the next refresh calls with `replies`, in order.
	pub fn queue_refreshes(&self, replies: impl IntoIterator<Item = Reply>) {
		self.queued_refreshes.lock().extend(replies);
	}

	/// Rotates the token the backend accepts.
	pub fn accept(&self, token: &str) {
		*self.valid_token.lock() = token.to_owned();
	}

	pub fn reply(&self, path: &str, reply: Reply) {
		self.fixed.lock().insert(path.to_owned(), reply);
	}

	pub fn refresh_calls(&self) -> usize {
		self.refresh_calls.load(Ordering::SeqCst)
	}

	pub fn seen(&self) -> Vec<Seen> {
		self.seen.lock().clone()
	}

	pub fn seen_at(&self, path: &str) -> Vec<Seen> {
		self.seen().into_iter().filter(|seen| seen.path == path).collect()
	}

	fn respond(path: &str, reply: Reply) -> Result<HttpResponse, TransportError> {
		match reply {
			Reply::Status(status, body) => {
				let mut response = HttpResponse::new(body.as_bytes().to_vec());

				*response.status_mut() = StatusCode::from_u16(status)
					.map_err(|e| TransportError::network(path, e))?;

				Ok(response)
			},
			Reply::Unreachable => Err(TransportError::network(
				path,
				std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused"),
			)),
		}
	}
}
impl HttpTransport for ScriptedTransport {
	fn execute(&self, request: HttpRequest, _timeout: Duration) -> TransportFuture<'_> {
		let path = request.uri().path().to_owned();
		let authorization = request
			.headers()
			.get(header::AUTHORIZATION)
			.and_then(|value| value.to_str().ok())
			.map(str::to_owned);

		self.seen.lock().push(Seen {
			method: request.method().clone(),
			path: path.clone(),
			authorization: authorization.clone(),
		});

		if path == REFRESH_PATH {
			self.refresh_calls.fetch_add(1, Ordering::SeqCst);

			let gate = self.refresh_gate.lock().take();
			let reply = self
				.queued_refreshes
				.lock()
				.pop_front()
				.unwrap_or_else(|| self.refresh_reply.clone());

			return Box::pin(async move {
				if let Some(gate) = gate {
					let _ = gate.await;
				}

				Self::respond(&path, reply)
			});
		}

		let reply = self.fixed.lock().get(&path).cloned().unwrap_or_else(|| {
			let expected = format!("Bearer {}", self.valid_token.lock());

			if authorization.as_deref() == Some(expected.as_str()) {
				Reply::Status(200, r#"{"ok":true}"#)
			} else {
				Reply::Status(401, r#"{"message":"jwt expired"}"#)
			}
		});

		Box::pin(async move { Self::respond(&path, reply) })
	}
}

/// Memory store that counts mutations.
#[derive(Default)]
pub struct CountingStore {
	inner: MemoryTokenStore,
	sets: AtomicUsize,
	clears: AtomicUsize,
}
impl CountingStore {
	pub fn with_token(token: &str) -> Arc<Self> {
		Arc::new(Self {
			inner: MemoryTokenStore::with_token(AccessToken::new(token)),
			..Default::default()
		})
	}

	pub fn sets(&self) -> usize {
		self.sets.load(Ordering::SeqCst)
	}

	pub fn clears(&self) -> usize {
		self.clears.load(Ordering::SeqCst)
	}

	pub fn token(&self) -> Option<String> {
		self.inner.get().map(|token| token.expose().to_owned())
	}
}
impl TokenStore for CountingStore {
	fn get(&self) -> Option<AccessToken> {
		self.inner.get()
	}

	fn set(&self, token: AccessToken) {
		self.sets.fetch_add(1, Ordering::SeqCst);
		self.inner.set(token);
	}

	fn clear(&self) {
		self.clears.fetch_add(1, Ordering::SeqCst);
		self.inner.clear();
	}
}

/// Navigation hook that records every redirect.
pub struct RecordingRedirect {
	location: Mutex<Option<String>>,
	redirects: Mutex<Vec<String>>,
}
impl RecordingRedirect {
	pub fn at(location: &str) -> Arc<Self> {
		Arc::new(Self {
			location: Mutex::new(Some(location.to_owned())),
			redirects: Default::default(),
		})
	}

	/// Moves the host to `location` without recording a redirect.
	pub fn navigate(&self, location: &str) {
		*self.location.lock() = Some(location.to_owned());
	}

	pub fn redirects(&self) -> Vec<String> {
		self.redirects.lock().clone()
	}
}
impl LoginRedirect for RecordingRedirect {
	fn current_location(&self) -> Option<String> {
		self.location.lock().clone()
	}

	fn redirect(&self, target: &str) {
		self.redirects.lock().push(target.to_owned());
		*self.location.lock() = Some(target.to_owned());
	}
}

pub fn config() -> ClientConfig {
	ClientConfig::builder("https://api.example.com")
		.build()
		.expect("Test configuration should build.")
}

pub fn client(
	transport: &Arc<ScriptedTransport>,
	store: &Arc<CountingStore>,
	redirect: &Arc<RecordingRedirect>,
) -> AuthClient<ScriptedTransport> {
	AuthClient::with_transport(config(), transport.clone(), store.clone(), redirect.clone())
}

pub fn record_events<T>(client: &AuthClient<T>) -> Arc<Mutex<Vec<SessionEvent>>>
where
	T: ?Sized + HttpTransport,
{
	let events = Arc::new(Mutex::new(Vec::new()));
	let sink = events.clone();

	client.subscribe(Arc::new(move |event: &SessionEvent| sink.lock().push(event.clone())));

	events
}
