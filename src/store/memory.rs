//! Thread-safe in-memory [`TokenStore`].

// self
use crate::{_prelude::*, auth::AccessToken, store::TokenStore};

/// Keeps the current token in-process behind a read/write lock.
#[derive(Clone, Debug, Default)]
pub struct MemoryTokenStore(Arc<RwLock<Option<AccessToken>>>);
impl MemoryTokenStore {
	/// Creates a store seeded with `token`.
	pub fn with_token(token: AccessToken) -> Self {
		Self(Arc::new(RwLock::new(Some(token))))
	}
}
impl TokenStore for MemoryTokenStore {
	fn get(&self) -> Option<AccessToken> {
		self.0.read().clone()
	}

	fn set(&self, token: AccessToken) {
		*self.0.write() = Some(token);
	}

	fn clear(&self) {
		self.0.write().take();
	}
}
