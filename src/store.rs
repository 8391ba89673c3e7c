//! Token store contract and the built-in memory and file-backed implementations.
//!
//! A store owns the client-visible copy of the bearer token. Stores never touch the network
//! or the UI; mutations come from the refresh coordinator and the login/logout flows.

pub mod file;
pub mod memory;

pub use file::FileTokenStore;
pub use memory::MemoryTokenStore;

// self
use crate::{_prelude::*, auth::AccessToken};

/// Holder of the single current bearer token.
///
/// Implementations must make [`set`](TokenStore::set) an atomic replace so readers never
/// observe a partially written token.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Returns the current token, if any.
	fn get(&self) -> Option<AccessToken>;

	/// Replaces the current token.
	fn set(&self, token: AccessToken);

	/// Removes the current token.
	fn clear(&self);

	/// Returns `true` iff a non-blank token is present.
	fn is_authenticated(&self) -> bool {
		self.get().is_some_and(|token| !token.is_blank())
	}
}

/// Error type produced by persistent [`TokenStore`] backends.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
