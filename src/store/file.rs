//! File-backed [`TokenStore`] that mirrors the current token to disk.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::AccessToken,
	store::{StoreError, TokenStore},
};

#[derive(Serialize, Deserialize)]
struct Snapshot {
	access_token: AccessToken,
	saved_at: OffsetDateTime,
}

/// Persists the current token to a JSON file after each mutation.
///
/// Reads are served from memory. A failed write keeps the in-memory value authoritative and
/// is reported through [`FileTokenStore::last_error`].
#[derive(Clone, Debug)]
pub struct FileTokenStore {
	path: PathBuf,
	inner: Arc<RwLock<Option<AccessToken>>>,
	last_error: Arc<Mutex<Option<StoreError>>>,
}
impl FileTokenStore {
	/// Opens (or creates) a store at the provided path, eagerly loading an existing token.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let token = Self::load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(token)), last_error: Default::default() })
	}

	/// Returns the path backing this store.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Returns the most recent persistence failure, if the last write failed.
	pub fn last_error(&self) -> Option<StoreError> {
		self.last_error.lock().clone()
	}

	fn load_snapshot(path: &Path) -> Result<Option<AccessToken>, StoreError> {
		if !path.exists() {
			return Ok(None);
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		if bytes.is_empty() {
			return Ok(None);
		}

		let snapshot: Snapshot =
			serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
				message: format!("Failed to parse {}: {e}", path.display()),
			})?;

		Ok(Some(snapshot.access_token))
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist_locked(&self, token: Option<&AccessToken>) -> Result<(), StoreError> {
		let Some(token) = token else {
			return match fs::remove_file(&self.path) {
				Ok(()) => Ok(()),
				Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
				Err(e) => Err(StoreError::Backend {
					message: format!("Failed to remove {}: {e}", self.path.display()),
				}),
			};
		};

		Self::ensure_parent_exists(&self.path)?;

		let snapshot =
			Snapshot { access_token: token.clone(), saved_at: OffsetDateTime::now_utc() };
		let serialized = serde_json::to_vec(&snapshot).map_err(|e| StoreError::Serialization {
			message: format!("Failed to serialize token snapshot: {e}"),
		})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}

	fn record(&self, outcome: Result<(), StoreError>) {
		let mut last_error = self.last_error.lock();

		match outcome {
			Ok(()) => *last_error = None,
			Err(e) => {
				#[cfg(feature = "tracing")]
				tracing::warn!(path = %self.path.display(), error = %e, "token mirror write failed");

				*last_error = Some(e);
			},
		}
	}
}
impl TokenStore for FileTokenStore {
	fn get(&self) -> Option<AccessToken> {
		self.inner.read().clone()
	}

	fn set(&self, token: AccessToken) {
		let mut guard = self.inner.write();

		*guard = Some(token);

		let outcome = self.persist_locked(guard.as_ref());

		self.record(outcome);
	}

	fn clear(&self) {
		let mut guard = self.inner.write();

		*guard = None;

		let outcome = self.persist_locked(None);

		self.record(outcome);
	}
}
