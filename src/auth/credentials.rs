//! Payloads exchanged with the login, register, refresh, and profile endpoints.

// crates.io
use serde::Deserializer;
use serde_json::Value;
// self
use crate::{_prelude::*, auth::AccessToken};

/// Email + password pair submitted to the login endpoint.
#[derive(Clone, Serialize)]
pub struct Credentials {
	/// Account email.
	pub email: String,
	/// Account password.
	pub password: String,
}
impl Credentials {
	/// Creates a new credential pair.
	pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
		Self { email: email.into(), password: password.into() }
	}
}
impl Debug for Credentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credentials")
			.field("email", &self.email)
			.field("password", &"<redacted>")
			.finish()
	}
}

/// Account details submitted to the register endpoint.
#[derive(Clone, Serialize)]
pub struct Registration {
	/// Display name.
	pub name: String,
	/// Account email.
	pub email: String,
	/// Account password.
	pub password: String,
	/// Additional fields forwarded verbatim.
	#[serde(flatten)]
	pub extra: BTreeMap<String, Value>,
}
impl Registration {
	/// Creates a registration payload without extra fields.
	pub fn new(
		name: impl Into<String>,
		email: impl Into<String>,
		password: impl Into<String>,
	) -> Self {
		Self {
			name: name.into(),
			email: email.into(),
			password: password.into(),
			extra: BTreeMap::new(),
		}
	}

	/// Adds an extra field to the payload.
	pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.extra.insert(key.into(), value.into());

		self
	}
}
impl Debug for Registration {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Registration")
			.field("name", &self.name)
			.field("email", &self.email)
			.field("password", &"<redacted>")
			.field("extra", &self.extra)
			.finish()
	}
}

/// Profile of the authenticated user as returned by the auth endpoints.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
	/// Server-side identifier (numeric identifiers are rendered as strings).
	#[serde(alias = "_id", deserialize_with = "string_or_number")]
	pub id: String,
	/// Account email.
	#[serde(default)]
	pub email: Option<String>,
	/// Display name.
	#[serde(default)]
	pub name: Option<String>,
	/// Role label, if the backend exposes one.
	#[serde(default)]
	pub role: Option<String>,
	/// Remaining fields.
	#[serde(flatten)]
	pub extra: BTreeMap<String, Value>,
}

/// Token-bearing response body from login, register, and refresh endpoints.
///
/// Backends differ in how they name the token field and whether they wrap the payload in a
/// `data` envelope, so all of those shapes are accepted.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct AuthPayload {
	/// Access token, when present.
	#[serde(default, alias = "accessToken", alias = "token")]
	pub access_token: Option<String>,
	/// User profile, when present.
	#[serde(default)]
	pub user: Option<UserProfile>,
	/// Nested envelope used by some backends.
	#[serde(default)]
	pub data: Option<Box<AuthPayload>>,
}
impl AuthPayload {
	/// Returns the first non-blank token, preferring the outer level over the envelope.
	pub fn token(&self) -> Option<AccessToken> {
		self.access_token
			.as_deref()
			.map(AccessToken::new)
			.filter(|token| !token.is_blank())
			.or_else(|| self.data.as_ref().and_then(|inner| inner.token()))
	}

	/// Returns the user profile, preferring the outer level over the envelope.
	pub fn into_user(self) -> Option<UserProfile> {
		match self.user {
			Some(user) => Some(user),
			None => self.data.and_then(|inner| inner.into_user()),
		}
	}
}

/// Shapes accepted from the current-user endpoint.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ProfileEnvelope {
	Wrapped { user: UserProfile },
	Data { data: UserProfile },
	Bare(UserProfile),
}
impl ProfileEnvelope {
	pub(crate) fn into_profile(self) -> UserProfile {
		match self {
			Self::Wrapped { user } | Self::Data { data: user } | Self::Bare(user) => user,
		}
	}
}

/// Authenticated session produced by a successful login or registration.
#[derive(Clone, Debug)]
pub struct AuthSession {
	/// Token now held by the store.
	pub token: AccessToken,
	/// User returned alongside the token, if any.
	pub user: Option<UserProfile>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
	D: Deserializer<'de>,
{
	match Value::deserialize(deserializer)? {
		Value::String(s) => Ok(s),
		Value::Number(n) => Ok(n.to_string()),
		other => Err(serde::de::Error::custom(format!("expected string or number, got {other}"))),
	}
}
