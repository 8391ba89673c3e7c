//! Bearer-token HTTP client that coalesces concurrent session refreshes into a single flight,
//! replays every request that hit an expired token, and ends the session exactly once when
//! recovery is impossible.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod obs;
pub mod refresh;
pub mod session;
pub mod store;
pub mod transport;

mod _prelude {
	pub use std::{
		collections::BTreeMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::OffsetDateTime;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use http;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};

pub use crate::{
	auth::{AccessToken, AuthSession, Credentials, Registration, UserProfile},
	client::AuthClient,
	config::ClientConfig,
	dispatch::{ApiResponse, RequestDescriptor, RequestDispatcher},
	error::{Error, Result},
	refresh::{RefreshCoordinator, RefreshFailure},
	session::{LoginRedirect, SessionEvent, SessionGuard, SessionObserver, SubscriptionId},
	store::{FileTokenStore, MemoryTokenStore, TokenStore},
	transport::HttpTransport,
};
#[cfg(feature = "reqwest")]
pub use crate::{client::ReqwestAuthClient, transport::ReqwestHttpClient};
