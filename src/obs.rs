//! Optional observability helpers for client operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `bearer_client.op` with the `op`, `stage`,
//!   and `outcome` fields (dispatch spans add `method`, `path`, and `attempt`), plus events
//!   when a refresh starts, settles, or ends the session.
//! - Enable `metrics` to increment the `bearer_client_op_total` counter for every
//!   attempt/success/failure, labeled by `op` + `outcome`, and to record the
//!   `bearer_client_refresh_waiters` histogram once per refresh episode.

mod metrics;
mod tracing;

pub use self::{metrics::*, tracing::*};

// self
use crate::_prelude::*;

/// Client operations observed by the instrumentation layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
	/// A request routed through the dispatcher.
	Dispatch,
	/// A network refresh performed by the coordinator.
	Refresh,
	/// Login against the public login endpoint.
	Login,
	/// Account registration.
	Register,
	/// Logout.
	Logout,
	/// Current-user lookup.
	Profile,
}
impl OpKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpKind::Dispatch => "dispatch",
			OpKind::Refresh => "refresh",
			OpKind::Login => "login",
			OpKind::Register => "register",
			OpKind::Logout => "logout",
			OpKind::Profile => "profile",
		}
	}
}
impl Display for OpKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// A follower joined an in-flight refresh instead of starting one.
	Coalesced,
	/// Failure propagated back to the caller.
	Failure,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Coalesced => "coalesced",
			OpOutcome::Failure => "failure",
		}
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
