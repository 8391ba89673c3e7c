//! Auth-domain models: the bearer token and the payloads exchanged with auth endpoints.

pub mod credentials;
pub mod token;

pub use credentials::*;
pub use token::*;
