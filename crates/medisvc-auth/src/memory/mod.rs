//! In-memory storage backends.
//!
//! Suitable for tests, single-process deployments, and the CLI walkthrough.
//! State is lost on restart.

mod revoked_token;
mod user;

pub use revoked_token::InMemoryRevokedTokenStorage;
pub use user::InMemoryUserDirectory;
