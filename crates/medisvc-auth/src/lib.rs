//! # medisvc-auth
//!
//! Authentication and session lifecycle core for medisvc.
//!
//! This crate provides:
//! - Argon2id credential hashing and verification
//! - Signed, class-tagged access and refresh tokens with key rotation
//! - A revocation store for tokens invalidated before their expiry
//! - The login, refresh, logout, registration, and validation flows
//!
//! ## Overview
//!
//! [`AuthService`] is the entry point. It depends on a [`UserDirectory`] for
//! identities and a [`RevokedTokenStorage`] for revocations; in-memory
//! implementations of both live in [`memory`].
//!
//! ## Modules
//!
//! - [`clock`] - Injectable time source
//! - [`config`] - Authentication configuration
//! - [`error`] - Error taxonomy returned to callers
//! - [`password`] - Credential hashing and verification
//! - [`token`] - Token issuance and validation
//! - [`storage`] - Storage traits for identities and revocations
//! - [`memory`] - In-memory storage backends
//! - [`service`] - The authentication orchestrator
//! - [`types`] - Request and response types

pub mod clock;
pub mod config;
pub mod error;
pub mod memory;
pub mod password;
pub mod service;
pub mod storage;
pub mod token;
pub mod types;

#[cfg(test)]
mod test_support;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AuthConfig, ConfigError};
pub use error::{AuthError, ErrorCategory};
pub use memory::{InMemoryRevokedTokenStorage, InMemoryUserDirectory};
pub use password::{PasswordError, PasswordHasher};
pub use service::{AuthService, ServiceSettings};
pub use storage::{
    RevokedTokenStorage, StorageError, StorageResult, User, UserDirectory, UserId,
    spawn_cleanup_task,
};
pub use token::{JwtError, JwtService, TokenClaims, TokenClass, extract_bearer_token};
pub use types::{AuthenticatedUser, LogoutOutcome, RegisterUser, TokenPair, UserInfo};

/// Type alias for authentication results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```
/// use medisvc_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::clock::{Clock, SystemClock};
    pub use crate::config::{AuthConfig, ConfigError};
    pub use crate::error::{AuthError, ErrorCategory};
    pub use crate::memory::{InMemoryRevokedTokenStorage, InMemoryUserDirectory};
    pub use crate::service::AuthService;
    pub use crate::storage::{RevokedTokenStorage, User, UserDirectory, UserId};
    pub use crate::token::{TokenClaims, TokenClass, extract_bearer_token};
    pub use crate::types::{AuthenticatedUser, LogoutOutcome, RegisterUser, TokenPair, UserInfo};
}
