//! Storage traits for identity and revocation data.
//!
//! This module defines the collaborator interfaces the authentication core
//! consumes:
//!
//! - [`UserDirectory`]: identity lookup and registration
//! - [`RevokedTokenStorage`]: tokens revoked before their natural expiry
//!
//! # Implementations
//!
//! In-memory implementations live in [`crate::memory`]. Durable backends
//! implement the same traits outside this crate.

pub mod cleanup;
pub mod revoked_token;
pub mod user;

pub use cleanup::spawn_cleanup_task;
pub use revoked_token::RevokedTokenStorage;
pub use user::{NewUser, User, UserBuilder, UserDirectory, UserId};

/// Errors reported by storage collaborators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// A uniqueness constraint was violated.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The backing store cannot be reached.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// The operation did not complete in time.
    #[error("Storage operation timed out")]
    Timeout,

    /// A bounded store is full of entries that have not yet expired.
    #[error("Storage capacity exceeded ({max_entries} entries)")]
    CapacityExceeded {
        /// Configured capacity.
        max_entries: usize,
    },

    /// Any other backend failure.
    #[error("Internal storage error: {0}")]
    Internal(String),
}

impl StorageError {
    /// Returns `true` if retrying the operation later may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_) | Self::Timeout | Self::CapacityExceeded { .. }
        )
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
