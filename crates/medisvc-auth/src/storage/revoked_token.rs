//! Revoked token storage trait.
//!
//! When a token is revoked before its natural expiry, its revocation key is
//! stored until the token would have expired anyway. Validation consults the
//! store for every token that otherwise decodes successfully.
//!
//! # Security Considerations
//!
//! - Entries are keyed by [`TokenClaims::revocation_key`] (`kid:jti`), taken
//!   from the signed claims. Hashing the raw token string is not enough: a JWS
//!   signature is not itself signed, so an ECDSA signature `(r, s)` can be
//!   replaced by `(r, n - s)` to get a second string that still verifies.
//! - An entry must stay queryable until its recorded expiry
//! - Lookup failures are treated by callers as "revoked" (fail closed)
//!
//! [`TokenClaims::revocation_key`]: crate::token::TokenClaims::revocation_key

use async_trait::async_trait;
use time::OffsetDateTime;

use super::StorageResult;

/// Storage trait for revoked tokens.
///
/// Keys are opaque strings; the authentication core passes
/// [`TokenClaims::revocation_key`](crate::token::TokenClaims::revocation_key).
#[async_trait]
pub trait RevokedTokenStorage: Send + Sync {
    /// Marks a token as revoked until `expires_at`.
    ///
    /// Revoking an already-revoked key succeeds and keeps the later of the two
    /// expiries.
    ///
    /// # Returns
    ///
    /// `true` if the key was not revoked before this call, `false` if it
    /// already was. Callers use this to claim a token exactly once.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn revoke(&self, key: &str, expires_at: OffsetDateTime) -> StorageResult<bool>;

    /// Checks whether a key is currently revoked.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails. Callers must not
    /// interpret an error as "not revoked".
    async fn is_revoked(&self, key: &str) -> StorageResult<bool>;

    /// Deletes entries whose expiry has passed.
    ///
    /// # Returns
    ///
    /// Returns the number of records deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the cleanup operation fails.
    async fn cleanup_expired(&self) -> StorageResult<u64>;

    /// Number of entries currently held, expired or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn len(&self) -> StorageResult<usize>;
}
