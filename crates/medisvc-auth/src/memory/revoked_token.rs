use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use time::OffsetDateTime;

use crate::clock::Clock;
use crate::storage::{RevokedTokenStorage, StorageError, StorageResult};

/// Bounded, clock-aware revocation store.
///
/// Entries are keyed by revocation key and dropped only once their expiry
/// has passed. When the store reaches `max_entries`, expired entries are
/// purged to make room; if every entry is still live, [`revoke`] fails with
/// [`StorageError::CapacityExceeded`] rather than forgetting a revocation.
///
/// The bound is checked without a global lock, so concurrent inserts can
/// overshoot it by a few entries.
///
/// [`revoke`]: RevokedTokenStorage::revoke
pub struct InMemoryRevokedTokenStorage {
    entries: DashMap<String, OffsetDateTime>,
    max_entries: usize,
    clock: Arc<dyn Clock>,
}

impl InMemoryRevokedTokenStorage {
    /// Creates an empty store holding at most `max_entries` entries.
    pub fn new(max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries,
            clock,
        }
    }

    fn purge_expired(&self, now: OffsetDateTime) -> u64 {
        let before = self.entries.len();
        self.entries.retain(|_, expires_at| *expires_at > now);
        before.saturating_sub(self.entries.len()) as u64
    }
}

impl std::fmt::Debug for InMemoryRevokedTokenStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRevokedTokenStorage")
            .field("entries", &self.entries.len())
            .field("max_entries", &self.max_entries)
            .finish()
    }
}

#[async_trait]
impl RevokedTokenStorage for InMemoryRevokedTokenStorage {
    async fn revoke(&self, key: &str, expires_at: OffsetDateTime) -> StorageResult<bool> {
        let now = self.clock.now();

        if !self.entries.contains_key(key) && self.entries.len() >= self.max_entries {
            let removed = self.purge_expired(now);
            if self.entries.len() >= self.max_entries {
                tracing::warn!(
                    max_entries = self.max_entries,
                    "Revocation store at capacity"
                );
                return Err(StorageError::CapacityExceeded {
                    max_entries: self.max_entries,
                });
            }
            tracing::debug!(removed, "Made room in revocation store");
        }

        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                let was_live = *entry.get() > now;
                if expires_at > *entry.get() {
                    entry.insert(expires_at);
                }
                Ok(!was_live)
            }
            Entry::Vacant(entry) => {
                entry.insert(expires_at);
                Ok(true)
            }
        }
    }

    async fn is_revoked(&self, key: &str) -> StorageResult<bool> {
        let now = self.clock.now();
        Ok(self
            .entries
            .get(key)
            .is_some_and(|expires_at| *expires_at > now))
    }

    async fn cleanup_expired(&self) -> StorageResult<u64> {
        Ok(self.purge_expired(self.clock.now()))
    }

    async fn len(&self) -> StorageResult<usize> {
        Ok(self.entries.len())
    }
}
