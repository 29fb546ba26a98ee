//! Periodic sweep of expired revocation entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use super::RevokedTokenStorage;

/// Spawns a task that calls [`RevokedTokenStorage::cleanup_expired`] every `interval`.
///
/// The first sweep happens one `interval` after spawning. Failures are logged
/// and the loop keeps running; abort the returned handle to stop it.
pub fn spawn_cleanup_task(
    storage: Arc<dyn RevokedTokenStorage>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match storage.cleanup_expired().await {
                Ok(0) => {}
                Ok(removed) => {
                    tracing::debug!(removed, "Purged expired revocation entries");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Revocation cleanup failed");
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{StorageError, StorageResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};
    use time::OffsetDateTime;

    struct CountingStorage {
        sweeps: AtomicU64,
        fail: bool,
    }

    #[async_trait]
    impl RevokedTokenStorage for CountingStorage {
        async fn revoke(&self, _key: &str, _expires_at: OffsetDateTime) -> StorageResult<bool> {
            Ok(true)
        }

        async fn is_revoked(&self, _key: &str) -> StorageResult<bool> {
            Ok(false)
        }

        async fn cleanup_expired(&self) -> StorageResult<u64> {
            self.sweeps.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(StorageError::Unavailable("down".into()))
            } else {
                Ok(1)
            }
        }

        async fn len(&self) -> StorageResult<usize> {
            Ok(0)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_runs_on_interval() {
        let storage = Arc::new(CountingStorage {
            sweeps: AtomicU64::new(0),
            fail: false,
        });
        let handle = spawn_cleanup_task(storage.clone(), Duration::from_secs(60));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(storage.sweeps.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(170)).await;
        assert_eq!(storage.sweeps.load(Ordering::SeqCst), 3);

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_survives_errors() {
        let storage = Arc::new(CountingStorage {
            sweeps: AtomicU64::new(0),
            fail: true,
        });
        let handle = spawn_cleanup_task(storage.clone(), Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(storage.sweeps.load(Ordering::SeqCst), 3);
        assert!(!handle.is_finished());

        handle.abort();
    }
}
