//! Nonce storage for replay prevention.
//!
//! Every accepted launch records its (consumer key, nonce) pair together
//! with an expiry derived from the request timestamp. A pair presented again
//! before its expiry is a replay; after expiry it may be accepted again, so
//! nonce rejection is time-bounded, not permanent.
//!
//! # Security Considerations
//!
//! - The timestamp window check runs before any nonce lookup
//! - `check_and_record` must be atomic per (consumer key, nonce): two
//!   concurrent requests presenting the same pair must not both be accepted
//! - Expired entries are removed lazily and by an explicit sweep; exact
//!   timing is not observable beyond the window contract

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::error::StoreResult;

/// Replay-window parameters for nonce checking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonceWindow {
    /// Maximum accepted age of a timestamp, in seconds.
    pub max_age_secs: i64,

    /// Fixed allowance for timestamps ahead of the local clock, in seconds.
    pub future_skew_secs: i64,
}

impl NonceWindow {
    /// Creates a window.
    #[must_use]
    pub fn new(max_age_secs: i64, future_skew_secs: i64) -> Self {
        Self {
            max_age_secs,
            future_skew_secs,
        }
    }
}

impl Default for NonceWindow {
    fn default() -> Self {
        Self {
            max_age_secs: 300,
            future_skew_secs: 60,
        }
    }
}

/// Outcome of a nonce check.
///
/// The orchestrator maps `TimestampRefused` and `Replayed` onto the
/// corresponding problem codes; store failures travel separately as
/// [`StoreError`](crate::StoreError).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceCheck {
    /// Timestamp in range and nonce unseen; the pair is now recorded.
    Fresh,
    /// Timestamp outside `[now - max_age, now + future_skew]`.
    TimestampRefused,
    /// The (consumer key, nonce) pair was already accepted within the window.
    Replayed,
}

/// Storage trait for nonce replay tracking.
///
/// Implementations must make `check_and_record` atomic per
/// (consumer key, nonce) and may block on network or disk; callers guard
/// invocations with a timeout.
#[async_trait]
pub trait NonceStore: Send + Sync {
    /// Atomically checks a launch's timestamp and nonce, recording the pair
    /// on acceptance.
    ///
    /// The timestamp is validated against `window` around `now` before any
    /// nonce lookup. On acceptance the pair is recorded with an expiry of
    /// `timestamp + window.max_age_secs`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn check_and_record(
        &self,
        consumer_key: &str,
        nonce: &str,
        timestamp: i64,
        now: i64,
        window: NonceWindow,
    ) -> StoreResult<NonceCheck>;

    /// Deletes expired nonce entries.
    ///
    /// Optional periodic sweep; implementations also prune lazily. Returns
    /// the number of entries deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the cleanup operation fails.
    async fn cleanup_expired(&self, now: i64) -> StoreResult<u64>;
}

/// How many checks between lazy expiry sweeps.
const SWEEP_INTERVAL: u64 = 1024;

/// In-memory nonce store backed by a concurrent map.
///
/// The map's `entry` API gives the mandated insert-if-absent atomicity:
/// the shard lock is held across the check and the insert, so two
/// concurrent requests with the same pair serialize and exactly one is
/// accepted.
#[derive(Debug, Default)]
pub struct InMemoryNonceStore {
    /// (consumer key, nonce) -> expiry epoch-seconds.
    seen: DashMap<(String, String), i64>,
    checks: AtomicU64,
}

impl InMemoryNonceStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries, for tests and metrics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Returns `true` if no nonces are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[async_trait]
impl NonceStore for InMemoryNonceStore {
    async fn check_and_record(
        &self,
        consumer_key: &str,
        nonce: &str,
        timestamp: i64,
        now: i64,
        window: NonceWindow,
    ) -> StoreResult<NonceCheck> {
        if timestamp < now - window.max_age_secs || timestamp > now + window.future_skew_secs {
            return Ok(NonceCheck::TimestampRefused);
        }

        let expires_at = timestamp + window.max_age_secs;
        let outcome = match self
            .seen
            .entry((consumer_key.to_string(), nonce.to_string()))
        {
            Entry::Occupied(mut entry) => {
                if *entry.get() > now {
                    NonceCheck::Replayed
                } else {
                    // The previous use expired; the nonce is usable again.
                    entry.insert(expires_at);
                    NonceCheck::Fresh
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(expires_at);
                NonceCheck::Fresh
            }
        };

        // Lazy garbage collection so the map does not grow without bound.
        if self.checks.fetch_add(1, Ordering::Relaxed) % SWEEP_INTERVAL == SWEEP_INTERVAL - 1 {
            self.seen.retain(|_, expiry| *expiry > now);
        }
        Ok(outcome)
    }

    async fn cleanup_expired(&self, now: i64) -> StoreResult<u64> {
        // Inserts can land while `retain` scans, so the count of removals is
        // taken inside the closure; deriving it from before/after lengths
        // miscounts whenever the map grows mid-sweep.
        let removed = AtomicU64::new(0);
        self.seen.retain(|_, expiry| {
            let live = *expiry > now;
            if !live {
                removed.fetch_add(1, Ordering::Relaxed);
            }
            live
        });
        Ok(removed.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn window() -> NonceWindow {
        NonceWindow::default()
    }

    #[tokio::test]
    async fn test_fresh_nonce_accepted_then_replay_rejected() {
        let store = InMemoryNonceStore::new();
        let first = store
            .check_and_record("moodle", "n-1", NOW, NOW, window())
            .await
            .unwrap();
        assert_eq!(first, NonceCheck::Fresh);

        let second = store
            .check_and_record("moodle", "n-1", NOW, NOW + 1, window())
            .await
            .unwrap();
        assert_eq!(second, NonceCheck::Replayed);
    }

    #[tokio::test]
    async fn test_same_nonce_different_consumers_independent() {
        let store = InMemoryNonceStore::new();
        store
            .check_and_record("moodle", "n-1", NOW, NOW, window())
            .await
            .unwrap();
        let other = store
            .check_and_record("canvas", "n-1", NOW, NOW, window())
            .await
            .unwrap();
        assert_eq!(other, NonceCheck::Fresh);
    }

    #[tokio::test]
    async fn test_timestamp_too_old_refused_before_lookup() {
        let store = InMemoryNonceStore::new();
        let outcome = store
            .check_and_record("moodle", "n-1", NOW - 301, NOW, window())
            .await
            .unwrap();
        assert_eq!(outcome, NonceCheck::TimestampRefused);
        // Nothing was recorded for the refused request.
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_timestamp_future_beyond_skew_refused() {
        let store = InMemoryNonceStore::new();
        let within = store
            .check_and_record("moodle", "n-1", NOW + 60, NOW, window())
            .await
            .unwrap();
        assert_eq!(within, NonceCheck::Fresh);

        let beyond = store
            .check_and_record("moodle", "n-2", NOW + 61, NOW, window())
            .await
            .unwrap();
        assert_eq!(beyond, NonceCheck::TimestampRefused);
    }

    #[tokio::test]
    async fn test_nonce_reusable_after_window_elapsed() {
        let store = InMemoryNonceStore::new();
        store
            .check_and_record("moodle", "n-1", NOW, NOW, window())
            .await
            .unwrap();

        // Well past the original timestamp's window; the entry has expired.
        let later = NOW + 400;
        let outcome = store
            .check_and_record("moodle", "n-1", later, later, window())
            .await
            .unwrap();
        assert_eq!(outcome, NonceCheck::Fresh);
    }

    #[tokio::test]
    async fn test_cleanup_expired_reports_count() {
        let store = InMemoryNonceStore::new();
        store
            .check_and_record("moodle", "n-1", NOW, NOW, window())
            .await
            .unwrap();
        store
            .check_and_record("moodle", "n-2", NOW, NOW, window())
            .await
            .unwrap();
        assert_eq!(store.len(), 2);

        let removed = store.cleanup_expired(NOW + 301).await.unwrap();
        assert_eq!(removed, 2);
        assert!(store.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_cleanup_counts_removals_while_inserts_land() {
        use std::sync::Arc;

        let store = Arc::new(InMemoryNonceStore::new());
        for i in 0..1_000 {
            store
                .check_and_record("moodle", &format!("n-{i}"), NOW, NOW, window())
                .await
                .unwrap();
        }

        // A writer keeps inserting live entries while sweeps run, so the map
        // grows mid-scan and the removal count cannot be derived from
        // before/after lengths.
        let later = NOW + 400;
        let writer_store = Arc::clone(&store);
        let writer = tokio::spawn(async move {
            for i in 0..1_000 {
                writer_store
                    .check_and_record("canvas", &format!("w-{i}"), later, later, window())
                    .await
                    .unwrap();
            }
        });

        let mut removed_total = 0;
        for _ in 0..50 {
            removed_total += store.cleanup_expired(NOW + 301).await.unwrap();
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();
        removed_total += store.cleanup_expired(NOW + 301).await.unwrap();

        // Only the 1000 original entries were ever eligible for removal;
        // every writer entry expires at `later + 300` and survives.
        assert!(removed_total <= 1_000);
        assert_eq!(store.len(), 1_000);
    }

    #[tokio::test]
    async fn test_concurrent_same_nonce_exactly_one_accepted() {
        use std::sync::Arc;

        let store = Arc::new(InMemoryNonceStore::new());
        let mut tasks = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            tasks.push(tokio::spawn(async move {
                store
                    .check_and_record("moodle", "n-race", NOW, NOW, NonceWindow::default())
                    .await
                    .unwrap()
            }));
        }
        let mut fresh = 0;
        for task in tasks {
            if task.await.unwrap() == NonceCheck::Fresh {
                fresh += 1;
            }
        }
        assert_eq!(fresh, 1);
    }
}
