//! Time-bounded cache for the finalized feed.
//!
//! Holds the last computed feed with the instant it was computed. A lookup
//! within the TTL returns it as-is; otherwise the feed is recomputed, one
//! caller at a time. A failed recomputation keeps the previous feed, which is
//! then served as stale for one TTL period. Invalidation clears the timestamp
//! but keeps the feed.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::models::Feed;

/// Result of asking the cache for a feed.
#[derive(Debug, Clone)]
pub enum FeedStatus {
    /// Computed within the TTL (possibly just now).
    Fresh(Arc<Feed>),
    /// Recomputation failed; this is the last good feed.
    Stale { feed: Arc<Feed>, error: String },
    /// Recomputation failed and nothing was cached.
    Failed(String),
}

#[derive(Debug, Default)]
struct CacheState {
    feed: Option<Arc<Feed>>,
    computed_at: Option<Instant>,
    /// Error from the last recompute when it failed and `feed` is older.
    error: Option<String>,
}

/// Feed cache with a fixed time-to-live.
#[derive(Debug)]
pub struct FeedCache {
    ttl: Duration,
    state: RwLock<CacheState>,
    refresh: Mutex<()>,
}

impl FeedCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: RwLock::new(CacheState::default()),
            refresh: Mutex::new(()),
        }
    }

    /// What the cache holds, if the last recompute happened within the TTL.
    async fn cached(&self) -> Option<FeedStatus> {
        let state = self.state.read().await;
        let feed = match (&state.feed, state.computed_at) {
            (Some(feed), Some(at)) if at.elapsed() < self.ttl => Arc::clone(feed),
            _ => return None,
        };
        Some(match &state.error {
            Some(error) => FeedStatus::Stale {
                feed,
                error: error.clone(),
            },
            None => FeedStatus::Fresh(feed),
        })
    }

    /// Return the cached feed, recomputing it with `compute` if expired.
    ///
    /// A failed recompute with an older feed on hand is itself cached: the
    /// old feed is served as stale until the TTL runs out or the cache is
    /// invalidated.
    pub async fn get_or_refresh<F, Fut, E>(&self, compute: F) -> FeedStatus
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Feed, E>>,
        E: Display,
    {
        if let Some(status) = self.cached().await {
            return status;
        }

        let _guard = self.refresh.lock().await;

        // Another caller may have finished a refresh while we waited.
        if let Some(status) = self.cached().await {
            return status;
        }

        debug!("Feed cache expired, recomputing");
        let result = compute().await;
        let mut state = self.state.write().await;
        match result {
            Ok(feed) => {
                let feed = Arc::new(feed);
                state.feed = Some(Arc::clone(&feed));
                state.computed_at = Some(Instant::now());
                state.error = None;
                FeedStatus::Fresh(feed)
            }
            Err(e) => {
                warn!("Feed refresh failed: {}", e);
                let error = e.to_string();
                match state.feed.clone() {
                    Some(feed) => {
                        state.computed_at = Some(Instant::now());
                        state.error = Some(error.clone());
                        FeedStatus::Stale { feed, error }
                    }
                    None => FeedStatus::Failed(error),
                }
            }
        }
    }

    /// Force the next lookup to recompute.
    pub async fn invalidate(&self) {
        self.state.write().await.computed_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::models::{Agency, BreachRecord};

    fn feed(name: &str) -> Feed {
        Feed::new(vec![BreachRecord::new(Agency::Maine).with_entity(name)])
    }

    fn entity(status: &FeedStatus) -> Option<&str> {
        match status {
            FeedStatus::Fresh(feed) | FeedStatus::Stale { feed, .. } => {
                feed.records[0].entity_name.as_deref()
            }
            FeedStatus::Failed(_) => None,
        }
    }

    #[tokio::test]
    async fn test_hit_within_ttl_does_not_recompute() {
        let cache = FeedCache::new(Duration::from_secs(3600));
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let status = cache
                .get_or_refresh(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(feed("Acme"))
                })
                .await;
            assert!(matches!(status, FeedStatus::Fresh(_)));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_ttl_always_recomputes() {
        let cache = FeedCache::new(Duration::ZERO);
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            cache
                .get_or_refresh(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(feed("Acme"))
                })
                .await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_recompute() {
        let cache = FeedCache::new(Duration::from_secs(3600));
        cache
            .get_or_refresh(|| async { Ok::<_, String>(feed("Old")) })
            .await;
        cache.invalidate().await;

        let status = cache
            .get_or_refresh(|| async { Ok::<_, String>(feed("New")) })
            .await;
        assert!(matches!(status, FeedStatus::Fresh(_)));
        assert_eq!(entity(&status), Some("New"));
    }

    #[tokio::test]
    async fn test_failure_without_previous_feed() {
        let cache = FeedCache::new(Duration::from_secs(3600));
        let status = cache
            .get_or_refresh(|| async { Err::<Feed, _>("all sources failed") })
            .await;
        assert!(matches!(status, FeedStatus::Failed(msg) if msg == "all sources failed"));

        // Nothing to fall back on, so the next lookup tries again.
        let status = cache
            .get_or_refresh(|| async { Ok::<_, String>(feed("Recovered")) })
            .await;
        assert_eq!(entity(&status), Some("Recovered"));
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_feed() {
        let cache = FeedCache::new(Duration::from_secs(3600));
        cache
            .get_or_refresh(|| async { Ok::<_, String>(feed("Kept")) })
            .await;
        cache.invalidate().await;

        let status = cache
            .get_or_refresh(|| async { Err::<Feed, _>("network down") })
            .await;
        match status {
            FeedStatus::Stale { feed, error } => {
                assert_eq!(feed.records[0].entity_name.as_deref(), Some("Kept"));
                assert_eq!(error, "network down");
            }
            other => panic!("expected stale feed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_refresh_is_not_retried_within_ttl() {
        let cache = FeedCache::new(Duration::from_millis(50));
        cache
            .get_or_refresh(|| async { Ok::<_, String>(feed("Kept")) })
            .await;
        tokio::time::sleep(Duration::from_millis(80)).await;

        let calls = AtomicUsize::new(0);
        for _ in 0..5 {
            let status = cache
                .get_or_refresh(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<Feed, _>("network down")
                })
                .await;
            assert!(matches!(status, FeedStatus::Stale { ref error, .. } if error == "network down"));
            assert_eq!(entity(&status), Some("Kept"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // A manual refresh tries again and clears the stale marker.
        cache.invalidate().await;
        let status = cache
            .get_or_refresh(|| async { Ok::<_, String>(feed("New")) })
            .await;
        assert!(matches!(status, FeedStatus::Fresh(_)));
        assert_eq!(entity(&status), Some("New"));
    }
}
