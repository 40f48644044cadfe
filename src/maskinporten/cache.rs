//! Time-bounded single value cache with single-flight refresh
//!
//! [`ExpiringCache`] holds at most one value produced by a [`Retriever`].
//! Readers take a shared lock while the value is fresh. When it is stale, the
//! first caller to win the exclusive lock refreshes it and every caller that
//! queued behind that lock observes the refreshed value instead of issuing a
//! second fetch. Failed fetches are never cached.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::error::Result;

/// Produces a fresh value for an [`ExpiringCache`].
#[async_trait]
pub trait Retriever<T>: Send + Sync {
    async fn retrieve(&self) -> Result<T>;
}

#[async_trait]
impl<T, F, Fut> Retriever<T> for F
where
    T: Send + 'static,
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    async fn retrieve(&self) -> Result<T> {
        (self)().await
    }
}

struct Cached<T> {
    value: Option<Arc<T>>,
    fetched_at: Option<Instant>,
}

impl<T> Cached<T> {
    fn fresh(&self, ttl: Duration) -> Option<Arc<T>> {
        match (&self.value, self.fetched_at) {
            (Some(value), Some(at)) if at.elapsed() <= ttl => Some(Arc::clone(value)),
            _ => None,
        }
    }
}

pub struct ExpiringCache<T> {
    name: &'static str,
    ttl: Duration,
    retriever: Box<dyn Retriever<T>>,
    state: RwLock<Cached<T>>,
}

impl<T: Send + Sync + 'static> ExpiringCache<T> {
    pub fn new(name: &'static str, ttl: Duration, retriever: impl Retriever<T> + 'static) -> Self {
        Self {
            name,
            ttl,
            retriever: Box::new(retriever),
            state: RwLock::new(Cached {
                value: None,
                fetched_at: None,
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached value, fetching it first if it is missing or stale.
    ///
    /// Dropping the returned future (for instance through
    /// `tokio::time::timeout`) abandons the fetch without touching the cached
    /// state.
    pub async fn get(&self) -> Result<Arc<T>> {
        if let Some(value) = self.state.read().await.fresh(self.ttl) {
            debug!(cache = self.name, "cache hit");
            return Ok(value);
        }

        let mut state = self.state.write().await;

        // Another caller may have refreshed while we waited for the lock.
        if let Some(value) = state.fresh(self.ttl) {
            debug!(cache = self.name, "refreshed by concurrent caller");
            return Ok(value);
        }

        debug!(cache = self.name, "cache miss, fetching");
        let value = Arc::new(self.retriever.retrieve().await?);
        state.value = Some(Arc::clone(&value));
        state.fetched_at = Some(Instant::now());

        Ok(value)
    }

    /// Drop the cached value so the next `get` fetches again.
    pub async fn invalidate(&self) {
        let mut state = self.state.write().await;
        state.value = None;
        state.fetched_at = None;
    }
}

impl<T> std::fmt::Debug for ExpiringCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiringCache")
            .field("name", &self.name)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_cache(
        ttl: Duration,
        delay: Duration,
        calls: Arc<AtomicUsize>,
    ) -> ExpiringCache<usize> {
        ExpiringCache::new("test", ttl, move || {
            let calls = Arc::clone(&calls);
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                tokio::time::sleep(delay).await;
                Ok(n)
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_value_is_reused_within_ttl() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = counting_cache(Duration::from_secs(60), Duration::ZERO, calls.clone());

        let first = cache.get().await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        let second = cache.get().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_value_is_refreshed_after_ttl() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = counting_cache(Duration::from_secs(60), Duration::ZERO, calls.clone());

        assert_eq!(*cache.get().await.unwrap(), 1);
        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(*cache.get().await.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_fetch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = Arc::new(counting_cache(
            Duration::from_secs(60),
            Duration::from_millis(50),
            calls.clone(),
        ));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.get().await.map(|v| *v) })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 1);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let cache: ExpiringCache<String> =
            ExpiringCache::new("failing", Duration::from_secs(60), move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(Error::UnexpectedStatusError {
                        status: 503,
                        url: "http://example.com".to_string(),
                    })
                }
            });

        assert!(cache.get().await.is_err());
        assert!(cache.get().await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.state.read().await.value.is_none());
        assert!(cache.state.read().await.fetched_at.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_fetch_leaves_cache_unset() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = counting_cache(
            Duration::from_secs(60),
            Duration::from_secs(10),
            calls.clone(),
        );

        let timed_out = tokio::time::timeout(Duration::from_secs(1), cache.get()).await;
        assert!(timed_out.is_err());
        assert!(cache.state.read().await.value.is_none());

        // The next caller fetches again and the lock is not left held.
        assert_eq!(*cache.get().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = counting_cache(Duration::from_secs(60), Duration::ZERO, calls.clone());

        cache.get().await.unwrap();
        cache.invalidate().await;
        cache.get().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
