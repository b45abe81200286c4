mod key;
mod memory;
mod redis;

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{CacheError, CacheResult};
use crate::metrics::{CACHE_ERRORS, CACHE_HITS, CACHE_MISSES};
use crate::models::GeneratedCode;

pub use self::key::{KEY_PREFIX, make_cache_key};
pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

/// Upper bound on a single backend call before it counts as failed.
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_millis(500);

/// Key-value backend with per-entry expiry.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// `Ok(None)` on a miss or an expired entry.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Overwrites any existing entry and resets its expiry.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    async fn ping(&self) -> CacheResult<()>;

    async fn disconnect(&self);

    fn provider_name(&self) -> &'static str;
}

/// Cache-aside front for generated code. Backend failures are logged and
/// swallowed: a failed read is a miss, a failed write is a no-op. Every
/// backend call is bounded by `op_timeout`, so a stalled backend fails the
/// same way.
#[derive(Clone)]
pub struct ResultCache {
    store: Arc<dyn CacheStore>,
    default_ttl: Duration,
    op_timeout: Duration,
}

impl ResultCache {
    pub fn new(store: Arc<dyn CacheStore>, default_ttl: Duration) -> Self {
        Self {
            store,
            default_ttl: default_ttl.max(Duration::from_secs(1)),
            op_timeout: DEFAULT_OP_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    pub fn op_timeout(&self) -> Duration {
        self.op_timeout
    }

    async fn bounded<T>(&self, op: impl Future<Output = CacheResult<T>>) -> CacheResult<T> {
        tokio::time::timeout(self.op_timeout, op)
            .await
            .unwrap_or(Err(CacheError::Timeout(self.op_timeout)))
    }

    pub fn in_memory(default_ttl: Duration) -> Self {
        Self::new(Arc::new(MemoryStore::new()), default_ttl)
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn provider_name(&self) -> &'static str {
        self.store.provider_name()
    }

    pub async fn get(&self, key: &str) -> Option<GeneratedCode> {
        let raw = match self.bounded(self.store.get(key)).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                CACHE_MISSES.inc();
                debug!("Cache MISS");
                return None;
            }
            Err(e) => {
                CACHE_ERRORS.inc();
                CACHE_MISSES.inc();
                warn!(error = %e, "Cache read failed, bypassing cache");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(entry) => {
                CACHE_HITS.inc();
                debug!("Cache HIT");
                Some(entry)
            }
            Err(e) => {
                CACHE_ERRORS.inc();
                CACHE_MISSES.inc();
                warn!(error = %e, "Cached value could not be decoded, treating as miss");
                None
            }
        }
    }

    /// Stores with an explicit TTL. Returns whether the value was written.
    pub async fn set(&self, key: &str, value: &GeneratedCode, ttl: Duration) -> bool {
        let ttl = ttl.max(Duration::from_secs(1));
        let result = serde_json::to_string(value)
            .map_err(|e| CacheError::Serialization(e.to_string()));
        let result = match result {
            Ok(json) => self.bounded(self.store.set(key, &json, ttl)).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                debug!(ttl_seconds = ttl.as_secs(), "Cache SET");
                true
            }
            Err(e) => {
                CACHE_ERRORS.inc();
                warn!(error = %e, "Cache write failed, continuing without caching");
                false
            }
        }
    }

    /// Stores with the configured default TTL.
    pub async fn store(&self, key: &str, value: &GeneratedCode) -> bool {
        self.set(key, value, self.default_ttl).await
    }

    pub async fn is_healthy(&self) -> bool {
        match self.bounded(self.store.ping()).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Cache health check failed");
                false
            }
        }
    }

    pub async fn disconnect(&self) {
        if tokio::time::timeout(self.op_timeout, self.store.disconnect())
            .await
            .is_err()
        {
            warn!("Cache disconnect timed out");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    // Backend that is always down
    pub(crate) struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
            Err(CacheError::Connection("connection refused".into()))
        }

        async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> CacheResult<()> {
            Err(CacheError::Connection("connection refused".into()))
        }

        async fn ping(&self) -> CacheResult<()> {
            Err(CacheError::Connection("connection refused".into()))
        }

        async fn disconnect(&self) {}

        fn provider_name(&self) -> &'static str {
            "broken"
        }
    }

    // Backend that accepts calls and never answers
    pub(crate) struct StalledStore;

    #[async_trait]
    impl CacheStore for StalledStore {
        async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
            std::future::pending().await
        }

        async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> CacheResult<()> {
            std::future::pending().await
        }

        async fn ping(&self) -> CacheResult<()> {
            std::future::pending().await
        }

        async fn disconnect(&self) {
            std::future::pending::<()>().await
        }

        fn provider_name(&self) -> &'static str {
            "stalled"
        }
    }

    fn generation(code: &str) -> GeneratedCode {
        GeneratedCode {
            code: code.to_string(),
            explanation: Some("why".to_string()),
        }
    }

    #[tokio::test]
    async fn stored_value_is_returned() {
        let cache = ResultCache::in_memory(Duration::from_secs(3600));
        assert!(cache.store("k", &generation("fn a() {}")).await);
        assert_eq!(cache.get("k").await, Some(generation("fn a() {}")));
    }

    #[tokio::test(start_paused = true)]
    async fn one_second_ttl_is_gone_after_two_seconds() {
        let cache = ResultCache::in_memory(Duration::from_secs(3600));
        assert!(cache.set("k", &generation("x"), Duration::from_secs(1)).await);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn backend_outage_degrades_to_miss_and_no_op() {
        let cache = ResultCache::new(Arc::new(BrokenStore), Duration::from_secs(60));
        assert_eq!(cache.get("k").await, None);
        assert!(!cache.store("k", &generation("x")).await);
        assert!(!cache.is_healthy().await);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_backend_times_out_to_miss_and_no_op() {
        let cache = ResultCache::new(Arc::new(StalledStore), Duration::from_secs(60))
            .with_timeout(Duration::from_millis(100));

        let started = tokio::time::Instant::now();
        assert_eq!(cache.get("k").await, None);
        assert!(!cache.store("k", &generation("x")).await);
        assert!(!cache.is_healthy().await);
        cache.disconnect().await;
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn undecodable_value_is_a_miss() {
        let store = Arc::new(MemoryStore::new());
        store
            .set("k", "not json", Duration::from_secs(60))
            .await
            .unwrap();
        let cache = ResultCache::new(store, Duration::from_secs(60));
        assert_eq!(cache.get("k").await, None);
    }

    #[test]
    fn default_op_timeout_applies() {
        let cache = ResultCache::in_memory(Duration::from_secs(60));
        assert_eq!(cache.op_timeout(), DEFAULT_OP_TIMEOUT);
    }

    #[test]
    fn zero_ttl_is_clamped() {
        let cache = ResultCache::in_memory(Duration::ZERO);
        assert_eq!(cache.default_ttl(), Duration::from_secs(1));
    }
}
