use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use super::CacheStore;
use crate::error::CacheResult;
use crate::metrics::CACHE_SIZE;

// How often a write also clears out expired entries
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

// Cache entry with expiry
#[derive(Clone, Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-process store. Expired entries are unreadable right away and are
/// physically removed either on the next read of the same key or by the
/// sweep that runs at most once per `SWEEP_INTERVAL` on write.
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
    started: Instant,
    // millis since `started` at which the next sweep is due
    next_sweep_ms: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            started: Instant::now(),
            next_sweep_ms: AtomicU64::new(SWEEP_INTERVAL.as_millis() as u64),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        let removed = before.saturating_sub(self.entries.len());
        CACHE_SIZE.set(self.entries.len() as f64);
        removed
    }

    fn sweep_if_due(&self) {
        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        let due_ms = self.next_sweep_ms.load(Ordering::Acquire);
        if elapsed_ms < due_ms {
            return;
        }
        // one writer wins the sweep, the rest carry on
        let next = elapsed_ms + SWEEP_INTERVAL.as_millis() as u64;
        if self
            .next_sweep_ms
            .compare_exchange(due_ms, next, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let removed = self.purge_expired();
            if removed > 0 {
                debug!(removed, "Swept expired cache entries");
            }
        }
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let now = Instant::now();
        // expired? drop it
        if self
            .entries
            .remove_if(key, |_, entry| entry.expires_at <= now)
            .is_some()
        {
            return Ok(None);
        }
        Ok(self.entries.get(key).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        self.sweep_if_due();
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        CACHE_SIZE.set(self.entries.len() as f64);
        Ok(())
    }

    async fn ping(&self) -> CacheResult<()> {
        Ok(())
    }

    async fn disconnect(&self) {
        self.entries.clear();
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}
