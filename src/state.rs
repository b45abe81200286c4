use std::sync::Arc;
use tracing::info;

use crate::cache::{CacheStore, MemoryStore, RedisStore, ResultCache};
use crate::config::Config;
use crate::pipeline::RequestPipeline;
use crate::upstream::UpstreamClient;

// app's shared state, built once at startup and torn down on shutdown
pub struct AppState {
    pub pipeline: RequestPipeline,
}

impl AppState {
    pub fn new(pipeline: RequestPipeline) -> Self {
        Self { pipeline }
    }

    /// Opens the cache backend and builds the upstream client.
    pub async fn connect(config: &Config) -> anyhow::Result<Self> {
        let store: Arc<dyn CacheStore> = match &config.redis_url {
            Some(url) => Arc::new(RedisStore::connect(url, config.cache_timeout).await?),
            None => {
                info!("No redis url configured, using in-process cache");
                Arc::new(MemoryStore::new())
            }
        };
        let cache = ResultCache::new(store, config.cache_ttl).with_timeout(config.cache_timeout);
        let upstream = UpstreamClient::new(&config.upstream)?;

        info!(
            cache = cache.provider_name(),
            ttl_seconds = cache.default_ttl().as_secs(),
            cache_timeout_ms = cache.op_timeout().as_millis() as u64,
            upstream = upstream.url(),
            "Gateway state ready"
        );
        Ok(Self::new(RequestPipeline::new(cache, upstream)))
    }

    pub fn cache(&self) -> &ResultCache {
        self.pipeline.cache()
    }

    /// Releases the cache connection.
    pub async fn shutdown(&self) {
        self.cache().disconnect().await;
        info!("Gateway state shut down");
    }
}
