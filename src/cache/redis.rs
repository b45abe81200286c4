use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, RedisError};
use std::time::Duration;
use tracing::{debug, info};

use super::CacheStore;
use crate::error::{CacheError, CacheResult};

// Reconnect attempts made by the manager before an operation gives up
const RECONNECT_RETRIES: usize = 1;

/// Shared Redis connection. Connect and every command are bounded by
/// `timeout`, so a server that accepts but stops answering reads as an error
/// instead of hanging the request.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    timeout: Duration,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Opens the connection. Called once at startup.
    pub async fn connect(url: &str, timeout: Duration) -> CacheResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| CacheError::Connection(format!("bad redis url: {e}")))?;
        // the address carries no credentials, unlike the url
        let addr = client.get_connection_info().addr.to_string();

        let config = ConnectionManagerConfig::new()
            .set_connection_timeout(timeout)
            .set_response_timeout(timeout)
            .set_number_of_retries(RECONNECT_RETRIES);

        // the manager retries internally; cap the whole startup attempt too
        let budget = timeout * (RECONNECT_RETRIES as u32 + 2);
        let connection =
            match tokio::time::timeout(budget, ConnectionManager::new_with_config(client, config))
                .await
            {
                Ok(Ok(connection)) => connection,
                Ok(Err(e)) => {
                    return Err(CacheError::Connection(format!(
                        "could not reach redis at {addr}: {e}"
                    )));
                }
                Err(_) => {
                    return Err(CacheError::Connection(format!(
                        "redis at {addr} did not answer within {budget:?}"
                    )));
                }
            };

        info!(%addr, ?timeout, "Connected to redis cache");
        Ok(Self {
            connection,
            timeout,
        })
    }

    fn command_error(&self, command: &str, err: RedisError) -> CacheError {
        if err.is_timeout() {
            CacheError::Timeout(self.timeout)
        } else if err.is_connection_dropped() || err.is_connection_refusal() || err.is_io_error() {
            CacheError::Connection(format!("redis {command}: {err}"))
        } else {
            CacheError::Backend(format!("redis {command}: {err}"))
        }
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| self.command_error("GET", e))?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.connection.clone();
        // SETEX refuses a zero expiry
        let seconds = ttl.as_secs().max(1);
        let _: () = conn
            .set_ex(key, value, seconds)
            .await
            .map_err(|e| self.command_error("SETEX", e))?;
        Ok(())
    }

    async fn ping(&self) -> CacheResult<()> {
        let mut conn = self.connection.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| self.command_error("PING", e))?;
        Ok(())
    }

    async fn disconnect(&self) {
        // the socket closes once the last manager clone is dropped
        let mut conn = self.connection.clone();
        let quit: redis::RedisResult<()> = redis::cmd("QUIT").query_async(&mut conn).await;
        if let Err(e) = quit {
            debug!(error = %e, "redis QUIT failed during shutdown");
        }
        info!("Disconnected from redis cache");
    }

    fn provider_name(&self) -> &'static str {
        "redis"
    }
}
