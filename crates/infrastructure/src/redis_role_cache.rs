//! Redis-backed role cache backend.

use async_trait::async_trait;
use redis::AsyncCommands;

use critiq_application::RoleCacheBackend;
use critiq_core::{AppError, AppResult};

/// Redis implementation of the role cache backend port.
///
/// Entries are plain TTL'd strings. Prefix invalidation walks the keyspace
/// with `SCAN` so it never blocks the server the way `KEYS` would.
#[derive(Clone)]
pub struct RedisRoleCache {
    client: redis::Client,
    key_prefix: String,
}

impl RedisRoleCache {
    /// Creates a cache adapter with a configured Redis client and key
    /// prefix.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn key_for(&self, key: &str) -> String {
        format!("{}:{key}", self.key_prefix)
    }

    async fn connection(&self) -> AppResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))
    }
}

#[async_trait]
impl RoleCacheBackend for RedisRoleCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut connection = self.connection().await?;

        connection.get(self.key_for(key)).await.map_err(|error| {
            AppError::Internal(format!("failed to read role cache entry: {error}"))
        })
    }

    async fn put(&self, key: &str, value: &str, ttl_seconds: u32) -> AppResult<()> {
        if ttl_seconds == 0 {
            return Ok(());
        }

        let mut connection = self.connection().await?;

        connection
            .set_ex(self.key_for(key), value, u64::from(ttl_seconds))
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to write role cache entry: {error}"))
            })
    }

    async fn forget(&self, key: &str) -> AppResult<()> {
        let mut connection = self.connection().await?;

        let _: u64 = connection.del(self.key_for(key)).await.map_err(|error| {
            AppError::Internal(format!("failed to drop role cache entry: {error}"))
        })?;

        Ok(())
    }

    async fn forget_prefix(&self, prefix: &str) -> AppResult<()> {
        let mut connection = self.connection().await?;
        let pattern = format!("{}*", self.key_for(prefix));

        let mut cursor: u64 = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern.as_str())
                .arg("COUNT")
                .arg(200)
                .query_async(&mut connection)
                .await
                .map_err(|error| {
                    AppError::Internal(format!("failed to scan role cache keys: {error}"))
                })?;

            if !keys.is_empty() {
                let _: u64 = connection.del(keys).await.map_err(|error| {
                    AppError::Internal(format!("failed to drop role cache entries: {error}"))
                })?;
            }

            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        Ok(())
    }
}
