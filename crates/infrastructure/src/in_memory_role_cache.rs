//! In-memory role cache backend for tests and single-process deployments.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use critiq_application::RoleCacheBackend;
use critiq_core::AppResult;

struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// In-memory implementation of the role cache backend port.
#[derive(Default)]
pub struct InMemoryRoleCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl InMemoryRoleCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl RoleCacheBackend for InMemoryRoleCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let entries = self.entries.read().await;

        Ok(entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone()))
    }

    async fn put(&self, key: &str, value: &str, ttl_seconds: u32) -> AppResult<()> {
        if ttl_seconds == 0 {
            return Ok(());
        }

        let entry = CacheEntry {
            value: value.to_owned(),
            expires_at: Instant::now() + Duration::from_secs(u64::from(ttl_seconds)),
        };
        self.entries.write().await.insert(key.to_owned(), entry);
        Ok(())
    }

    async fn forget(&self, key: &str) -> AppResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn forget_prefix(&self, prefix: &str) -> AppResult<()> {
        self.entries
            .write()
            .await
            .retain(|key, _| !key.starts_with(prefix));
        Ok(())
    }
}
