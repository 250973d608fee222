use async_trait::async_trait;
use critiq_core::AppResult;

/// Low-level cache backend port for role projections.
///
/// Implementations hold derived, disposable data only; entries carry no
/// authority and may vanish at any time. The service layer treats every
/// backend failure as a miss.
#[async_trait]
pub trait RoleCacheBackend: Send + Sync {
    /// Returns the stored value for one key, if present.
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Stores a value under one key with a TTL in seconds.
    async fn put(&self, key: &str, value: &str, ttl_seconds: u32) -> AppResult<()>;

    /// Drops one key.
    async fn forget(&self, key: &str) -> AppResult<()>;

    /// Drops every key starting with the prefix.
    async fn forget_prefix(&self, prefix: &str) -> AppResult<()>;
}
