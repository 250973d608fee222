//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod broadcast_role_event_publisher;
mod in_memory_role_cache;
mod in_memory_role_store;
mod postgres_role_store;
mod redis_role_cache;
mod role_schema_config;
mod tracing_role_event_publisher;

pub use broadcast_role_event_publisher::BroadcastRoleEventPublisher;
pub use in_memory_role_cache::InMemoryRoleCache;
pub use in_memory_role_store::InMemoryRoleStore;
pub use postgres_role_store::PostgresRoleStore;
pub use redis_role_cache::RedisRoleCache;
pub use role_schema_config::RoleSchemaConfig;
pub use tracing_role_event_publisher::TracingRoleEventPublisher;
