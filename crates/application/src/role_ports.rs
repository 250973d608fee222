mod cache;
mod events;
mod store;

pub use cache::RoleCacheBackend;
pub use events::RoleEventPublisher;
pub use store::RoleStore;
