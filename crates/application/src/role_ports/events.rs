use async_trait::async_trait;
use critiq_core::AppResult;
use critiq_domain::RoleEvent;

/// Port for handing committed role mutations to out-of-band consumers.
///
/// Publishing is fire-and-forget: implementations hand the event off
/// (channel send, log write) and return without waiting for listeners.
#[async_trait]
pub trait RoleEventPublisher: Send + Sync {
    /// Publishes one event.
    async fn publish(&self, event: RoleEvent) -> AppResult<()>;
}
