//! In-process fan-out of role events over a broadcast channel.

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

use critiq_application::RoleEventPublisher;
use critiq_core::AppResult;
use critiq_domain::RoleEvent;

/// Publishes role events to in-process subscribers (notification fan-out,
/// audit writers, cache warmers) over a tokio broadcast channel.
///
/// Publishing never waits for listeners: a send only copies the event into
/// the channel. Slow subscribers that lag past the channel capacity drop
/// the oldest events, which is acceptable for consumers that treat events
/// as hints and re-read the store.
#[derive(Clone)]
pub struct BroadcastRoleEventPublisher {
    sender: broadcast::Sender<RoleEvent>,
}

impl BroadcastRoleEventPublisher {
    /// Creates a publisher with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Opens a new subscription receiving every event published after the
    /// call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RoleEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl RoleEventPublisher for BroadcastRoleEventPublisher {
    async fn publish(&self, event: RoleEvent) -> AppResult<()> {
        let action = event.action();
        if self.sender.send(event).is_err() {
            // No live subscribers; the event is simply not observed.
            debug!(action, "role event published with no subscribers");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use critiq_application::RoleEventPublisher;
    use critiq_core::TenantId;
    use critiq_domain::{EntityKind, EntityRef, RoleEvent, RoleName, SubjectRef};
    use uuid::Uuid;

    use super::BroadcastRoleEventPublisher;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let publisher = BroadcastRoleEventPublisher::new(16);
        let mut receiver = publisher.subscribe();

        let role = RoleName::new("reviewer");
        assert!(role.is_ok());
        let Ok(role) = role else {
            return;
        };

        let event = RoleEvent::RoleAssigned {
            subject: SubjectRef::user(Uuid::new_v4()),
            entity: EntityRef::new(TenantId::new(), EntityKind::Document, Uuid::new_v4()),
            role,
        };

        let published = publisher.publish(event.clone()).await;
        assert!(published.is_ok());

        let received = receiver.recv().await;
        assert_eq!(received.ok(), Some(event));
    }

    #[tokio::test]
    async fn publishing_without_subscribers_succeeds() {
        let publisher = BroadcastRoleEventPublisher::new(16);

        let event = RoleEvent::AllRolesRemoved {
            subject: SubjectRef::user(Uuid::new_v4()),
            entity: EntityRef::new(TenantId::new(), EntityKind::Page, Uuid::new_v4()),
        };

        let published = publisher.publish(event).await;
        assert!(published.is_ok());
    }
}
