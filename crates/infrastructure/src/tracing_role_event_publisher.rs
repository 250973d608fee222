//! Structured-log sink for role events.

use async_trait::async_trait;
use tracing::info;

use critiq_application::RoleEventPublisher;
use critiq_core::{AppError, AppResult};
use critiq_domain::RoleEvent;

/// Publishes role events as structured log records.
///
/// Useful as the audit trail in deployments without an in-process event
/// bus, and as a secondary sink next to the broadcast publisher.
#[derive(Debug, Clone, Default)]
pub struct TracingRoleEventPublisher;

impl TracingRoleEventPublisher {
    /// Creates the publisher.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RoleEventPublisher for TracingRoleEventPublisher {
    async fn publish(&self, event: RoleEvent) -> AppResult<()> {
        let payload = serde_json::to_string(&event)
            .map_err(|error| AppError::Internal(format!("failed to encode role event: {error}")))?;

        info!(
            action = event.action(),
            entity = %event.entity(),
            payload,
            "role event"
        );

        Ok(())
    }
}
