//! Domain events emitted after committed role mutations.

use serde::{Deserialize, Serialize};

use crate::{EntityRef, RoleName, SubjectRef};

/// Event fired after a role mutation has durably committed.
///
/// Consumers (notification fan-out, audit log, cache warmers) subscribe
/// out-of-band; emission is fire-and-forget and each logical mutation
/// produces its event exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RoleEvent {
    /// A new role tuple was created.
    RoleAssigned {
        /// Principal the role was granted to.
        subject: SubjectRef,
        /// Entity the role is scoped to.
        entity: EntityRef,
        /// The granted role.
        role: RoleName,
    },
    /// An existing role tuple was deleted.
    RoleRemoved {
        /// Principal the role was removed from.
        subject: SubjectRef,
        /// Entity the role was scoped to.
        entity: EntityRef,
        /// The removed role.
        role: RoleName,
    },
    /// Every role a subject held on one entity was cleared.
    AllRolesRemoved {
        /// Principal whose roles were cleared.
        subject: SubjectRef,
        /// Entity the roles were scoped to.
        entity: EntityRef,
    },
    /// A batch synchronization replaced role sets for many subjects.
    BulkRolesUpdated {
        /// Entity whose participant roles were synchronized.
        entity: EntityRef,
        /// Per-subject role sets after the batch.
        changes: Vec<(SubjectRef, Vec<RoleName>)>,
    },
}

impl RoleEvent {
    /// Returns a stable action label for log and audit sinks.
    #[must_use]
    pub fn action(&self) -> &'static str {
        match self {
            Self::RoleAssigned { .. } => "rbac.role.assigned",
            Self::RoleRemoved { .. } => "rbac.role.removed",
            Self::AllRolesRemoved { .. } => "rbac.role.all_removed",
            Self::BulkRolesUpdated { .. } => "rbac.role.bulk_updated",
        }
    }

    /// Returns the entity the event is scoped to.
    #[must_use]
    pub fn entity(&self) -> &EntityRef {
        match self {
            Self::RoleAssigned { entity, .. }
            | Self::RoleRemoved { entity, .. }
            | Self::AllRolesRemoved { entity, .. }
            | Self::BulkRolesUpdated { entity, .. } => entity,
        }
    }
}

#[cfg(test)]
mod tests {
    use critiq_core::TenantId;
    use uuid::Uuid;

    use crate::{EntityKind, EntityRef, RoleName, SubjectRef};

    use super::RoleEvent;

    #[test]
    fn events_serialize_with_a_tag_and_stable_action() {
        let entity = EntityRef::new(TenantId::new(), EntityKind::Document, Uuid::new_v4());
        let role = RoleName::new("reviewer");
        assert!(role.is_ok());
        let Ok(role) = role else {
            return;
        };

        let event = RoleEvent::RoleAssigned {
            subject: SubjectRef::user(Uuid::new_v4()),
            entity,
            role,
        };

        assert_eq!(event.action(), "rbac.role.assigned");

        let encoded = serde_json::to_value(&event);
        assert!(encoded.is_ok());
        if let Ok(value) = encoded {
            assert_eq!(
                value.get("event").and_then(|tag| tag.as_str()),
                Some("role_assigned")
            );
        }
    }
}
