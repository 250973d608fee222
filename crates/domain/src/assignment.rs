//! The persisted relation between subjects, roles, and entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{EntityRef, GuardName, RoleId, RoleName, SubjectRef};

/// One (subject, role, entity, guard) tuple.
///
/// Tuples are immutable: a role change is modeled as remove + add, never an
/// update in place. At most one tuple exists per (subject, role, entity,
/// guard); the entity reference is always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    /// The principal holding the role.
    pub subject: SubjectRef,
    /// Catalog identifier of the held role.
    pub role_id: RoleId,
    /// Name of the held role.
    pub role_name: RoleName,
    /// The entity the role is scoped to.
    pub entity: EntityRef,
    /// The guard whose catalog the role belongs to.
    pub guard: GuardName,
    /// When the tuple was created.
    pub assigned_at: DateTime<Utc>,
}

/// Aggregate of subjects holding one role on an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleCount {
    /// The counted role.
    pub role: RoleName,
    /// Number of subjects holding it.
    pub subjects: u64,
}
