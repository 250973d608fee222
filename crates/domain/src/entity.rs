//! Typed references to the resources roles are scoped to.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use critiq_core::{AppError, TenantId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Resource kinds that can own role assignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A collaborative document.
    Document,
    /// A client-facing deliverable.
    Deliverable,
    /// A page inside a document.
    Page,
    /// An uploaded media asset (video, audio, image).
    MediaAsset,
}

impl EntityKind {
    /// Returns a stable storage value for this kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Deliverable => "deliverable",
            Self::Page => "page",
            Self::MediaAsset => "media_asset",
        }
    }

    /// Returns all known entity kinds.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[EntityKind] = &[
            EntityKind::Document,
            EntityKind::Deliverable,
            EntityKind::Page,
            EntityKind::MediaAsset,
        ];

        ALL
    }
}

impl FromStr for EntityKind {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "document" => Ok(Self::Document),
            "deliverable" => Ok(Self::Deliverable),
            "page" => Ok(Self::Page),
            "media_asset" => Ok(Self::MediaAsset),
            _ => Err(AppError::Validation(format!(
                "unknown entity kind '{value}'"
            ))),
        }
    }
}

/// Reference to one entity that roles are scoped to.
///
/// Every role assignment carries one of these; there is no representation
/// for an absent entity, so a global role cannot be expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    tenant_id: TenantId,
    kind: EntityKind,
    id: Uuid,
}

impl EntityRef {
    /// Creates an entity reference from tenancy and identity data.
    #[must_use]
    pub fn new(tenant_id: TenantId, kind: EntityKind, id: Uuid) -> Self {
        Self {
            tenant_id,
            kind,
            id,
        }
    }

    /// Returns the tenant partition the entity belongs to.
    #[must_use]
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Returns the entity kind.
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Returns the entity identifier.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Display for EntityRef {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}/{}", self.kind.as_str(), self.id)
    }
}
