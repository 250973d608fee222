//! Typed references to principals that can hold roles.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use critiq_core::AppError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Principal kinds that may hold entity-scoped roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    /// A human user account.
    User,
    /// A machine principal acting through the API.
    ServiceAccount,
}

impl SubjectKind {
    /// Returns a stable storage value for this kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::ServiceAccount => "service_account",
        }
    }
}

impl FromStr for SubjectKind {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "service_account" => Ok(Self::ServiceAccount),
            _ => Err(AppError::Validation(format!(
                "unknown subject kind '{value}'"
            ))),
        }
    }
}

/// Reference to one principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectRef {
    kind: SubjectKind,
    id: Uuid,
}

impl SubjectRef {
    /// Creates a subject reference.
    #[must_use]
    pub fn new(kind: SubjectKind, id: Uuid) -> Self {
        Self { kind, id }
    }

    /// Creates a reference to a user principal.
    #[must_use]
    pub fn user(id: Uuid) -> Self {
        Self::new(SubjectKind::User, id)
    }

    /// Returns the subject kind.
    #[must_use]
    pub fn kind(&self) -> SubjectKind {
        self.kind
    }

    /// Returns the subject identifier.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Display for SubjectRef {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}/{}", self.kind.as_str(), self.id)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::SubjectKind;

    #[test]
    fn subject_kind_roundtrip_storage_value() {
        let restored = SubjectKind::from_str(SubjectKind::ServiceAccount.as_str());
        assert_eq!(restored.ok(), Some(SubjectKind::ServiceAccount));
    }

    #[test]
    fn unknown_subject_kind_is_rejected() {
        assert!(SubjectKind::from_str("robot").is_err());
    }
}
