//! Role identity, guard scoping, and role-check selectors.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use critiq_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Catalog identifier for a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleId(Uuid);

impl RoleId {
    /// Creates a new random role identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a role identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RoleId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RoleId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Validated role name.
///
/// Names are trimmed and lowercased on construction so that `Admin` and
/// `admin` always address the same catalog entry. Roles carry no intrinsic
/// permission list; calling code interprets the name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleName(String);

impl RoleName {
    /// Creates a validated, normalized role name.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let normalized = value.into().trim().to_lowercase();
        if normalized.is_empty() {
            return Err(AppError::Validation(
                "role name must not be empty or whitespace".to_owned(),
            ));
        }

        if !normalized
            .chars()
            .all(|character| character.is_ascii_alphanumeric() || matches!(character, '_' | '-'))
        {
            return Err(AppError::Validation(format!(
                "role name '{normalized}' may only contain letters, digits, '_' and '-'"
            )));
        }

        Ok(Self(normalized))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl FromStr for RoleName {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::new(value)
    }
}

impl Display for RoleName {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Named authorization context allowing independent role catalogs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GuardName(String);

impl GuardName {
    /// Creates a validated guard name.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let normalized = value.into().trim().to_lowercase();
        if normalized.is_empty() {
            return Err(AppError::Validation(
                "guard name must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(normalized))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Default for GuardName {
    fn default() -> Self {
        Self("web".to_owned())
    }
}

impl Display for GuardName {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Every shape a role check accepts.
///
/// List forms use OR semantics: the check passes when any listed role is
/// held. An empty list resolves to nothing and is rejected by the check
/// entry points with [`AppError::UnknownRole`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleSelector {
    /// A single role addressed by name.
    Name(RoleName),
    /// A single role addressed by catalog identifier.
    Id(RoleId),
    /// Any of the named roles.
    Names(Vec<RoleName>),
    /// Any of the identified roles.
    Ids(Vec<RoleId>),
}

impl RoleSelector {
    /// Returns true when the selector addresses no role at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Name(_) | Self::Id(_) => false,
            Self::Names(names) => names.is_empty(),
            Self::Ids(ids) => ids.is_empty(),
        }
    }

    /// Returns the role names the selector addresses, if it is name-based.
    #[must_use]
    pub fn names(&self) -> Option<Vec<RoleName>> {
        match self {
            Self::Name(name) => Some(vec![name.clone()]),
            Self::Names(names) => Some(names.clone()),
            Self::Id(_) | Self::Ids(_) => None,
        }
    }

    /// Returns the role ids the selector addresses, if it is id-based.
    #[must_use]
    pub fn ids(&self) -> Option<Vec<RoleId>> {
        match self {
            Self::Id(id) => Some(vec![*id]),
            Self::Ids(ids) => Some(ids.clone()),
            Self::Name(_) | Self::Names(_) => None,
        }
    }
}

impl From<RoleName> for RoleSelector {
    fn from(value: RoleName) -> Self {
        Self::Name(value)
    }
}

impl From<RoleId> for RoleSelector {
    fn from(value: RoleId) -> Self {
        Self::Id(value)
    }
}

impl From<Vec<RoleName>> for RoleSelector {
    fn from(value: Vec<RoleName>) -> Self {
        Self::Names(value)
    }
}

impl From<Vec<RoleId>> for RoleSelector {
    fn from(value: Vec<RoleId>) -> Self {
        Self::Ids(value)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::{RoleName, RoleSelector};

    #[test]
    fn role_name_normalizes_case_and_whitespace() {
        let name = RoleName::new("  Reviewer ");
        assert_eq!(name.ok().map(|value| value.as_str().to_owned()), Some("reviewer".to_owned()));
    }

    #[test]
    fn role_name_rejects_invalid_characters() {
        assert!(RoleName::new("admin!").is_err());
        assert!(RoleName::new("   ").is_err());
    }

    #[test]
    fn empty_list_selectors_are_empty() {
        assert!(RoleSelector::Names(Vec::new()).is_empty());
        assert!(RoleSelector::Ids(Vec::new()).is_empty());

        let name = RoleName::new("admin");
        assert!(name.is_ok());
        if let Ok(name) = name {
            assert!(!RoleSelector::Name(name).is_empty());
        }
    }

    proptest! {
        #[test]
        fn role_name_construction_is_idempotent(raw in "[a-zA-Z0-9_-]{1,24}") {
            let first = RoleName::new(raw.as_str());
            prop_assert!(first.is_ok());
            if let Ok(first) = first {
                let second = RoleName::new(first.as_str());
                prop_assert_eq!(second.ok(), Some(first));
            }
        }
    }
}
