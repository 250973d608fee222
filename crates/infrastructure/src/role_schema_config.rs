//! Table and column naming for the role assignment store.

use std::env;

use critiq_core::{AppError, AppResult};

/// Naming configuration for the tables and polymorphic key columns the
/// Postgres store reads and writes.
///
/// Names are spliced into SQL text, so every value is validated as a bare
/// SQL identifier before the store will accept it.
#[derive(Debug, Clone)]
pub struct RoleSchemaConfig {
    /// Role catalog table.
    pub roles_table: String,
    /// Assignment tuple table.
    pub assignments_table: String,
    /// Column holding the subject kind discriminator.
    pub subject_kind_column: String,
    /// Column holding the subject identifier.
    pub subject_id_column: String,
    /// Column holding the entity kind discriminator.
    pub entity_kind_column: String,
    /// Column holding the entity identifier.
    pub entity_id_column: String,
}

impl Default for RoleSchemaConfig {
    fn default() -> Self {
        Self {
            roles_table: "rbac_roles".to_owned(),
            assignments_table: "rbac_role_assignments".to_owned(),
            subject_kind_column: "subject_kind".to_owned(),
            subject_id_column: "subject_id".to_owned(),
            entity_kind_column: "entity_kind".to_owned(),
            entity_id_column: "entity_id".to_owned(),
        }
    }
}

impl RoleSchemaConfig {
    /// Loads naming overrides from the environment, keeping defaults for
    /// absent variables.
    pub fn from_env() -> AppResult<Self> {
        let defaults = Self::default();

        let config = Self {
            roles_table: env_or("CRITIQ_RBAC_ROLES_TABLE", defaults.roles_table),
            assignments_table: env_or(
                "CRITIQ_RBAC_ASSIGNMENTS_TABLE",
                defaults.assignments_table,
            ),
            subject_kind_column: env_or(
                "CRITIQ_RBAC_SUBJECT_KIND_COLUMN",
                defaults.subject_kind_column,
            ),
            subject_id_column: env_or("CRITIQ_RBAC_SUBJECT_ID_COLUMN", defaults.subject_id_column),
            entity_kind_column: env_or(
                "CRITIQ_RBAC_ENTITY_KIND_COLUMN",
                defaults.entity_kind_column,
            ),
            entity_id_column: env_or("CRITIQ_RBAC_ENTITY_ID_COLUMN", defaults.entity_id_column),
        };

        config.validate()?;
        Ok(config)
    }

    /// Ensures every configured name is a bare SQL identifier.
    pub fn validate(&self) -> AppResult<()> {
        for (name, value) in [
            ("roles table", self.roles_table.as_str()),
            ("assignments table", self.assignments_table.as_str()),
            ("subject kind column", self.subject_kind_column.as_str()),
            ("subject id column", self.subject_id_column.as_str()),
            ("entity kind column", self.entity_kind_column.as_str()),
            ("entity id column", self.entity_id_column.as_str()),
        ] {
            validate_identifier(name, value)?;
        }

        Ok(())
    }
}

fn env_or(variable: &str, default: String) -> String {
    env::var(variable)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or(default)
}

fn validate_identifier(name: &str, value: &str) -> AppResult<()> {
    let mut characters = value.chars();

    let valid_head = characters
        .next()
        .is_some_and(|head| head.is_ascii_alphabetic() || head == '_');
    let valid_tail =
        characters.all(|character| character.is_ascii_alphanumeric() || character == '_');

    if valid_head && valid_tail {
        return Ok(());
    }

    Err(AppError::Validation(format!(
        "{name} '{value}' is not a valid SQL identifier"
    )))
}

#[cfg(test)]
mod tests {
    use super::{RoleSchemaConfig, validate_identifier};

    #[test]
    fn default_names_are_valid_identifiers() {
        let config = RoleSchemaConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn quoted_or_spaced_identifiers_are_rejected() {
        assert!(validate_identifier("roles table", "rbac roles").is_err());
        assert!(validate_identifier("roles table", "rbac_roles; DROP TABLE users").is_err());
        assert!(validate_identifier("roles table", "1roles").is_err());
    }
}
