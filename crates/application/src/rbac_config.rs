use std::collections::HashSet;
use std::env;
use std::str::FromStr;

use critiq_core::{AppError, AppResult};
use critiq_domain::{GuardName, SubjectKind};

/// Runtime configuration consumed by the role services.
#[derive(Debug, Clone)]
pub struct RbacConfig {
    /// Guard used when a caller does not name one.
    pub default_guard: GuardName,
    /// Disables domain-event emission globally when false.
    pub events_enabled: bool,
    /// TTL safety net for cache entries, in seconds. Invalidation keeps
    /// entries coherent; the TTL only bounds staleness after a cache
    /// backend outage.
    pub cache_ttl_seconds: u32,
    /// Subject kinds that support entity-scoped roles. Operations on any
    /// other kind fail fast with a capability error.
    pub role_capable_subjects: HashSet<SubjectKind>,
}

impl Default for RbacConfig {
    fn default() -> Self {
        Self {
            default_guard: GuardName::default(),
            events_enabled: true,
            cache_ttl_seconds: 3600,
            role_capable_subjects: HashSet::from([SubjectKind::User, SubjectKind::ServiceAccount]),
        }
    }
}

impl RbacConfig {
    /// Loads the configuration from the environment, falling back to
    /// defaults for absent variables.
    pub fn from_env() -> AppResult<Self> {
        let defaults = Self::default();

        let default_guard = match env::var("CRITIQ_RBAC_GUARD") {
            Ok(value) => GuardName::new(value)?,
            Err(_) => defaults.default_guard,
        };

        let events_enabled = env::var("CRITIQ_RBAC_EVENTS")
            .map(|value| !value.eq_ignore_ascii_case("false"))
            .unwrap_or(defaults.events_enabled);

        let cache_ttl_seconds = match env::var("CRITIQ_RBAC_CACHE_TTL_SECONDS") {
            Ok(value) => value.parse::<u32>().map_err(|error| {
                AppError::Validation(format!("invalid CRITIQ_RBAC_CACHE_TTL_SECONDS: {error}"))
            })?,
            Err(_) => defaults.cache_ttl_seconds,
        };

        let role_capable_subjects = match env::var("CRITIQ_RBAC_SUBJECT_KINDS") {
            Ok(value) => {
                let mut kinds = HashSet::new();
                for raw in value.split(',').map(str::trim).filter(|raw| !raw.is_empty()) {
                    kinds.insert(SubjectKind::from_str(raw)?);
                }
                if kinds.is_empty() {
                    return Err(AppError::Validation(
                        "CRITIQ_RBAC_SUBJECT_KINDS must name at least one subject kind".to_owned(),
                    ));
                }
                kinds
            }
            Err(_) => defaults.role_capable_subjects,
        };

        Ok(Self {
            default_guard,
            events_enabled,
            cache_ttl_seconds,
            role_capable_subjects,
        })
    }

    /// Resolves an optional caller-supplied guard against the default.
    #[must_use]
    pub fn resolve_guard(&self, guard: Option<&GuardName>) -> GuardName {
        guard.cloned().unwrap_or_else(|| self.default_guard.clone())
    }

    /// Returns whether the subject kind supports entity-scoped roles.
    #[must_use]
    pub fn supports_roles(&self, kind: SubjectKind) -> bool {
        self.role_capable_subjects.contains(&kind)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use critiq_domain::{GuardName, SubjectKind};

    use super::RbacConfig;

    #[test]
    fn default_guard_is_web() {
        let config = RbacConfig::default();
        assert_eq!(config.default_guard.as_str(), "web");
        assert!(config.events_enabled);
    }

    #[test]
    fn resolve_guard_prefers_the_caller_value() {
        let config = RbacConfig::default();
        let api = GuardName::new("api");
        assert!(api.is_ok());
        if let Ok(api) = api {
            assert_eq!(config.resolve_guard(Some(&api)).as_str(), "api");
        }
        assert_eq!(config.resolve_guard(None).as_str(), "web");
    }

    #[test]
    fn capability_set_is_consulted_per_kind() {
        let config = RbacConfig {
            role_capable_subjects: HashSet::from([SubjectKind::User]),
            ..RbacConfig::default()
        };
        assert!(config.supports_roles(SubjectKind::User));
        assert!(!config.supports_roles(SubjectKind::ServiceAccount));
    }
}
