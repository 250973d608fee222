use std::sync::Arc;

use async_trait::async_trait;
use critiq_core::{AppError, AppResult};
use critiq_domain::{EntityRef, GuardName, RoleName, RoleSelector, SubjectRef};

use crate::role_assignment_service::require_entity_scope;
use crate::{RbacConfig, RoleAssignmentService, RoleCacheService, RoleStore};

/// The subject viewpoint: operations a principal exposes for roles on a
/// target entity.
///
/// The entity parameter is mandatory on every method; an entity-less role
/// grant or check cannot be expressed through this API. The historical
/// global-role surface survives only as [`DirectPermissions`], where each
/// member fails loudly with the entity-scoped replacement named.
#[derive(Clone)]
pub struct SubjectRoleService {
    assignments: RoleAssignmentService,
    cache: RoleCacheService,
    store: Arc<dyn RoleStore>,
    config: RbacConfig,
}

impl SubjectRoleService {
    /// Creates the subject-facing service from its dependencies.
    #[must_use]
    pub fn new(
        assignments: RoleAssignmentService,
        cache: RoleCacheService,
        store: Arc<dyn RoleStore>,
        config: RbacConfig,
    ) -> Self {
        Self {
            assignments,
            cache,
            store,
            config,
        }
    }

    /// Assigns one role to the subject, scoped to the entity.
    pub async fn assign_role(
        &self,
        subject: &SubjectRef,
        role: &RoleName,
        entity: &EntityRef,
    ) -> AppResult<()> {
        self.require_capability(subject)?;
        self.assignments.assign(subject, role, entity, None).await
    }

    /// Assigns several roles to the subject on the same entity, as one
    /// atomic batch.
    pub async fn assign_roles(
        &self,
        subject: &SubjectRef,
        roles: &[RoleName],
        entity: &EntityRef,
    ) -> AppResult<()> {
        self.require_capability(subject)?;
        self.assignments
            .assign_many(subject, roles, entity, None, false)
            .await
    }

    /// Removes one role from the subject on the entity.
    pub async fn remove_role(
        &self,
        subject: &SubjectRef,
        role: &RoleName,
        entity: &EntityRef,
    ) -> AppResult<()> {
        self.require_capability(subject)?;
        self.assignments.remove(subject, role, entity, None).await
    }

    /// Lists the role names the subject holds on the entity. Returns an
    /// empty list when the subject has no assignment record.
    pub async fn roles_on(
        &self,
        subject: &SubjectRef,
        entity: &EntityRef,
        guard: Option<&GuardName>,
    ) -> AppResult<Vec<RoleName>> {
        self.require_capability(subject)?;
        require_entity_scope(entity)?;
        let guard = self.config.resolve_guard(guard);
        self.store.roles_of(subject, entity, &guard).await
    }

    /// The only role-check entry point: returns whether the subject holds
    /// any role addressed by the selector on the entity.
    ///
    /// Accepts a single name, an id, or a list of either (OR semantics);
    /// every shape is normalized to role-id comparison against the cache
    /// output.
    pub async fn has_role_on(
        &self,
        subject: &SubjectRef,
        selector: &RoleSelector,
        entity: &EntityRef,
        guard: Option<&GuardName>,
    ) -> AppResult<bool> {
        self.require_capability(subject)?;
        require_entity_scope(entity)?;
        let guard = self.config.resolve_guard(guard);
        self.cache
            .user_holds_any(subject, entity, selector, &guard)
            .await
    }

    fn require_capability(&self, subject: &SubjectRef) -> AppResult<()> {
        if self.config.supports_roles(subject.kind()) {
            return Ok(());
        }

        Err(AppError::CapabilityMissing(format!(
            "subject kind '{}' does not support entity-scoped roles",
            subject.kind().as_str()
        )))
    }
}

/// Migration-compatibility surface for the generic roles/permissions
/// capability this core replaces.
///
/// Every member is deliberately disabled: ambient roles and direct
/// permissions would bypass entity scoping, so each call fails with
/// [`AppError::UnsupportedOperation`] naming the entity-scoped
/// replacement. The trait exists so legacy call sites fail loudly at
/// runtime instead of silently holding global state.
#[async_trait]
pub trait DirectPermissions: Send + Sync {
    /// Disabled global role check; use `has_role_on` with an entity.
    async fn has_role(&self, subject: &SubjectRef, role: &RoleName) -> AppResult<bool>;

    /// Disabled direct permission grant.
    async fn give_permission_to(&self, subject: &SubjectRef, permission: &str) -> AppResult<()>;

    /// Disabled direct permission revocation.
    async fn revoke_permission_to(&self, subject: &SubjectRef, permission: &str) -> AppResult<()>;

    /// Disabled direct permission synchronization.
    async fn sync_permissions(
        &self,
        subject: &SubjectRef,
        permissions: &[String],
    ) -> AppResult<()>;

    /// Disabled direct permission check.
    async fn has_permission_to(&self, subject: &SubjectRef, permission: &str) -> AppResult<bool>;

    /// Disabled direct permission check bypassing roles.
    async fn has_direct_permission(
        &self,
        subject: &SubjectRef,
        permission: &str,
    ) -> AppResult<bool>;

    /// Disabled any-of direct permission check.
    async fn has_any_permission(
        &self,
        subject: &SubjectRef,
        permissions: &[String],
    ) -> AppResult<bool>;

    /// Disabled all-of direct permission check.
    async fn has_all_permissions(
        &self,
        subject: &SubjectRef,
        permissions: &[String],
    ) -> AppResult<bool>;

    /// Disabled direct permission listing.
    async fn permissions(&self, subject: &SubjectRef) -> AppResult<Vec<String>>;
}

fn disabled(operation: &str, replacement: &str) -> AppError {
    AppError::UnsupportedOperation(format!(
        "`{operation}` is disabled: permissions are mediated by entity-scoped roles only; use \
         `{replacement}` instead"
    ))
}

#[async_trait]
impl DirectPermissions for SubjectRoleService {
    async fn has_role(&self, _subject: &SubjectRef, _role: &RoleName) -> AppResult<bool> {
        Err(disabled("has_role", "has_role_on(subject, role, entity)"))
    }

    async fn give_permission_to(&self, _subject: &SubjectRef, _permission: &str) -> AppResult<()> {
        Err(disabled(
            "give_permission_to",
            "assign_role(subject, role, entity)",
        ))
    }

    async fn revoke_permission_to(
        &self,
        _subject: &SubjectRef,
        _permission: &str,
    ) -> AppResult<()> {
        Err(disabled(
            "revoke_permission_to",
            "remove_role(subject, role, entity)",
        ))
    }

    async fn sync_permissions(
        &self,
        _subject: &SubjectRef,
        _permissions: &[String],
    ) -> AppResult<()> {
        Err(disabled(
            "sync_permissions",
            "assign_roles(subject, roles, entity)",
        ))
    }

    async fn has_permission_to(
        &self,
        _subject: &SubjectRef,
        _permission: &str,
    ) -> AppResult<bool> {
        Err(disabled(
            "has_permission_to",
            "has_role_on(subject, role, entity)",
        ))
    }

    async fn has_direct_permission(
        &self,
        _subject: &SubjectRef,
        _permission: &str,
    ) -> AppResult<bool> {
        Err(disabled(
            "has_direct_permission",
            "has_role_on(subject, role, entity)",
        ))
    }

    async fn has_any_permission(
        &self,
        _subject: &SubjectRef,
        _permissions: &[String],
    ) -> AppResult<bool> {
        Err(disabled(
            "has_any_permission",
            "has_role_on(subject, roles, entity)",
        ))
    }

    async fn has_all_permissions(
        &self,
        _subject: &SubjectRef,
        _permissions: &[String],
    ) -> AppResult<bool> {
        Err(disabled(
            "has_all_permissions",
            "has_role_on(subject, roles, entity)",
        ))
    }

    async fn permissions(&self, _subject: &SubjectRef) -> AppResult<Vec<String>> {
        Err(disabled(
            "permissions",
            "roles_on(subject, entity) for the entity in question",
        ))
    }
}
