use std::sync::Arc;

use critiq_core::{AppError, AppResult};
use critiq_domain::{
    EntityRef, GuardName, RoleAssignment, RoleCount, RoleName, RoleSelector, SubjectRef,
};

use crate::role_assignment_service::require_entity_scope;
use crate::{RbacConfig, RoleAssignmentService, RoleCacheService, RoleStore};

/// The owning-entity viewpoint: operations an entity exposes about who can
/// act on it.
///
/// Mutations flow through [`RoleAssignmentService`]; checks, counts, and
/// summaries are served through [`RoleCacheService`] so the hot path never
/// issues uncached aggregate queries.
#[derive(Clone)]
pub struct ParticipantService {
    assignments: RoleAssignmentService,
    cache: RoleCacheService,
    store: Arc<dyn RoleStore>,
    config: RbacConfig,
}

impl ParticipantService {
    /// Creates the entity-facing service from its dependencies.
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

    /// Assigns one or more roles to a subject on the entity.
    ///
    /// With `silent` set, domain events are suppressed: system-driven
    /// seeding paths use it to avoid triggering notification fan-out.
    pub async fn add_participant(
        &self,
        entity: &EntityRef,
        subject: &SubjectRef,
        roles: &[RoleName],
        silent: bool,
    ) -> AppResult<()> {
        self.require_capability(subject)?;
        self.assignments
            .assign_many(subject, roles, entity, None, silent)
            .await
    }

    /// Removes one role from a participant, or every role when `role` is
    /// `None`.
    pub async fn remove_participant(
        &self,
        entity: &EntityRef,
        subject: &SubjectRef,
        role: Option<&RoleName>,
    ) -> AppResult<()> {
        self.require_capability(subject)?;

        match role {
            Some(role) => self.assignments.remove(subject, role, entity, None).await,
            None => self
                .assignments
                .remove_all(subject, entity, None)
                .await
                .map(|_| ()),
        }
    }

    /// Atomically clears a participant's roles and sets exactly the new
    /// one (demote + promote as one unit).
    pub async fn change_participant_role(
        &self,
        entity: &EntityRef,
        subject: &SubjectRef,
        new_role: &RoleName,
    ) -> AppResult<()> {
        self.require_capability(subject)?;
        self.assignments
            .change_role(subject, entity, new_role, None)
            .await
    }

    /// Lists subjects holding any role addressed by the selector on the
    /// entity. Tenant scoping rides on the entity reference.
    pub async fn users_with_role(
        &self,
        entity: &EntityRef,
        selector: &RoleSelector,
        guard: Option<&GuardName>,
    ) -> AppResult<Vec<SubjectRef>> {
        require_entity_scope(entity)?;
        let guard = self.config.resolve_guard(guard);
        let role_ids = self.cache.selector_role_ids(selector, &guard).await?;

        self.store
            .subjects_with_any_role(entity, Some(&role_ids), &guard)
            .await
    }

    /// Lists the full assignment tuples for the entity.
    pub async fn participants(
        &self,
        entity: &EntityRef,
        guard: Option<&GuardName>,
    ) -> AppResult<Vec<RoleAssignment>> {
        require_entity_scope(entity)?;
        let guard = self.config.resolve_guard(guard);
        self.store.assignments_for(entity, &guard).await
    }

    /// Returns whether the subject holds any role addressed by the
    /// selector on the entity.
    pub async fn user_has_role(
        &self,
        entity: &EntityRef,
        subject: &SubjectRef,
        selector: &RoleSelector,
    ) -> AppResult<bool> {
        self.require_capability(subject)?;
        require_entity_scope(entity)?;
        let guard = self.config.resolve_guard(None);
        self.cache
            .user_holds_any(subject, entity, selector, &guard)
            .await
    }

    /// Returns whether the subject holds at least one role on the entity.
    pub async fn user_has_any_role(
        &self,
        entity: &EntityRef,
        subject: &SubjectRef,
    ) -> AppResult<bool> {
        self.require_capability(subject)?;
        require_entity_scope(entity)?;
        let guard = self.config.resolve_guard(None);
        self.cache.user_has_any_role(subject, entity, &guard).await
    }

    /// Counts distinct participants on the entity, served through the
    /// cache.
    pub async fn participant_count(
        &self,
        entity: &EntityRef,
        guard: Option<&GuardName>,
    ) -> AppResult<u64> {
        require_entity_scope(entity)?;
        let guard = self.config.resolve_guard(guard);
        let key = RoleCacheService::entity_view_key(entity, &guard, "participant-count");
        let store = Arc::clone(&self.store);
        let entity = *entity;
        let producer_guard = guard.clone();

        self.cache
            .remember(key.as_str(), async move {
                store.participant_count(&entity, &producer_guard).await
            })
            .await
    }

    /// Aggregates subjects-per-role for the entity, served through the
    /// cache.
    pub async fn assigned_roles_summary(
        &self,
        entity: &EntityRef,
        guard: Option<&GuardName>,
    ) -> AppResult<Vec<RoleCount>> {
        require_entity_scope(entity)?;
        let guard = self.config.resolve_guard(guard);
        let key = RoleCacheService::entity_view_key(entity, &guard, "role-summary");
        let store = Arc::clone(&self.store);
        let entity = *entity;
        let producer_guard = guard.clone();

        self.cache
            .remember(key.as_str(), async move {
                store.role_summary(&entity, &producer_guard).await
            })
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
