use std::sync::Arc;

use critiq_core::{AppError, AppResult};
use critiq_domain::{EntityRef, GuardName, RoleEvent, RoleId, RoleName, SubjectRef};
use tracing::warn;

use crate::{RbacConfig, RoleCacheService, RoleEventPublisher, RoleStore};

/// Rejects entity references that do not identify a persisted entity.
///
/// The type system already rules out an absent entity; this guard closes
/// the remaining gap where a zeroed identifier would act as one, which
/// would amount to a global role.
pub(crate) fn require_entity_scope(entity: &EntityRef) -> AppResult<()> {
    if entity.id().is_nil() || entity.tenant_id().as_uuid().is_nil() {
        return Err(AppError::InvalidScope(
            "parameter 'entity' must reference a persisted entity; roles cannot be granted or \
             checked without an entity scope"
                .to_owned(),
        ));
    }

    Ok(())
}

/// The single write path for role mutations.
///
/// Every mutation follows the same sequence: store write (the transaction
/// commits inside the store), synchronous cache invalidation, then event
/// emission. Invalidation and emission happen only for writes that
/// actually changed state; a failed store call performs neither, so a
/// rolled-back transaction never leaves the cache or event stream out of
/// step with the store.
#[derive(Clone)]
pub struct RoleAssignmentService {
    store: Arc<dyn RoleStore>,
    cache: RoleCacheService,
    publisher: Arc<dyn RoleEventPublisher>,
    config: RbacConfig,
}

impl RoleAssignmentService {
    /// Creates the write path from its dependencies.
    #[must_use]
    pub fn new(
        store: Arc<dyn RoleStore>,
        cache: RoleCacheService,
        publisher: Arc<dyn RoleEventPublisher>,
        config: RbacConfig,
    ) -> Self {
        Self {
            store,
            cache,
            publisher,
            config,
        }
    }

    /// Assigns one role to a subject on an entity.
    ///
    /// Idempotent: assigning an already-held role changes nothing, emits
    /// nothing, and succeeds.
    pub async fn assign(
        &self,
        subject: &SubjectRef,
        role: &RoleName,
        entity: &EntityRef,
        guard: Option<&GuardName>,
    ) -> AppResult<()> {
        require_entity_scope(entity)?;
        let guard = self.config.resolve_guard(guard);
        let created = self.store.assign(subject, role, entity, &guard).await?;

        if created {
            self.invalidate(subject, entity, &guard).await;
            self.emit(
                RoleEvent::RoleAssigned {
                    subject: *subject,
                    entity: *entity,
                    role: role.clone(),
                },
                false,
            )
            .await;
        }

        Ok(())
    }

    /// Assigns several roles in one atomic batch.
    pub async fn assign_many(
        &self,
        subject: &SubjectRef,
        roles: &[RoleName],
        entity: &EntityRef,
        guard: Option<&GuardName>,
        silent: bool,
    ) -> AppResult<()> {
        require_entity_scope(entity)?;
        if roles.is_empty() {
            return Ok(());
        }

        let guard = self.config.resolve_guard(guard);
        let created = self
            .store
            .assign_many(subject, roles, entity, &guard)
            .await?;

        if !created.is_empty() {
            self.invalidate(subject, entity, &guard).await;
            for role in created {
                self.emit(
                    RoleEvent::RoleAssigned {
                        subject: *subject,
                        entity: *entity,
                        role,
                    },
                    silent,
                )
                .await;
            }
        }

        Ok(())
    }

    /// Removes one role from a subject on an entity. Removing a role the
    /// subject does not hold is a no-op.
    pub async fn remove(
        &self,
        subject: &SubjectRef,
        role: &RoleName,
        entity: &EntityRef,
        guard: Option<&GuardName>,
    ) -> AppResult<()> {
        require_entity_scope(entity)?;
        let guard = self.config.resolve_guard(guard);
        let removed = self.store.remove(subject, role, entity, &guard).await?;

        if removed {
            self.invalidate(subject, entity, &guard).await;
            self.emit(
                RoleEvent::RoleRemoved {
                    subject: *subject,
                    entity: *entity,
                    role: role.clone(),
                },
                false,
            )
            .await;
        }

        Ok(())
    }

    /// Removes every role the subject holds on the entity. Returns the
    /// number of removed tuples; the event fires only when at least one
    /// tuple was actually deleted.
    pub async fn remove_all(
        &self,
        subject: &SubjectRef,
        entity: &EntityRef,
        guard: Option<&GuardName>,
    ) -> AppResult<u64> {
        require_entity_scope(entity)?;
        let guard = self.config.resolve_guard(guard);
        let removed = self.store.remove_all(subject, entity, &guard).await?;

        if removed > 0 {
            self.invalidate(subject, entity, &guard).await;
            self.emit(
                RoleEvent::AllRolesRemoved {
                    subject: *subject,
                    entity: *entity,
                },
                false,
            )
            .await;
        }

        Ok(removed)
    }

    /// Replaces role sets for many subjects on one entity and emits a
    /// single bulk event for the whole batch.
    pub async fn sync_all(
        &self,
        entity: &EntityRef,
        changes: &[(SubjectRef, Vec<RoleName>)],
        guard: Option<&GuardName>,
    ) -> AppResult<()> {
        require_entity_scope(entity)?;
        let guard = self.config.resolve_guard(guard);
        self.store.sync_all(entity, changes, &guard).await?;

        self.cache.invalidate_entity(entity).await;
        for (subject, _) in changes {
            self.cache.invalidate_subject(subject, entity, &guard).await;
        }

        self.emit(
            RoleEvent::BulkRolesUpdated {
                entity: *entity,
                changes: changes.to_vec(),
            },
            false,
        )
        .await;

        Ok(())
    }

    /// Clears the subject's roles on the entity and sets exactly the new
    /// role, as one atomic unit.
    pub async fn change_role(
        &self,
        subject: &SubjectRef,
        entity: &EntityRef,
        new_role: &RoleName,
        guard: Option<&GuardName>,
    ) -> AppResult<()> {
        require_entity_scope(entity)?;
        let guard = self.config.resolve_guard(guard);
        let cleared = self
            .store
            .change_role(subject, entity, new_role, &guard)
            .await?;

        self.invalidate(subject, entity, &guard).await;

        if cleared > 0 {
            self.emit(
                RoleEvent::AllRolesRemoved {
                    subject: *subject,
                    entity: *entity,
                },
                false,
            )
            .await;
        }
        self.emit(
            RoleEvent::RoleAssigned {
                subject: *subject,
                entity: *entity,
                role: new_role.clone(),
            },
            false,
        )
        .await;

        Ok(())
    }

    /// Creates a role in the guard's catalog when missing and drops the
    /// cached catalog entry.
    pub async fn ensure_role(
        &self,
        name: &RoleName,
        guard: Option<&GuardName>,
    ) -> AppResult<RoleId> {
        let guard = self.config.resolve_guard(guard);
        let id = self.store.ensure_role(name, &guard).await?;
        self.cache.invalidate_catalog(&guard).await;
        Ok(id)
    }

    async fn invalidate(&self, subject: &SubjectRef, entity: &EntityRef, guard: &GuardName) {
        self.cache.invalidate_entity(entity).await;
        self.cache.invalidate_subject(subject, entity, guard).await;
    }

    async fn emit(&self, event: RoleEvent, silent: bool) {
        if silent || !self.config.events_enabled {
            return;
        }

        let action = event.action();
        if let Err(error) = self.publisher.publish(event).await {
            warn!(action, %error, "failed to publish role event");
        }
    }
}
