use async_trait::async_trait;
use critiq_core::AppResult;
use critiq_domain::{
    EntityRef, GuardName, RoleAssignment, RoleCount, RoleId, RoleName, SubjectRef,
};

/// Repository port for the role assignment relation.
///
/// The store is the single source of truth. Every mutating operation runs
/// inside one storage transaction so concurrent writers to the same
/// (subject, entity) key serialize at the store, and a failure mid-way
/// leaves no partial state behind.
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Creates one (subject, role, entity, guard) tuple.
    ///
    /// Idempotent: returns `true` when a new tuple was created and `false`
    /// when the tuple already existed. Fails with
    /// [`critiq_core::AppError::UnknownRole`] when the role is not in the
    /// guard's catalog.
    async fn assign(
        &self,
        subject: &SubjectRef,
        role: &RoleName,
        entity: &EntityRef,
        guard: &GuardName,
    ) -> AppResult<bool>;

    /// Creates tuples for several roles in one transaction.
    ///
    /// All-or-nothing: a failure on any role rolls the whole batch back.
    /// Returns the roles that were actually created (already-held roles
    /// are skipped without error).
    async fn assign_many(
        &self,
        subject: &SubjectRef,
        roles: &[RoleName],
        entity: &EntityRef,
        guard: &GuardName,
    ) -> AppResult<Vec<RoleName>>;

    /// Deletes one tuple. Returns `true` when a tuple was deleted; absence
    /// is a no-op, not an error.
    async fn remove(
        &self,
        subject: &SubjectRef,
        role: &RoleName,
        entity: &EntityRef,
        guard: &GuardName,
    ) -> AppResult<bool>;

    /// Deletes every tuple for the (subject, entity) pair in one
    /// transaction. Returns the number of deleted tuples.
    async fn remove_all(
        &self,
        subject: &SubjectRef,
        entity: &EntityRef,
        guard: &GuardName,
    ) -> AppResult<u64>;

    /// Replaces role sets for many subjects on one entity.
    ///
    /// For every listed subject the existing roles are cleared and the
    /// given roles assigned (an empty list means clear only). Each
    /// subject's clear+assign pair is atomic and the whole batch runs in
    /// one outer transaction.
    async fn sync_all(
        &self,
        entity: &EntityRef,
        changes: &[(SubjectRef, Vec<RoleName>)],
        guard: &GuardName,
    ) -> AppResult<()>;

    /// Clears every role the subject holds on the entity and assigns
    /// exactly `new_role`, atomically. Returns the number of cleared
    /// tuples.
    async fn change_role(
        &self,
        subject: &SubjectRef,
        entity: &EntityRef,
        new_role: &RoleName,
        guard: &GuardName,
    ) -> AppResult<u64>;

    /// Lists role names the subject holds on the entity. Pure read;
    /// returns an empty list when the subject has no tuples.
    async fn roles_of(
        &self,
        subject: &SubjectRef,
        entity: &EntityRef,
        guard: &GuardName,
    ) -> AppResult<Vec<RoleName>>;

    /// Lists role ids the subject holds on the entity. Pure read; empty
    /// when absent. This is the projection the cache layer stores.
    async fn role_ids_of(
        &self,
        subject: &SubjectRef,
        entity: &EntityRef,
        guard: &GuardName,
    ) -> AppResult<Vec<RoleId>>;

    /// Returns the guard's role catalog as (name, id) pairs.
    async fn role_catalog(&self, guard: &GuardName) -> AppResult<Vec<(RoleName, RoleId)>>;

    /// Creates the role in the guard's catalog when missing and returns
    /// its id.
    async fn ensure_role(&self, name: &RoleName, guard: &GuardName) -> AppResult<RoleId>;

    /// Lists subjects holding any role on the entity, optionally filtered
    /// to the given role ids. Tenant scoping is carried by the entity
    /// reference.
    async fn subjects_with_any_role(
        &self,
        entity: &EntityRef,
        roles: Option<&[RoleId]>,
        guard: &GuardName,
    ) -> AppResult<Vec<SubjectRef>>;

    /// Lists full assignment tuples for the entity.
    async fn assignments_for(
        &self,
        entity: &EntityRef,
        guard: &GuardName,
    ) -> AppResult<Vec<RoleAssignment>>;

    /// Counts distinct subjects holding at least one role on the entity.
    async fn participant_count(&self, entity: &EntityRef, guard: &GuardName) -> AppResult<u64>;

    /// Aggregates subjects-per-role for the entity.
    async fn role_summary(
        &self,
        entity: &EntityRef,
        guard: &GuardName,
    ) -> AppResult<Vec<RoleCount>>;
}
