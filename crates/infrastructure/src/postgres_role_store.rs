use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use critiq_application::RoleStore;
use critiq_core::{AppError, AppResult};
use critiq_domain::{
    EntityRef, GuardName, RoleAssignment, RoleCount, RoleId, RoleName, SubjectKind, SubjectRef,
};

use crate::RoleSchemaConfig;

mod mutations;
mod queries;

/// PostgreSQL-backed role assignment store.
///
/// Every mutating operation runs inside one transaction; the unique index
/// over the assignment tuple plus `ON CONFLICT DO NOTHING` makes repeated
/// assignment idempotent at the schema level.
#[derive(Clone)]
pub struct PostgresRoleStore {
    pool: PgPool,
    schema: RoleSchemaConfig,
}

impl PostgresRoleStore {
    /// Creates a store with the provided connection pool and a validated
    /// schema naming configuration.
    pub fn new(pool: PgPool, schema: RoleSchemaConfig) -> AppResult<Self> {
        schema.validate()?;
        Ok(Self { pool, schema })
    }
}

#[derive(Debug, FromRow)]
struct CatalogRow {
    name: String,
    id: Uuid,
}

#[derive(Debug, FromRow)]
struct SubjectRow {
    subject_kind: String,
    subject_id: Uuid,
}

#[derive(Debug, FromRow)]
struct AssignmentRow {
    subject_kind: String,
    subject_id: Uuid,
    role_id: Uuid,
    role_name: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct RoleSummaryRow {
    role_name: String,
    subjects: i64,
}

#[async_trait]
impl RoleStore for PostgresRoleStore {
    async fn assign(
        &self,
        subject: &SubjectRef,
        role: &RoleName,
        entity: &EntityRef,
        guard: &GuardName,
    ) -> AppResult<bool> {
        self.assign_impl(subject, role, entity, guard).await
    }

    async fn assign_many(
        &self,
        subject: &SubjectRef,
        roles: &[RoleName],
        entity: &EntityRef,
        guard: &GuardName,
    ) -> AppResult<Vec<RoleName>> {
        self.assign_many_impl(subject, roles, entity, guard).await
    }

    async fn remove(
        &self,
        subject: &SubjectRef,
        role: &RoleName,
        entity: &EntityRef,
        guard: &GuardName,
    ) -> AppResult<bool> {
        self.remove_impl(subject, role, entity, guard).await
    }

    async fn remove_all(
        &self,
        subject: &SubjectRef,
        entity: &EntityRef,
        guard: &GuardName,
    ) -> AppResult<u64> {
        self.remove_all_impl(subject, entity, guard).await
    }

    async fn sync_all(
        &self,
        entity: &EntityRef,
        changes: &[(SubjectRef, Vec<RoleName>)],
        guard: &GuardName,
    ) -> AppResult<()> {
        self.sync_all_impl(entity, changes, guard).await
    }

    async fn change_role(
        &self,
        subject: &SubjectRef,
        entity: &EntityRef,
        new_role: &RoleName,
        guard: &GuardName,
    ) -> AppResult<u64> {
        self.change_role_impl(subject, entity, new_role, guard).await
    }

    async fn roles_of(
        &self,
        subject: &SubjectRef,
        entity: &EntityRef,
        guard: &GuardName,
    ) -> AppResult<Vec<RoleName>> {
        self.roles_of_impl(subject, entity, guard).await
    }

    async fn role_ids_of(
        &self,
        subject: &SubjectRef,
        entity: &EntityRef,
        guard: &GuardName,
    ) -> AppResult<Vec<RoleId>> {
        self.role_ids_of_impl(subject, entity, guard).await
    }

    async fn role_catalog(&self, guard: &GuardName) -> AppResult<Vec<(RoleName, RoleId)>> {
        self.role_catalog_impl(guard).await
    }

    async fn ensure_role(&self, name: &RoleName, guard: &GuardName) -> AppResult<RoleId> {
        self.ensure_role_impl(name, guard).await
    }

    async fn subjects_with_any_role(
        &self,
        entity: &EntityRef,
        roles: Option<&[RoleId]>,
        guard: &GuardName,
    ) -> AppResult<Vec<SubjectRef>> {
        self.subjects_with_any_role_impl(entity, roles, guard).await
    }

    async fn assignments_for(
        &self,
        entity: &EntityRef,
        guard: &GuardName,
    ) -> AppResult<Vec<RoleAssignment>> {
        self.assignments_for_impl(entity, guard).await
    }

    async fn participant_count(&self, entity: &EntityRef, guard: &GuardName) -> AppResult<u64> {
        self.participant_count_impl(entity, guard).await
    }

    async fn role_summary(
        &self,
        entity: &EntityRef,
        guard: &GuardName,
    ) -> AppResult<Vec<RoleCount>> {
        self.role_summary_impl(entity, guard).await
    }
}

fn begin_error(error: sqlx::Error) -> AppError {
    AppError::TransactionFailed(format!("failed to begin transaction: {error}"))
}

fn commit_error(error: sqlx::Error) -> AppError {
    AppError::TransactionFailed(format!("failed to commit transaction: {error}"))
}

fn parse_stored_role_name(value: String) -> AppResult<RoleName> {
    RoleName::new(value.as_str())
        .map_err(|error| AppError::Internal(format!("invalid stored role name '{value}': {error}")))
}

fn parse_stored_subject(kind: &str, id: Uuid) -> AppResult<SubjectRef> {
    let kind = SubjectKind::from_str(kind)
        .map_err(|error| AppError::Internal(format!("invalid stored subject kind: {error}")))?;
    Ok(SubjectRef::new(kind, id))
}
