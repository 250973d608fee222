use sqlx::{Postgres, Transaction};

use super::*;

impl PostgresRoleStore {
    pub(super) async fn assign_impl(
        &self,
        subject: &SubjectRef,
        role: &RoleName,
        entity: &EntityRef,
        guard: &GuardName,
    ) -> AppResult<bool> {
        let mut transaction = self.pool.begin().await.map_err(begin_error)?;

        let role_id = resolve_role_id(&mut transaction, &self.schema, role, guard).await?;
        let created = self
            .insert_assignment(&mut transaction, subject, role_id, entity, guard)
            .await?;

        transaction.commit().await.map_err(commit_error)?;
        Ok(created)
    }

    pub(super) async fn assign_many_impl(
        &self,
        subject: &SubjectRef,
        roles: &[RoleName],
        entity: &EntityRef,
        guard: &GuardName,
    ) -> AppResult<Vec<RoleName>> {
        let mut transaction = self.pool.begin().await.map_err(begin_error)?;

        let mut resolved = Vec::with_capacity(roles.len());
        for role in roles {
            let role_id = resolve_role_id(&mut transaction, &self.schema, role, guard).await?;
            resolved.push((role.clone(), role_id));
        }

        let mut created = Vec::new();
        for (role, role_id) in resolved {
            if self
                .insert_assignment(&mut transaction, subject, role_id, entity, guard)
                .await?
            {
                created.push(role);
            }
        }

        transaction.commit().await.map_err(commit_error)?;
        Ok(created)
    }

    pub(super) async fn remove_impl(
        &self,
        subject: &SubjectRef,
        role: &RoleName,
        entity: &EntityRef,
        guard: &GuardName,
    ) -> AppResult<bool> {
        let sql = format!(
            r#"
            DELETE FROM {assignments} AS assignments
            USING {roles} AS roles
            WHERE assignments.role_id = roles.id
                AND assignments.tenant_id = $1
                AND assignments.{subject_kind} = $2
                AND assignments.{subject_id} = $3
                AND assignments.{entity_kind} = $4
                AND assignments.{entity_id} = $5
                AND assignments.guard = $6
                AND roles.guard = $6
                AND roles.name = $7
            "#,
            assignments = self.schema.assignments_table,
            roles = self.schema.roles_table,
            subject_kind = self.schema.subject_kind_column,
            subject_id = self.schema.subject_id_column,
            entity_kind = self.schema.entity_kind_column,
            entity_id = self.schema.entity_id_column,
        );

        let rows_affected = sqlx::query(sql.as_str())
            .bind(entity.tenant_id().as_uuid())
            .bind(subject.kind().as_str())
            .bind(subject.id())
            .bind(entity.kind().as_str())
            .bind(entity.id())
            .bind(guard.as_str())
            .bind(role.as_str())
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to remove role assignment: {error}"))
            })?
            .rows_affected();

        Ok(rows_affected > 0)
    }

    pub(super) async fn remove_all_impl(
        &self,
        subject: &SubjectRef,
        entity: &EntityRef,
        guard: &GuardName,
    ) -> AppResult<u64> {
        let mut transaction = self.pool.begin().await.map_err(begin_error)?;
        let removed = self
            .delete_subject_assignments(&mut transaction, subject, entity, guard)
            .await?;
        transaction.commit().await.map_err(commit_error)?;
        Ok(removed)
    }

    pub(super) async fn sync_all_impl(
        &self,
        entity: &EntityRef,
        changes: &[(SubjectRef, Vec<RoleName>)],
        guard: &GuardName,
    ) -> AppResult<()> {
        let mut transaction = self.pool.begin().await.map_err(begin_error)?;

        for (subject, roles) in changes {
            self.delete_subject_assignments(&mut transaction, subject, entity, guard)
                .await?;

            for role in roles {
                let role_id = resolve_role_id(&mut transaction, &self.schema, role, guard).await?;
                self.insert_assignment(&mut transaction, subject, role_id, entity, guard)
                    .await?;
            }
        }

        transaction.commit().await.map_err(commit_error)?;
        Ok(())
    }

    pub(super) async fn change_role_impl(
        &self,
        subject: &SubjectRef,
        entity: &EntityRef,
        new_role: &RoleName,
        guard: &GuardName,
    ) -> AppResult<u64> {
        let mut transaction = self.pool.begin().await.map_err(begin_error)?;

        let cleared = self
            .delete_subject_assignments(&mut transaction, subject, entity, guard)
            .await?;
        let role_id = resolve_role_id(&mut transaction, &self.schema, new_role, guard).await?;
        self.insert_assignment(&mut transaction, subject, role_id, entity, guard)
            .await?;

        transaction.commit().await.map_err(commit_error)?;
        Ok(cleared)
    }

    pub(super) async fn ensure_role_impl(
        &self,
        name: &RoleName,
        guard: &GuardName,
    ) -> AppResult<RoleId> {
        let sql = format!(
            r#"
            INSERT INTO {roles} (guard, name)
            VALUES ($1, $2)
            ON CONFLICT (guard, name) DO UPDATE
            SET name = EXCLUDED.name
            RETURNING id
            "#,
            roles = self.schema.roles_table,
        );

        let id = sqlx::query_scalar::<_, uuid::Uuid>(sql.as_str())
            .bind(guard.as_str())
            .bind(name.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to ensure role: {error}")))?;

        Ok(RoleId::from_uuid(id))
    }

    async fn insert_assignment(
        &self,
        transaction: &mut Transaction<'_, Postgres>,
        subject: &SubjectRef,
        role_id: uuid::Uuid,
        entity: &EntityRef,
        guard: &GuardName,
    ) -> AppResult<bool> {
        let sql = format!(
            r#"
            INSERT INTO {assignments}
                (tenant_id, role_id, {subject_kind}, {subject_id}, {entity_kind}, {entity_id}, guard)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT DO NOTHING
            "#,
            assignments = self.schema.assignments_table,
            subject_kind = self.schema.subject_kind_column,
            subject_id = self.schema.subject_id_column,
            entity_kind = self.schema.entity_kind_column,
            entity_id = self.schema.entity_id_column,
        );

        let rows_affected = sqlx::query(sql.as_str())
            .bind(entity.tenant_id().as_uuid())
            .bind(role_id)
            .bind(subject.kind().as_str())
            .bind(subject.id())
            .bind(entity.kind().as_str())
            .bind(entity.id())
            .bind(guard.as_str())
            .execute(&mut **transaction)
            .await
            .map_err(|error| AppError::Internal(format!("failed to assign role: {error}")))?
            .rows_affected();

        Ok(rows_affected > 0)
    }

    async fn delete_subject_assignments(
        &self,
        transaction: &mut Transaction<'_, Postgres>,
        subject: &SubjectRef,
        entity: &EntityRef,
        guard: &GuardName,
    ) -> AppResult<u64> {
        let sql = format!(
            r#"
            DELETE FROM {assignments}
            WHERE tenant_id = $1
                AND {subject_kind} = $2
                AND {subject_id} = $3
                AND {entity_kind} = $4
                AND {entity_id} = $5
                AND guard = $6
            "#,
            assignments = self.schema.assignments_table,
            subject_kind = self.schema.subject_kind_column,
            subject_id = self.schema.subject_id_column,
            entity_kind = self.schema.entity_kind_column,
            entity_id = self.schema.entity_id_column,
        );

        let rows_affected = sqlx::query(sql.as_str())
            .bind(entity.tenant_id().as_uuid())
            .bind(subject.kind().as_str())
            .bind(subject.id())
            .bind(entity.kind().as_str())
            .bind(entity.id())
            .bind(guard.as_str())
            .execute(&mut **transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to remove role assignments: {error}"))
            })?
            .rows_affected();

        Ok(rows_affected)
    }
}

async fn resolve_role_id(
    transaction: &mut Transaction<'_, Postgres>,
    schema: &RoleSchemaConfig,
    role: &RoleName,
    guard: &GuardName,
) -> AppResult<uuid::Uuid> {
    let sql = format!(
        r#"
        SELECT id
        FROM {roles}
        WHERE guard = $1 AND name = $2
        LIMIT 1
        "#,
        roles = schema.roles_table,
    );

    sqlx::query_scalar::<_, uuid::Uuid>(sql.as_str())
        .bind(guard.as_str())
        .bind(role.as_str())
        .fetch_optional(&mut **transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to resolve role: {error}")))?
        .ok_or_else(|| {
            AppError::UnknownRole(format!("role '{role}' was not found in guard '{guard}'"))
        })
}
