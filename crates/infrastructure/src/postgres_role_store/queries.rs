use super::*;

impl PostgresRoleStore {
    pub(super) async fn roles_of_impl(
        &self,
        subject: &SubjectRef,
        entity: &EntityRef,
        guard: &GuardName,
    ) -> AppResult<Vec<RoleName>> {
        let sql = format!(
            r#"
            SELECT roles.name
            FROM {assignments} AS assignments
            INNER JOIN {roles} AS roles
                ON roles.id = assignments.role_id
            WHERE assignments.tenant_id = $1
                AND assignments.{subject_kind} = $2
                AND assignments.{subject_id} = $3
                AND assignments.{entity_kind} = $4
                AND assignments.{entity_id} = $5
                AND assignments.guard = $6
            ORDER BY roles.name
            "#,
            assignments = self.schema.assignments_table,
            roles = self.schema.roles_table,
            subject_kind = self.schema.subject_kind_column,
            subject_id = self.schema.subject_id_column,
            entity_kind = self.schema.entity_kind_column,
            entity_id = self.schema.entity_id_column,
        );

        let names = sqlx::query_scalar::<_, String>(sql.as_str())
            .bind(entity.tenant_id().as_uuid())
            .bind(subject.kind().as_str())
            .bind(subject.id())
            .bind(entity.kind().as_str())
            .bind(entity.id())
            .bind(guard.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to list roles: {error}")))?;

        names.into_iter().map(parse_stored_role_name).collect()
    }

    pub(super) async fn role_ids_of_impl(
        &self,
        subject: &SubjectRef,
        entity: &EntityRef,
        guard: &GuardName,
    ) -> AppResult<Vec<RoleId>> {
        let sql = format!(
            r#"
            SELECT role_id
            FROM {assignments}
            WHERE tenant_id = $1
                AND {subject_kind} = $2
                AND {subject_id} = $3
                AND {entity_kind} = $4
                AND {entity_id} = $5
                AND guard = $6
            ORDER BY role_id
            "#,
            assignments = self.schema.assignments_table,
            subject_kind = self.schema.subject_kind_column,
            subject_id = self.schema.subject_id_column,
            entity_kind = self.schema.entity_kind_column,
            entity_id = self.schema.entity_id_column,
        );

        let ids = sqlx::query_scalar::<_, Uuid>(sql.as_str())
            .bind(entity.tenant_id().as_uuid())
            .bind(subject.kind().as_str())
            .bind(subject.id())
            .bind(entity.kind().as_str())
            .bind(entity.id())
            .bind(guard.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to list role ids: {error}")))?;

        Ok(ids.into_iter().map(RoleId::from_uuid).collect())
    }

    pub(super) async fn role_catalog_impl(
        &self,
        guard: &GuardName,
    ) -> AppResult<Vec<(RoleName, RoleId)>> {
        let sql = format!(
            r#"
            SELECT name, id
            FROM {roles}
            WHERE guard = $1
            ORDER BY name
            "#,
            roles = self.schema.roles_table,
        );

        let rows = sqlx::query_as::<_, CatalogRow>(sql.as_str())
            .bind(guard.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to list role catalog: {error}")))?;

        rows.into_iter()
            .map(|row| Ok((parse_stored_role_name(row.name)?, RoleId::from_uuid(row.id))))
            .collect()
    }

    pub(super) async fn subjects_with_any_role_impl(
        &self,
        entity: &EntityRef,
        roles: Option<&[RoleId]>,
        guard: &GuardName,
    ) -> AppResult<Vec<SubjectRef>> {
        let mut sql = format!(
            r#"
            SELECT DISTINCT {subject_kind} AS subject_kind, {subject_id} AS subject_id
            FROM {assignments}
            WHERE tenant_id = $1
                AND {entity_kind} = $2
                AND {entity_id} = $3
                AND guard = $4
            "#,
            assignments = self.schema.assignments_table,
            subject_kind = self.schema.subject_kind_column,
            subject_id = self.schema.subject_id_column,
            entity_kind = self.schema.entity_kind_column,
            entity_id = self.schema.entity_id_column,
        );

        let role_ids: Option<Vec<Uuid>> =
            roles.map(|ids| ids.iter().map(RoleId::as_uuid).collect());
        if role_ids.is_some() {
            sql.push_str(" AND role_id = ANY($5)");
        }
        sql.push_str(" ORDER BY subject_kind, subject_id");

        let mut query = sqlx::query_as::<_, SubjectRow>(sql.as_str())
            .bind(entity.tenant_id().as_uuid())
            .bind(entity.kind().as_str())
            .bind(entity.id())
            .bind(guard.as_str());
        if let Some(role_ids) = role_ids {
            query = query.bind(role_ids);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(|error| {
            AppError::Internal(format!("failed to list entity participants: {error}"))
        })?;

        rows.into_iter()
            .map(|row| parse_stored_subject(row.subject_kind.as_str(), row.subject_id))
            .collect()
    }

    pub(super) async fn assignments_for_impl(
        &self,
        entity: &EntityRef,
        guard: &GuardName,
    ) -> AppResult<Vec<RoleAssignment>> {
        let sql = format!(
            r#"
            SELECT
                assignments.{subject_kind} AS subject_kind,
                assignments.{subject_id} AS subject_id,
                assignments.role_id,
                roles.name AS role_name,
                assignments.created_at
            FROM {assignments} AS assignments
            INNER JOIN {roles} AS roles
                ON roles.id = assignments.role_id
            WHERE assignments.tenant_id = $1
                AND assignments.{entity_kind} = $2
                AND assignments.{entity_id} = $3
                AND assignments.guard = $4
            ORDER BY assignments.{subject_id}, roles.name
            "#,
            assignments = self.schema.assignments_table,
            roles = self.schema.roles_table,
            subject_kind = self.schema.subject_kind_column,
            subject_id = self.schema.subject_id_column,
            entity_kind = self.schema.entity_kind_column,
            entity_id = self.schema.entity_id_column,
        );

        let rows = sqlx::query_as::<_, AssignmentRow>(sql.as_str())
            .bind(entity.tenant_id().as_uuid())
            .bind(entity.kind().as_str())
            .bind(entity.id())
            .bind(guard.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to list role assignments: {error}"))
            })?;

        rows.into_iter()
            .map(|row| {
                Ok(RoleAssignment {
                    subject: parse_stored_subject(row.subject_kind.as_str(), row.subject_id)?,
                    role_id: RoleId::from_uuid(row.role_id),
                    role_name: parse_stored_role_name(row.role_name)?,
                    entity: *entity,
                    guard: guard.clone(),
                    assigned_at: row.created_at,
                })
            })
            .collect()
    }

    pub(super) async fn participant_count_impl(
        &self,
        entity: &EntityRef,
        guard: &GuardName,
    ) -> AppResult<u64> {
        let sql = format!(
            r#"
            SELECT COUNT(DISTINCT ({subject_kind}, {subject_id}))
            FROM {assignments}
            WHERE tenant_id = $1
                AND {entity_kind} = $2
                AND {entity_id} = $3
                AND guard = $4
            "#,
            assignments = self.schema.assignments_table,
            subject_kind = self.schema.subject_kind_column,
            subject_id = self.schema.subject_id_column,
            entity_kind = self.schema.entity_kind_column,
            entity_id = self.schema.entity_id_column,
        );

        let count = sqlx::query_scalar::<_, i64>(sql.as_str())
            .bind(entity.tenant_id().as_uuid())
            .bind(entity.kind().as_str())
            .bind(entity.id())
            .bind(guard.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to count entity participants: {error}"))
            })?;

        Ok(u64::try_from(count).unwrap_or_default())
    }

    pub(super) async fn role_summary_impl(
        &self,
        entity: &EntityRef,
        guard: &GuardName,
    ) -> AppResult<Vec<RoleCount>> {
        let sql = format!(
            r#"
            SELECT roles.name AS role_name, COUNT(*) AS subjects
            FROM {assignments} AS assignments
            INNER JOIN {roles} AS roles
                ON roles.id = assignments.role_id
            WHERE assignments.tenant_id = $1
                AND assignments.{entity_kind} = $2
                AND assignments.{entity_id} = $3
                AND assignments.guard = $4
            GROUP BY roles.name
            ORDER BY roles.name
            "#,
            assignments = self.schema.assignments_table,
            roles = self.schema.roles_table,
            entity_kind = self.schema.entity_kind_column,
            entity_id = self.schema.entity_id_column,
        );

        let rows = sqlx::query_as::<_, RoleSummaryRow>(sql.as_str())
            .bind(entity.tenant_id().as_uuid())
            .bind(entity.kind().as_str())
            .bind(entity.id())
            .bind(guard.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to summarize entity roles: {error}"))
            })?;

        rows.into_iter()
            .map(|row| {
                Ok(RoleCount {
                    role: parse_stored_role_name(row.role_name)?,
                    subjects: u64::try_from(row.subjects).unwrap_or_default(),
                })
            })
            .collect()
    }
}
