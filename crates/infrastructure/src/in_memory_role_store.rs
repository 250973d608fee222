//! In-memory role assignment store for tests and single-process use.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use critiq_application::RoleStore;
use critiq_core::{AppError, AppResult};
use critiq_domain::{
    EntityRef, GuardName, RoleAssignment, RoleCount, RoleId, RoleName, SubjectRef,
};

struct RoleRecord {
    id: RoleId,
    guard: GuardName,
    name: RoleName,
}

struct StoredAssignment {
    subject: SubjectRef,
    role_id: RoleId,
    role_name: RoleName,
    entity: EntityRef,
    guard: GuardName,
    assigned_at: DateTime<Utc>,
}

#[derive(Default)]
struct State {
    roles: Vec<RoleRecord>,
    assignments: Vec<StoredAssignment>,
}

impl State {
    fn resolve_role(&self, role: &RoleName, guard: &GuardName) -> AppResult<RoleId> {
        self.roles
            .iter()
            .find(|record| &record.name == role && &record.guard == guard)
            .map(|record| record.id)
            .ok_or_else(|| {
                AppError::UnknownRole(format!("role '{role}' was not found in guard '{guard}'"))
            })
    }

    fn holds(
        &self,
        subject: &SubjectRef,
        role_id: RoleId,
        entity: &EntityRef,
        guard: &GuardName,
    ) -> bool {
        self.assignments.iter().any(|stored| {
            &stored.subject == subject
                && stored.role_id == role_id
                && &stored.entity == entity
                && &stored.guard == guard
        })
    }

    fn insert(
        &mut self,
        subject: &SubjectRef,
        role_id: RoleId,
        role_name: RoleName,
        entity: &EntityRef,
        guard: &GuardName,
    ) -> bool {
        if self.holds(subject, role_id, entity, guard) {
            return false;
        }

        self.assignments.push(StoredAssignment {
            subject: *subject,
            role_id,
            role_name,
            entity: *entity,
            guard: guard.clone(),
            assigned_at: Utc::now(),
        });
        true
    }

    fn clear_subject(
        &mut self,
        subject: &SubjectRef,
        entity: &EntityRef,
        guard: &GuardName,
    ) -> u64 {
        let before = self.assignments.len();
        self.assignments.retain(|stored| {
            !(&stored.subject == subject && &stored.entity == entity && &stored.guard == guard)
        });
        (before - self.assignments.len()) as u64
    }
}

/// In-memory implementation of the role store port.
///
/// Each mutation holds the write lock for its whole duration, which gives
/// the same serialization and all-or-nothing behavior the Postgres store
/// gets from transactions.
#[derive(Default)]
pub struct InMemoryRoleStore {
    state: RwLock<State>,
}

impl InMemoryRoleStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
        }
    }
}

#[async_trait]
impl RoleStore for InMemoryRoleStore {
    async fn assign(
        &self,
        subject: &SubjectRef,
        role: &RoleName,
        entity: &EntityRef,
        guard: &GuardName,
    ) -> AppResult<bool> {
        let mut state = self.state.write().await;
        let role_id = state.resolve_role(role, guard)?;
        Ok(state.insert(subject, role_id, role.clone(), entity, guard))
    }

    async fn assign_many(
        &self,
        subject: &SubjectRef,
        roles: &[RoleName],
        entity: &EntityRef,
        guard: &GuardName,
    ) -> AppResult<Vec<RoleName>> {
        let mut state = self.state.write().await;

        let mut resolved = Vec::with_capacity(roles.len());
        for role in roles {
            resolved.push((role.clone(), state.resolve_role(role, guard)?));
        }

        let mut created = Vec::new();
        for (role, role_id) in resolved {
            if state.insert(subject, role_id, role.clone(), entity, guard) {
                created.push(role);
            }
        }

        Ok(created)
    }

    async fn remove(
        &self,
        subject: &SubjectRef,
        role: &RoleName,
        entity: &EntityRef,
        guard: &GuardName,
    ) -> AppResult<bool> {
        let mut state = self.state.write().await;
        let Ok(role_id) = state.resolve_role(role, guard) else {
            return Ok(false);
        };

        let before = state.assignments.len();
        state.assignments.retain(|stored| {
            !(&stored.subject == subject
                && stored.role_id == role_id
                && &stored.entity == entity
                && &stored.guard == guard)
        });
        Ok(state.assignments.len() < before)
    }

    async fn remove_all(
        &self,
        subject: &SubjectRef,
        entity: &EntityRef,
        guard: &GuardName,
    ) -> AppResult<u64> {
        let mut state = self.state.write().await;
        Ok(state.clear_subject(subject, entity, guard))
    }

    async fn sync_all(
        &self,
        entity: &EntityRef,
        changes: &[(SubjectRef, Vec<RoleName>)],
        guard: &GuardName,
    ) -> AppResult<()> {
        let mut state = self.state.write().await;

        let mut resolved = Vec::with_capacity(changes.len());
        for (subject, roles) in changes {
            let mut role_ids = Vec::with_capacity(roles.len());
            for role in roles {
                role_ids.push((role.clone(), state.resolve_role(role, guard)?));
            }
            resolved.push((*subject, role_ids));
        }

        for (subject, role_ids) in resolved {
            state.clear_subject(&subject, entity, guard);
            for (role, role_id) in role_ids {
                state.insert(&subject, role_id, role, entity, guard);
            }
        }

        Ok(())
    }

    async fn change_role(
        &self,
        subject: &SubjectRef,
        entity: &EntityRef,
        new_role: &RoleName,
        guard: &GuardName,
    ) -> AppResult<u64> {
        let mut state = self.state.write().await;
        let role_id = state.resolve_role(new_role, guard)?;

        let cleared = state.clear_subject(subject, entity, guard);
        state.insert(subject, role_id, new_role.clone(), entity, guard);
        Ok(cleared)
    }

    async fn roles_of(
        &self,
        subject: &SubjectRef,
        entity: &EntityRef,
        guard: &GuardName,
    ) -> AppResult<Vec<RoleName>> {
        let state = self.state.read().await;

        let mut names: Vec<RoleName> = state
            .assignments
            .iter()
            .filter(|stored| {
                &stored.subject == subject && &stored.entity == entity && &stored.guard == guard
            })
            .map(|stored| stored.role_name.clone())
            .collect();
        names.sort();
        Ok(names)
    }

    async fn role_ids_of(
        &self,
        subject: &SubjectRef,
        entity: &EntityRef,
        guard: &GuardName,
    ) -> AppResult<Vec<RoleId>> {
        let state = self.state.read().await;

        Ok(state
            .assignments
            .iter()
            .filter(|stored| {
                &stored.subject == subject && &stored.entity == entity && &stored.guard == guard
            })
            .map(|stored| stored.role_id)
            .collect())
    }

    async fn role_catalog(&self, guard: &GuardName) -> AppResult<Vec<(RoleName, RoleId)>> {
        let state = self.state.read().await;

        let mut catalog: Vec<(RoleName, RoleId)> = state
            .roles
            .iter()
            .filter(|record| &record.guard == guard)
            .map(|record| (record.name.clone(), record.id))
            .collect();
        catalog.sort_by(|left, right| left.0.cmp(&right.0));
        Ok(catalog)
    }

    async fn ensure_role(&self, name: &RoleName, guard: &GuardName) -> AppResult<RoleId> {
        let mut state = self.state.write().await;

        if let Ok(existing) = state.resolve_role(name, guard) {
            return Ok(existing);
        }

        let id = RoleId::new();
        state.roles.push(RoleRecord {
            id,
            guard: guard.clone(),
            name: name.clone(),
        });
        Ok(id)
    }

    async fn subjects_with_any_role(
        &self,
        entity: &EntityRef,
        roles: Option<&[RoleId]>,
        guard: &GuardName,
    ) -> AppResult<Vec<SubjectRef>> {
        let state = self.state.read().await;

        let mut subjects = Vec::new();
        for stored in &state.assignments {
            if &stored.entity != entity || &stored.guard != guard {
                continue;
            }
            if let Some(wanted) = roles
                && !wanted.contains(&stored.role_id)
            {
                continue;
            }
            if !subjects.contains(&stored.subject) {
                subjects.push(stored.subject);
            }
        }
        Ok(subjects)
    }

    async fn assignments_for(
        &self,
        entity: &EntityRef,
        guard: &GuardName,
    ) -> AppResult<Vec<RoleAssignment>> {
        let state = self.state.read().await;

        Ok(state
            .assignments
            .iter()
            .filter(|stored| &stored.entity == entity && &stored.guard == guard)
            .map(|stored| RoleAssignment {
                subject: stored.subject,
                role_id: stored.role_id,
                role_name: stored.role_name.clone(),
                entity: stored.entity,
                guard: stored.guard.clone(),
                assigned_at: stored.assigned_at,
            })
            .collect())
    }

    async fn participant_count(&self, entity: &EntityRef, guard: &GuardName) -> AppResult<u64> {
        let subjects = self.subjects_with_any_role(entity, None, guard).await?;
        Ok(subjects.len() as u64)
    }

    async fn role_summary(
        &self,
        entity: &EntityRef,
        guard: &GuardName,
    ) -> AppResult<Vec<RoleCount>> {
        let state = self.state.read().await;

        let mut counts: Vec<RoleCount> = Vec::new();
        for stored in &state.assignments {
            if &stored.entity != entity || &stored.guard != guard {
                continue;
            }
            match counts.iter_mut().find(|count| count.role == stored.role_name) {
                Some(count) => count.subjects += 1,
                None => counts.push(RoleCount {
                    role: stored.role_name.clone(),
                    subjects: 1,
                }),
            }
        }
        counts.sort_by(|left, right| left.role.cmp(&right.role));
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use critiq_application::{
        ParticipantService, RbacConfig, RoleAssignmentService, RoleCacheService,
        RoleEventPublisher, RoleStore, SubjectRoleService,
    };
    use critiq_core::{AppError, AppResult, TenantId};
    use critiq_domain::{
        EntityKind, EntityRef, GuardName, RoleEvent, RoleName, RoleSelector, SubjectRef,
    };
    use tokio::sync::Mutex;
    use uuid::Uuid;

    use crate::InMemoryRoleCache;

    use super::InMemoryRoleStore;

    #[derive(Default)]
    struct RecordingPublisher {
        events: Mutex<Vec<RoleEvent>>,
    }

    #[async_trait]
    impl RoleEventPublisher for RecordingPublisher {
        async fn publish(&self, event: RoleEvent) -> AppResult<()> {
            self.events.lock().await.push(event);
            Ok(())
        }
    }

    struct Stack {
        store: Arc<InMemoryRoleStore>,
        participants: ParticipantService,
        subjects: SubjectRoleService,
        publisher: Arc<RecordingPublisher>,
    }

    fn role(name: &str) -> RoleName {
        match RoleName::new(name) {
            Ok(role) => role,
            Err(error) => panic!("invalid test role name '{name}': {error}"),
        }
    }

    fn entity(tenant: TenantId) -> EntityRef {
        EntityRef::new(tenant, EntityKind::Document, Uuid::new_v4())
    }

    async fn stack() -> Stack {
        let store = Arc::new(InMemoryRoleStore::new());
        let guard = GuardName::default();
        for name in ["admin", "manager", "reviewer", "viewer", "writer"] {
            let ensured = store.ensure_role(&role(name), &guard).await;
            assert!(ensured.is_ok());
        }

        let config = RbacConfig::default();
        let cache = RoleCacheService::new(
            store.clone(),
            Arc::new(InMemoryRoleCache::new()),
            config.cache_ttl_seconds,
        );
        let publisher = Arc::new(RecordingPublisher::default());
        let assignments = RoleAssignmentService::new(
            store.clone(),
            cache.clone(),
            publisher.clone(),
            config.clone(),
        );
        let participants = ParticipantService::new(
            assignments.clone(),
            cache.clone(),
            store.clone(),
            config.clone(),
        );
        let subjects = SubjectRoleService::new(assignments, cache, store.clone(), config);

        Stack {
            store,
            participants,
            subjects,
            publisher,
        }
    }

    #[tokio::test]
    async fn assign_check_and_clear_scenario() {
        let stack = stack().await;
        let tenant = TenantId::new();
        let entity = entity(tenant);
        let subject = SubjectRef::user(Uuid::new_v4());

        let assigned = stack
            .subjects
            .assign_role(&subject, &role("admin"), &entity)
            .await;
        assert!(assigned.is_ok());

        let has_admin = stack
            .subjects
            .has_role_on(&subject, &RoleSelector::Name(role("admin")), &entity, None)
            .await;
        let has_viewer = stack
            .subjects
            .has_role_on(&subject, &RoleSelector::Name(role("viewer")), &entity, None)
            .await;
        assert_eq!(has_admin.ok(), Some(true));
        assert_eq!(has_viewer.ok(), Some(false));

        let removed = stack
            .participants
            .remove_participant(&entity, &subject, None)
            .await;
        assert!(removed.is_ok());

        let has_admin = stack
            .subjects
            .has_role_on(&subject, &RoleSelector::Name(role("admin")), &entity, None)
            .await;
        assert_eq!(has_admin.ok(), Some(false));

        let events = stack.publisher.events.lock().await;
        let cleared = events
            .iter()
            .filter(|event| matches!(event, RoleEvent::AllRolesRemoved { .. }))
            .count();
        assert_eq!(cleared, 1);
    }

    #[tokio::test]
    async fn change_participant_role_replaces_every_prior_role() {
        let stack = stack().await;
        let entity = entity(TenantId::new());
        let subject = SubjectRef::user(Uuid::new_v4());

        let assigned = stack
            .subjects
            .assign_roles(&subject, &[role("admin"), role("reviewer")], &entity)
            .await;
        assert!(assigned.is_ok());

        let changed = stack
            .participants
            .change_participant_role(&entity, &subject, &role("writer"))
            .await;
        assert!(changed.is_ok());

        let roles = stack.subjects.roles_on(&subject, &entity, None).await;
        assert_eq!(roles.ok(), Some(vec![role("writer")]));
    }

    #[tokio::test]
    async fn multi_role_subjects_keep_the_remaining_role() {
        let stack = stack().await;
        let entity = entity(TenantId::new());
        let subject = SubjectRef::user(Uuid::new_v4());

        let assigned = stack
            .subjects
            .assign_roles(&subject, &[role("admin"), role("reviewer")], &entity)
            .await;
        assert!(assigned.is_ok());

        let removed = stack
            .participants
            .remove_participant(&entity, &subject, Some(&role("admin")))
            .await;
        assert!(removed.is_ok());

        let roles = stack.subjects.roles_on(&subject, &entity, None).await;
        assert_eq!(roles.ok(), Some(vec![role("reviewer")]));
    }

    #[tokio::test]
    async fn reads_after_writes_observe_the_write_through_the_cache() {
        let stack = stack().await;
        let entity = entity(TenantId::new());
        let subject = SubjectRef::user(Uuid::new_v4());

        // Prime the cache with the empty state first.
        let before = stack
            .participants
            .user_has_any_role(&entity, &subject)
            .await;
        assert_eq!(before.ok(), Some(false));

        let assigned = stack
            .subjects
            .assign_role(&subject, &role("viewer"), &entity)
            .await;
        assert!(assigned.is_ok());

        let after_assign = stack
            .participants
            .user_has_any_role(&entity, &subject)
            .await;
        assert_eq!(after_assign.ok(), Some(true));

        let removed = stack
            .subjects
            .remove_role(&subject, &role("viewer"), &entity)
            .await;
        assert!(removed.is_ok());

        let after_remove = stack
            .participants
            .user_has_any_role(&entity, &subject)
            .await;
        assert_eq!(after_remove.ok(), Some(false));
    }

    #[tokio::test]
    async fn failed_sync_batch_leaves_prior_state_intact() {
        let stack = stack().await;
        let entity = entity(TenantId::new());
        let kept = SubjectRef::user(Uuid::new_v4());
        let broken = SubjectRef::user(Uuid::new_v4());

        let assigned = stack
            .participants
            .add_participant(&entity, &kept, &[role("admin")], false)
            .await;
        assert!(assigned.is_ok());

        let changes = vec![
            (kept, vec![role("viewer")]),
            (broken, vec![role("nonexistent-level")]),
        ];
        let guard = GuardName::default();
        let result = stack.store.sync_all(&entity, &changes, &guard).await;
        assert!(matches!(result, Err(AppError::UnknownRole(_))));

        let roles = stack.subjects.roles_on(&kept, &entity, None).await;
        assert_eq!(roles.ok(), Some(vec![role("admin")]));
    }

    #[tokio::test]
    async fn summary_and_count_follow_participants() {
        let stack = stack().await;
        let entity = entity(TenantId::new());
        let first = SubjectRef::user(Uuid::new_v4());
        let second = SubjectRef::user(Uuid::new_v4());

        let added = stack
            .participants
            .add_participant(&entity, &first, &[role("admin"), role("reviewer")], false)
            .await;
        assert!(added.is_ok());
        let added = stack
            .participants
            .add_participant(&entity, &second, &[role("reviewer")], false)
            .await;
        assert!(added.is_ok());

        let count = stack.participants.participant_count(&entity, None).await;
        assert_eq!(count.ok(), Some(2));

        let summary = stack
            .participants
            .assigned_roles_summary(&entity, None)
            .await;
        assert!(summary.is_ok());
        if let Ok(summary) = summary {
            let reviewer_row = summary.iter().find(|row| row.role == role("reviewer"));
            assert_eq!(reviewer_row.map(|row| row.subjects), Some(2));
        }
    }

    #[tokio::test]
    async fn guards_partition_role_catalogs() {
        let stack = stack().await;
        let entity = entity(TenantId::new());
        let subject = SubjectRef::user(Uuid::new_v4());

        let api_guard = GuardName::new("api");
        assert!(api_guard.is_ok());
        let Ok(api_guard) = api_guard else {
            return;
        };

        let assigned = stack
            .subjects
            .assign_role(&subject, &role("admin"), &entity)
            .await;
        assert!(assigned.is_ok());

        // The api guard has no catalog, so the same check there fails as
        // an unknown role rather than silently returning false.
        let result = stack
            .subjects
            .has_role_on(
                &subject,
                &RoleSelector::Name(role("admin")),
                &entity,
                Some(&api_guard),
            )
            .await;
        assert!(matches!(result, Err(AppError::UnknownRole(_))));
    }
}
