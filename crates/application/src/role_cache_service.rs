use std::future::Future;
use std::sync::Arc;

use critiq_core::{AppError, AppResult};
use critiq_domain::{EntityRef, GuardName, RoleId, RoleName, RoleSelector, SubjectRef};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::{RoleCacheBackend, RoleStore};

/// Cache-aside service for role lookups and derived participant views.
///
/// The store always wins: entries are derived projections, invalidated
/// synchronously by the write path and recomputed lazily on the next read.
/// A failing backend degrades every operation to a direct store read; the
/// cache is an optimization, never a correctness dependency.
#[derive(Clone)]
pub struct RoleCacheService {
    store: Arc<dyn RoleStore>,
    backend: Arc<dyn RoleCacheBackend>,
    ttl_seconds: u32,
}

impl RoleCacheService {
    /// Creates a cache service over a store and a cache backend.
    #[must_use]
    pub fn new(
        store: Arc<dyn RoleStore>,
        backend: Arc<dyn RoleCacheBackend>,
        ttl_seconds: u32,
    ) -> Self {
        Self {
            store,
            backend,
            ttl_seconds,
        }
    }

    /// Resolves role names to catalog identifiers through the guard-scoped
    /// catalog entry.
    pub async fn role_ids_for(
        &self,
        names: &[RoleName],
        guard: &GuardName,
    ) -> AppResult<Vec<RoleId>> {
        let catalog = self.catalog(guard).await?;

        let mut ids = Vec::with_capacity(names.len());
        for name in names {
            let id = catalog
                .iter()
                .find(|(catalog_name, _)| catalog_name == name)
                .map(|(_, id)| *id)
                .ok_or_else(|| {
                    AppError::UnknownRole(format!(
                        "role '{name}' was not found in guard '{guard}'"
                    ))
                })?;
            ids.push(id);
        }

        Ok(ids)
    }

    /// Normalizes a role selector to catalog identifiers.
    pub async fn selector_role_ids(
        &self,
        selector: &RoleSelector,
        guard: &GuardName,
    ) -> AppResult<Vec<RoleId>> {
        if selector.is_empty() {
            return Err(AppError::UnknownRole(
                "role selector addresses no roles; pass a role name, an id, or a non-empty list"
                    .to_owned(),
            ));
        }

        if let Some(names) = selector.names() {
            return self.role_ids_for(&names, guard).await;
        }

        if let Some(ids) = selector.ids() {
            return Ok(ids);
        }

        Err(AppError::UnknownRole(
            "role selector shape was not recognized".to_owned(),
        ))
    }

    /// Returns the role ids the subject holds on the entity, cache-aside.
    pub async fn user_role_ids(
        &self,
        subject: &SubjectRef,
        entity: &EntityRef,
        guard: &GuardName,
    ) -> AppResult<Vec<RoleId>> {
        let key = Self::subject_view_key(entity, subject, guard, "role-ids");
        let store = Arc::clone(&self.store);
        let subject = *subject;
        let entity = *entity;
        let guard = guard.clone();

        self.remember(key.as_str(), async move {
            store.role_ids_of(&subject, &entity, &guard).await
        })
        .await
    }

    /// Returns whether the subject holds at least one role on the entity.
    ///
    /// Cached under its own key: the existence check runs on every
    /// participant permission check and invalidates more narrowly than
    /// the full id list.
    pub async fn user_has_any_role(
        &self,
        subject: &SubjectRef,
        entity: &EntityRef,
        guard: &GuardName,
    ) -> AppResult<bool> {
        let key = Self::subject_view_key(entity, subject, guard, "has-role");
        let store = Arc::clone(&self.store);
        let subject = *subject;
        let entity = *entity;
        let guard = guard.clone();

        self.remember(key.as_str(), async move {
            Ok(!store.role_ids_of(&subject, &entity, &guard).await?.is_empty())
        })
        .await
    }

    /// Returns whether the subject holds any role addressed by the
    /// selector on the entity, by role-id comparison.
    pub async fn user_holds_any(
        &self,
        subject: &SubjectRef,
        entity: &EntityRef,
        selector: &RoleSelector,
        guard: &GuardName,
    ) -> AppResult<bool> {
        let wanted = self.selector_role_ids(selector, guard).await?;
        let held = self.user_role_ids(subject, entity, guard).await?;

        Ok(wanted.iter().any(|id| held.contains(id)))
    }

    /// Serves a derived projection through the cache with the shared TTL
    /// and invalidation discipline.
    pub async fn remember<T, Fut>(&self, key: &str, producer: Fut) -> AppResult<T>
    where
        T: Serialize + DeserializeOwned,
        Fut: Future<Output = AppResult<T>> + Send,
    {
        if let Some(raw) = self.backend_get(key).await {
            match serde_json::from_str::<T>(raw.as_str()) {
                Ok(value) => return Ok(value),
                Err(error) => {
                    warn!(key, %error, "dropping undecodable role cache entry");
                    self.backend_forget(key).await;
                }
            }
        }

        let value = producer.await?;
        match serde_json::to_string(&value) {
            Ok(encoded) => self.backend_put(key, encoded.as_str()).await,
            Err(error) => warn!(key, %error, "failed to encode role cache entry"),
        }

        Ok(value)
    }

    /// Drops every cached view scoped to the entity, across guards and
    /// subjects.
    pub async fn invalidate_entity(&self, entity: &EntityRef) {
        let prefix = Self::entity_prefix(entity);
        if let Err(error) = self.backend.forget_prefix(prefix.as_str()).await {
            warn!(%entity, %error, "failed to invalidate entity role cache");
        }
    }

    /// Drops the cached views for one (subject, entity) pair.
    pub async fn invalidate_subject(
        &self,
        subject: &SubjectRef,
        entity: &EntityRef,
        guard: &GuardName,
    ) {
        for view in ["role-ids", "has-role"] {
            let key = Self::subject_view_key(entity, subject, guard, view);
            self.backend_forget(key.as_str()).await;
        }
    }

    /// Drops the cached role catalog for one guard.
    pub async fn invalidate_catalog(&self, guard: &GuardName) {
        self.backend_forget(Self::catalog_key(guard).as_str()).await;
    }

    /// Builds the cache key for an entity-scoped derived view.
    #[must_use]
    pub fn entity_view_key(entity: &EntityRef, guard: &GuardName, view: &str) -> String {
        format!("{}guard:{guard}:{view}", Self::entity_prefix(entity))
    }

    async fn catalog(&self, guard: &GuardName) -> AppResult<Vec<(RoleName, RoleId)>> {
        let key = Self::catalog_key(guard);
        let store = Arc::clone(&self.store);
        let guard = guard.clone();

        self.remember(key.as_str(), async move { store.role_catalog(&guard).await })
            .await
    }

    fn catalog_key(guard: &GuardName) -> String {
        format!("rbac:catalog:{guard}")
    }

    fn entity_prefix(entity: &EntityRef) -> String {
        format!(
            "rbac:entity:{}:{}:{}:",
            entity.tenant_id(),
            entity.kind().as_str(),
            entity.id()
        )
    }

    fn subject_view_key(
        entity: &EntityRef,
        subject: &SubjectRef,
        guard: &GuardName,
        view: &str,
    ) -> String {
        format!(
            "{}subject:{}:{}:guard:{guard}:{view}",
            Self::entity_prefix(entity),
            subject.kind().as_str(),
            subject.id()
        )
    }

    async fn backend_get(&self, key: &str) -> Option<String> {
        match self.backend.get(key).await {
            Ok(value) => value,
            Err(error) => {
                warn!(key, %error, "role cache read failed; falling back to store");
                None
            }
        }
    }

    async fn backend_put(&self, key: &str, value: &str) {
        if let Err(error) = self.backend.put(key, value, self.ttl_seconds).await {
            warn!(key, %error, "role cache write failed");
        }
    }

    async fn backend_forget(&self, key: &str) {
        if let Err(error) = self.backend.forget(key).await {
            warn!(key, %error, "role cache invalidation failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    use async_trait::async_trait;
    use critiq_core::{AppError, AppResult, TenantId};
    use critiq_domain::{
        EntityKind, EntityRef, GuardName, RoleAssignment, RoleCount, RoleId, RoleName,
        RoleSelector, SubjectRef,
    };
    use tokio::sync::Mutex;
    use uuid::Uuid;

    use crate::{RoleCacheBackend, RoleStore};

    use super::RoleCacheService;

    #[derive(Default)]
    struct FakeCacheBackend {
        entries: Mutex<HashMap<String, String>>,
        failing: bool,
    }

    #[async_trait]
    impl RoleCacheBackend for FakeCacheBackend {
        async fn get(&self, key: &str) -> AppResult<Option<String>> {
            if self.failing {
                return Err(AppError::Internal("cache backend is down".to_owned()));
            }
            Ok(self.entries.lock().await.get(key).cloned())
        }

        async fn put(&self, key: &str, value: &str, _ttl_seconds: u32) -> AppResult<()> {
            if self.failing {
                return Err(AppError::Internal("cache backend is down".to_owned()));
            }
            self.entries
                .lock()
                .await
                .insert(key.to_owned(), value.to_owned());
            Ok(())
        }

        async fn forget(&self, key: &str) -> AppResult<()> {
            self.entries.lock().await.remove(key);
            Ok(())
        }

        async fn forget_prefix(&self, prefix: &str) -> AppResult<()> {
            self.entries
                .lock()
                .await
                .retain(|key, _| !key.starts_with(prefix));
            Ok(())
        }
    }

    struct FakeRoleStore {
        catalog: Vec<(RoleName, RoleId)>,
        held: Vec<RoleId>,
        reads: AtomicU64,
    }

    impl FakeRoleStore {
        fn reads(&self) -> u64 {
            self.reads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RoleStore for FakeRoleStore {
        async fn assign(
            &self,
            _subject: &SubjectRef,
            _role: &RoleName,
            _entity: &EntityRef,
            _guard: &GuardName,
        ) -> AppResult<bool> {
            Ok(true)
        }

        async fn assign_many(
            &self,
            _subject: &SubjectRef,
            roles: &[RoleName],
            _entity: &EntityRef,
            _guard: &GuardName,
        ) -> AppResult<Vec<RoleName>> {
            Ok(roles.to_vec())
        }

        async fn remove(
            &self,
            _subject: &SubjectRef,
            _role: &RoleName,
            _entity: &EntityRef,
            _guard: &GuardName,
        ) -> AppResult<bool> {
            Ok(true)
        }

        async fn remove_all(
            &self,
            _subject: &SubjectRef,
            _entity: &EntityRef,
            _guard: &GuardName,
        ) -> AppResult<u64> {
            Ok(0)
        }

        async fn sync_all(
            &self,
            _entity: &EntityRef,
            _changes: &[(SubjectRef, Vec<RoleName>)],
            _guard: &GuardName,
        ) -> AppResult<()> {
            Ok(())
        }

        async fn change_role(
            &self,
            _subject: &SubjectRef,
            _entity: &EntityRef,
            _new_role: &RoleName,
            _guard: &GuardName,
        ) -> AppResult<u64> {
            Ok(0)
        }

        async fn roles_of(
            &self,
            _subject: &SubjectRef,
            _entity: &EntityRef,
            _guard: &GuardName,
        ) -> AppResult<Vec<RoleName>> {
            Ok(Vec::new())
        }

        async fn role_ids_of(
            &self,
            _subject: &SubjectRef,
            _entity: &EntityRef,
            _guard: &GuardName,
        ) -> AppResult<Vec<RoleId>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(self.held.clone())
        }

        async fn role_catalog(&self, _guard: &GuardName) -> AppResult<Vec<(RoleName, RoleId)>> {
            Ok(self.catalog.clone())
        }

        async fn ensure_role(&self, _name: &RoleName, _guard: &GuardName) -> AppResult<RoleId> {
            Ok(RoleId::new())
        }

        async fn subjects_with_any_role(
            &self,
            _entity: &EntityRef,
            _roles: Option<&[RoleId]>,
            _guard: &GuardName,
        ) -> AppResult<Vec<SubjectRef>> {
            Ok(Vec::new())
        }

        async fn assignments_for(
            &self,
            _entity: &EntityRef,
            _guard: &GuardName,
        ) -> AppResult<Vec<RoleAssignment>> {
            Ok(Vec::new())
        }

        async fn participant_count(
            &self,
            _entity: &EntityRef,
            _guard: &GuardName,
        ) -> AppResult<u64> {
            Ok(0)
        }

        async fn role_summary(
            &self,
            _entity: &EntityRef,
            _guard: &GuardName,
        ) -> AppResult<Vec<RoleCount>> {
            Ok(Vec::new())
        }
    }

    fn role(name: &str) -> RoleName {
        match RoleName::new(name) {
            Ok(role) => role,
            Err(error) => panic!("invalid test role name '{name}': {error}"),
        }
    }

    fn entity() -> EntityRef {
        EntityRef::new(TenantId::new(), EntityKind::Document, Uuid::new_v4())
    }

    fn service_with(
        held: Vec<RoleId>,
        failing: bool,
    ) -> (RoleCacheService, Arc<FakeRoleStore>) {
        let store = Arc::new(FakeRoleStore {
            catalog: vec![(role("admin"), RoleId::new()), (role("reviewer"), RoleId::new())],
            held,
            reads: AtomicU64::new(0),
        });
        let backend = Arc::new(FakeCacheBackend {
            entries: Mutex::new(HashMap::new()),
            failing,
        });
        let service = RoleCacheService::new(store.clone(), backend, 300);
        (service, store)
    }

    #[tokio::test]
    async fn user_role_ids_hits_the_store_once() {
        let held = vec![RoleId::new()];
        let (service, store) = service_with(held.clone(), false);
        let subject = SubjectRef::user(Uuid::new_v4());
        let entity = entity();
        let guard = GuardName::default();

        let first = service.user_role_ids(&subject, &entity, &guard).await;
        let second = service.user_role_ids(&subject, &entity, &guard).await;

        assert_eq!(first.ok(), Some(held.clone()));
        assert_eq!(second.ok(), Some(held));
        assert_eq!(store.reads(), 1);
    }

    #[tokio::test]
    async fn failing_backend_degrades_to_store_reads() {
        let held = vec![RoleId::new()];
        let (service, store) = service_with(held.clone(), true);
        let subject = SubjectRef::user(Uuid::new_v4());
        let entity = entity();
        let guard = GuardName::default();

        let first = service.user_role_ids(&subject, &entity, &guard).await;
        let second = service.user_role_ids(&subject, &entity, &guard).await;

        assert_eq!(first.ok(), Some(held.clone()));
        assert_eq!(second.ok(), Some(held));
        assert_eq!(store.reads(), 2);
    }

    #[tokio::test]
    async fn invalidate_subject_forces_a_fresh_read() {
        let (service, store) = service_with(vec![RoleId::new()], false);
        let subject = SubjectRef::user(Uuid::new_v4());
        let entity = entity();
        let guard = GuardName::default();

        let first = service.user_role_ids(&subject, &entity, &guard).await;
        assert!(first.is_ok());

        service.invalidate_subject(&subject, &entity, &guard).await;

        let second = service.user_role_ids(&subject, &entity, &guard).await;
        assert!(second.is_ok());
        assert_eq!(store.reads(), 2);
    }

    #[tokio::test]
    async fn unknown_role_name_is_rejected() {
        let (service, _) = service_with(Vec::new(), false);
        let guard = GuardName::default();

        let result = service.role_ids_for(&[role("auditor")], &guard).await;
        assert!(matches!(result, Err(AppError::UnknownRole(_))));
    }

    #[tokio::test]
    async fn empty_selector_is_rejected() {
        let (service, _) = service_with(Vec::new(), false);
        let subject = SubjectRef::user(Uuid::new_v4());
        let entity = entity();
        let guard = GuardName::default();

        let result = service
            .user_holds_any(&subject, &entity, &RoleSelector::Names(Vec::new()), &guard)
            .await;
        assert!(matches!(result, Err(AppError::UnknownRole(_))));
    }
}
