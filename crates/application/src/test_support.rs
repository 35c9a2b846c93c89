use std::collections::HashSet;

use async_trait::async_trait;
use orgperm_core::{AppError, AppResult};
use orgperm_domain::{DepartmentId, GrantId, GrantSource, PermissionGrant, UserId};
use tokio::sync::Mutex;

use crate::{AuditEvent, AuditRepository, GrantChangeEntry, GrantQuery, PermissionRepository};

#[derive(Default)]
pub(crate) struct FakeAuditRepository {
    pub(crate) events: Mutex<Vec<AuditEvent>>,
    pub(crate) fail: bool,
}

#[async_trait]
impl AuditRepository for FakeAuditRepository {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        if self.fail {
            return Err(AppError::Internal("audit store unavailable".to_owned()));
        }
        self.events.lock().await.push(event);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct StoredGrant {
    pub(crate) grant: PermissionGrant,
    pub(crate) is_active: bool,
}

#[derive(Default)]
pub(crate) struct FakePermissionRepository {
    pub(crate) grants: Mutex<Vec<StoredGrant>>,
    pub(crate) memberships: Mutex<Vec<(UserId, DepartmentId, bool)>>,
    pub(crate) users: Mutex<HashSet<UserId>>,
    pub(crate) history: Mutex<Vec<GrantChangeEntry>>,
    pub(crate) failing_inserts_for: Mutex<HashSet<UserId>>,
    pub(crate) insert_budget: Mutex<Option<usize>>,
    pub(crate) fail_history: bool,
}

impl FakePermissionRepository {
    pub(crate) async fn add_grant(&self, grant: PermissionGrant) {
        self.grants.lock().await.push(StoredGrant {
            grant,
            is_active: true,
        });
    }

    pub(crate) async fn add_user(&self, user_id: UserId) {
        self.users.lock().await.insert(user_id);
    }

    pub(crate) async fn add_membership(&self, user_id: UserId, department_id: DepartmentId, active: bool) {
        self.memberships
            .lock()
            .await
            .push((user_id, department_id, active));
    }

    pub(crate) async fn active_direct_grants(&self, user_id: UserId) -> Vec<PermissionGrant> {
        self.grants
            .lock()
            .await
            .iter()
            .filter(|stored| stored.is_active && stored.grant.source == GrantSource::Direct(user_id))
            .map(|stored| stored.grant.clone())
            .collect()
    }

    async fn list_matching(
        &self,
        query: GrantQuery<'_>,
        predicate: impl Fn(&GrantSource) -> bool + Send,
    ) -> Vec<PermissionGrant> {
        self.grants
            .lock()
            .await
            .iter()
            .filter(|stored| {
                stored.is_active
                    && predicate(&stored.grant.source)
                    && stored.grant.capability.matches(query.resource, query.action)
            })
            .map(|stored| stored.grant.clone())
            .collect()
    }
}

#[async_trait]
impl PermissionRepository for FakePermissionRepository {
    async fn list_direct_grants(
        &self,
        user_id: UserId,
        query: GrantQuery<'_>,
    ) -> AppResult<Vec<PermissionGrant>> {
        Ok(self
            .list_matching(query, |source| *source == GrantSource::Direct(user_id))
            .await)
    }

    async fn list_active_department_ids(&self, user_id: UserId) -> AppResult<Vec<DepartmentId>> {
        Ok(self
            .memberships
            .lock()
            .await
            .iter()
            .filter(|(member, _, active)| *member == user_id && *active)
            .map(|(_, department_id, _)| *department_id)
            .collect())
    }

    async fn list_department_grants(
        &self,
        department_ids: &[DepartmentId],
        query: GrantQuery<'_>,
    ) -> AppResult<Vec<PermissionGrant>> {
        let department_ids = department_ids.to_vec();
        Ok(self
            .list_matching(query, move |source| match source {
                GrantSource::Department(id) => department_ids.contains(id),
                _ => false,
            })
            .await)
    }

    async fn user_exists(&self, user_id: UserId) -> AppResult<bool> {
        Ok(self.users.lock().await.contains(&user_id))
    }

    async fn insert_grant(&self, grant: PermissionGrant) -> AppResult<GrantId> {
        if let GrantSource::Direct(user_id) = grant.source {
            if self.failing_inserts_for.lock().await.contains(&user_id) {
                return Err(AppError::Internal("grant store rejected insert".to_owned()));
            }
        }

        if let Some(remaining) = self.insert_budget.lock().await.as_mut() {
            if *remaining == 0 {
                return Err(AppError::Internal("grant store ran out of space".to_owned()));
            }
            *remaining -= 1;
        }

        let grant_id = grant.grant_id;
        self.add_grant(grant).await;
        Ok(grant_id)
    }

    async fn deactivate_direct_grants(&self, user_id: UserId) -> AppResult<u64> {
        let mut grants = self.grants.lock().await;
        let mut affected = 0;
        for stored in grants.iter_mut() {
            if stored.is_active && stored.grant.source == GrantSource::Direct(user_id) {
                stored.is_active = false;
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn record_change_history(&self, entry: GrantChangeEntry) -> AppResult<()> {
        if self.fail_history {
            return Err(AppError::Internal("history store unavailable".to_owned()));
        }
        self.history.lock().await.push(entry);
        Ok(())
    }
}
