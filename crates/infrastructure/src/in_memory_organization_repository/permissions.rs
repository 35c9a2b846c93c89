use async_trait::async_trait;
use orgperm_application::{GrantChangeEntry, GrantQuery, PermissionRepository};
use orgperm_core::AppResult;
use orgperm_domain::{DepartmentId, GrantId, GrantSource, PermissionGrant, UserId};

use super::{InMemoryOrganizationRepository, StoredGrant};

impl InMemoryOrganizationRepository {
    async fn active_grants_where(
        &self,
        query: GrantQuery<'_>,
        predicate: impl Fn(&GrantSource) -> bool,
    ) -> Vec<PermissionGrant> {
        self.grants
            .read()
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
impl PermissionRepository for InMemoryOrganizationRepository {
    async fn list_direct_grants(
        &self,
        user_id: UserId,
        query: GrantQuery<'_>,
    ) -> AppResult<Vec<PermissionGrant>> {
        Ok(self
            .active_grants_where(query, |source| *source == GrantSource::Direct(user_id))
            .await)
    }

    async fn list_active_department_ids(&self, user_id: UserId) -> AppResult<Vec<DepartmentId>> {
        let mut department_ids: Vec<DepartmentId> = self
            .memberships
            .read()
            .await
            .iter()
            .filter_map(|((member_id, department_id), is_active)| {
                (*member_id == user_id && *is_active).then_some(*department_id)
            })
            .collect();
        department_ids.sort();

        Ok(department_ids)
    }

    async fn list_department_grants(
        &self,
        department_ids: &[DepartmentId],
        query: GrantQuery<'_>,
    ) -> AppResult<Vec<PermissionGrant>> {
        Ok(self
            .active_grants_where(query, |source| {
                matches!(source, GrantSource::Department(id) if department_ids.contains(id))
            })
            .await)
    }

    async fn list_role_grants(
        &self,
        user_id: UserId,
        query: GrantQuery<'_>,
    ) -> AppResult<Vec<PermissionGrant>> {
        let role_members = self.role_members.read().await.clone();
        Ok(self
            .active_grants_where(query, |source| {
                matches!(source, GrantSource::Role(role_id) if role_members.contains(&(*role_id, user_id)))
            })
            .await)
    }

    async fn list_group_grants(
        &self,
        user_id: UserId,
        query: GrantQuery<'_>,
    ) -> AppResult<Vec<PermissionGrant>> {
        let group_members = self.group_members.read().await.clone();
        Ok(self
            .active_grants_where(query, |source| {
                matches!(source, GrantSource::Group(group_id) if group_members.contains(&(*group_id, user_id)))
            })
            .await)
    }

    async fn user_exists(&self, user_id: UserId) -> AppResult<bool> {
        Ok(self.users.read().await.contains(&user_id))
    }

    async fn insert_grant(&self, grant: PermissionGrant) -> AppResult<GrantId> {
        let grant_id = grant.grant_id;
        self.grants.write().await.push(StoredGrant {
            grant,
            is_active: true,
        });
        Ok(grant_id)
    }

    async fn deactivate_direct_grants(&self, user_id: UserId) -> AppResult<u64> {
        let mut deactivated = 0_u64;
        for stored in self.grants.write().await.iter_mut() {
            if stored.is_active && stored.grant.source == GrantSource::Direct(user_id) {
                stored.is_active = false;
                deactivated += 1;
            }
        }
        Ok(deactivated)
    }

    async fn record_change_history(&self, entry: GrantChangeEntry) -> AppResult<()> {
        self.history.write().await.push(entry);
        Ok(())
    }
}
