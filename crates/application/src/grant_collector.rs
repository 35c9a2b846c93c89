use std::sync::Arc;

use chrono::{DateTime, Utc};
use orgperm_core::AppResult;
use orgperm_domain::{Capability, PermissionGrant, UserId};

use crate::{GrantQuery, PermissionRepository};

/// Gathers every candidate grant for one user and capability.
///
/// Department grants come only from departments the user is a direct, active
/// member of; grants on ancestor departments do not flow down the tree.
#[derive(Clone)]
pub struct GrantCollector {
    repository: Arc<dyn PermissionRepository>,
}

impl GrantCollector {
    /// Creates a collector over a permission repository.
    #[must_use]
    pub fn new(repository: Arc<dyn PermissionRepository>) -> Self {
        Self { repository }
    }

    /// Returns unexpired direct, department, role and group grants, in that order.
    pub async fn collect(
        &self,
        user_id: UserId,
        capability: &Capability,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<PermissionGrant>> {
        let query = GrantQuery::for_capability(capability);

        let mut candidates = self.repository.list_direct_grants(user_id, query).await?;

        let department_ids = self.repository.list_active_department_ids(user_id).await?;
        if !department_ids.is_empty() {
            candidates.extend(
                self.repository
                    .list_department_grants(department_ids.as_slice(), query)
                    .await?,
            );
        }

        candidates.extend(self.repository.list_role_grants(user_id, query).await?);
        candidates.extend(self.repository.list_group_grants(user_id, query).await?);

        candidates.retain(|grant| {
            grant.capability == *capability && !grant.is_expired_at(now)
        });

        Ok(candidates)
    }
}
