use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use orgperm_application::GrantChangeEntry;
use orgperm_domain::{Department, DepartmentId, GroupId, PermissionGrant, RoleId, UserId};
use tokio::sync::{Mutex, RwLock};

mod departments;
mod permissions;

#[cfg(test)]
mod tests;

#[derive(Debug, Clone)]
struct StoredGrant {
    grant: PermissionGrant,
    is_active: bool,
}

/// In-memory department tree, membership and grant store.
///
/// Implements both the department and the permission ports so that member
/// counts and department grants read the same membership table.
#[derive(Debug, Default)]
pub struct InMemoryOrganizationRepository {
    departments: Arc<RwLock<HashMap<DepartmentId, Department>>>,
    write_gate: Arc<Mutex<()>>,
    users: RwLock<HashSet<UserId>>,
    memberships: RwLock<HashMap<(UserId, DepartmentId), bool>>,
    role_members: RwLock<HashSet<(RoleId, UserId)>>,
    group_members: RwLock<HashSet<(GroupId, UserId)>>,
    grants: RwLock<Vec<StoredGrant>>,
    history: RwLock<Vec<GrantChangeEntry>>,
}

impl InMemoryOrganizationRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user.
    pub async fn add_user(&self, user_id: UserId) {
        self.users.write().await.insert(user_id);
    }

    /// Adds or updates a department membership.
    pub async fn set_membership(&self, user_id: UserId, department_id: DepartmentId, is_active: bool) {
        self.memberships
            .write()
            .await
            .insert((user_id, department_id), is_active);
    }

    /// Adds a user to a role.
    pub async fn add_role_member(&self, role_id: RoleId, user_id: UserId) {
        self.role_members.write().await.insert((role_id, user_id));
    }

    /// Adds a user to a group.
    pub async fn add_group_member(&self, group_id: GroupId, user_id: UserId) {
        self.group_members.write().await.insert((group_id, user_id));
    }

    /// Returns the recorded grant history in insertion order.
    pub async fn grant_history(&self) -> Vec<GrantChangeEntry> {
        self.history.read().await.clone()
    }
}
