use async_trait::async_trait;
use chrono::{DateTime, Utc};

use orgperm_core::AppResult;
use orgperm_domain::{Capability, DepartmentId, GrantId, PermissionGrant, TemplateId, UserId};

/// Optional `(resource, action)` filter for grant listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GrantQuery<'a> {
    /// Resource filter.
    pub resource: Option<&'a str>,
    /// Action filter.
    pub action: Option<&'a str>,
}

impl<'a> GrantQuery<'a> {
    /// Filter matching exactly one capability.
    #[must_use]
    pub fn for_capability(capability: &'a Capability) -> Self {
        Self {
            resource: Some(capability.resource()),
            action: Some(capability.action()),
        }
    }
}

/// Kind of change recorded in grant history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantChangeKind {
    /// A grant row was inserted.
    Granted,
    /// All active direct grants of a user were deactivated.
    DirectGrantsDeactivated,
}

impl GrantChangeKind {
    /// Returns a stable storage value for this change kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Granted => "granted",
            Self::DirectGrantsDeactivated => "direct_grants_deactivated",
        }
    }
}

/// History record for a grant change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantChangeEntry {
    /// Affected user.
    pub user_id: UserId,
    /// What happened.
    pub kind: GrantChangeKind,
    /// Inserted grant, for `Granted`.
    pub grant_id: Option<GrantId>,
    /// Inserted capability, for `Granted`.
    pub capability: Option<Capability>,
    /// Number of rows affected.
    pub affected_rows: u64,
    /// Template that caused the change.
    pub template_id: Option<TemplateId>,
    /// Free-form justification.
    pub reason: Option<String>,
    /// Subject that made the change.
    pub changed_by: String,
    /// Change timestamp.
    pub changed_at: DateTime<Utc>,
}

/// Storage port for permission grants and memberships.
///
/// Listing operations return active grants only; expiry filtering is the
/// caller's concern.
#[async_trait]
pub trait PermissionRepository: Send + Sync {
    /// Lists active direct grants of a user.
    async fn list_direct_grants(
        &self,
        user_id: UserId,
        query: GrantQuery<'_>,
    ) -> AppResult<Vec<PermissionGrant>>;

    /// Lists departments the user actively belongs to.
    async fn list_active_department_ids(&self, user_id: UserId) -> AppResult<Vec<DepartmentId>>;

    /// Lists active grants attached to any of the given departments.
    async fn list_department_grants(
        &self,
        department_ids: &[DepartmentId],
        query: GrantQuery<'_>,
    ) -> AppResult<Vec<PermissionGrant>>;

    /// Lists active grants reaching the user through roles.
    async fn list_role_grants(
        &self,
        _user_id: UserId,
        _query: GrantQuery<'_>,
    ) -> AppResult<Vec<PermissionGrant>> {
        Ok(Vec::new())
    }

    /// Lists active grants reaching the user through groups.
    async fn list_group_grants(
        &self,
        _user_id: UserId,
        _query: GrantQuery<'_>,
    ) -> AppResult<Vec<PermissionGrant>> {
        Ok(Vec::new())
    }

    /// Returns whether the user exists.
    async fn user_exists(&self, user_id: UserId) -> AppResult<bool>;

    /// Inserts a grant row.
    async fn insert_grant(&self, grant: PermissionGrant) -> AppResult<GrantId>;

    /// Marks every active direct grant of the user inactive, returning the count.
    async fn deactivate_direct_grants(&self, user_id: UserId) -> AppResult<u64>;

    /// Appends a grant history record.
    async fn record_change_history(&self, entry: GrantChangeEntry) -> AppResult<()>;
}
