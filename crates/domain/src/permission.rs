use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use orgperm_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::ids::{DepartmentId, GrantId, GroupId, RoleId, TemplateId, UserId};

/// Guarded `(resource, action)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Capability {
    resource: NonEmptyString,
    action: NonEmptyString,
}

impl Capability {
    /// Creates a capability from non-empty resource and action names.
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> AppResult<Self> {
        let resource = resource.into();
        let action = action.into();
        Ok(Self {
            resource: NonEmptyString::new(resource.trim())
                .map_err(|_| AppError::Validation("capability resource must not be empty".to_owned()))?,
            action: NonEmptyString::new(action.trim())
                .map_err(|_| AppError::Validation("capability action must not be empty".to_owned()))?,
        })
    }

    /// Parses the `resource:action` transport form.
    pub fn parse(value: &str) -> AppResult<Self> {
        let Some((resource, action)) = value.split_once(':') else {
            return Err(AppError::Validation(format!(
                "capability '{value}' must have the form 'resource:action'"
            )));
        };

        Self::new(resource, action)
    }

    /// Returns the resource name.
    #[must_use]
    pub fn resource(&self) -> &str {
        self.resource.as_str()
    }

    /// Returns the action name.
    #[must_use]
    pub fn action(&self) -> &str {
        self.action.as_str()
    }

    /// Returns whether this capability matches the optional filters.
    #[must_use]
    pub fn matches(&self, resource: Option<&str>, action: Option<&str>) -> bool {
        resource.is_none_or(|value| value == self.resource())
            && action.is_none_or(|value| value == self.action())
    }
}

impl Display for Capability {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}:{}", self.resource, self.action)
    }
}

impl FromStr for Capability {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

/// Storage discriminator of a grant source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantSourceType {
    /// Assigned to a user directly.
    Direct,
    /// Attached to a department.
    Department,
    /// Attached to a role.
    Role,
    /// Attached to a user group.
    Group,
}

impl GrantSourceType {
    /// Returns a stable storage value for this source type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Department => "department",
            Self::Role => "role",
            Self::Group => "group",
        }
    }
}

impl FromStr for GrantSourceType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "direct" => Ok(Self::Direct),
            "department" => Ok(Self::Department),
            "role" => Ok(Self::Role),
            "group" => Ok(Self::Group),
            _ => Err(AppError::Validation(format!(
                "unknown grant source type '{value}'"
            ))),
        }
    }
}

/// Origin of a permission grant, carrying the id that matches its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum GrantSource {
    /// Assigned to this user.
    Direct(UserId),
    /// Attached to this department.
    Department(DepartmentId),
    /// Attached to this role.
    Role(RoleId),
    /// Attached to this group.
    Group(GroupId),
}

impl GrantSource {
    /// Rebuilds a source from its storage discriminator and id.
    #[must_use]
    pub fn from_parts(source_type: GrantSourceType, source_id: Uuid) -> Self {
        match source_type {
            GrantSourceType::Direct => Self::Direct(UserId::from_uuid(source_id)),
            GrantSourceType::Department => Self::Department(DepartmentId::from_uuid(source_id)),
            GrantSourceType::Role => Self::Role(RoleId::from_uuid(source_id)),
            GrantSourceType::Group => Self::Group(GroupId::from_uuid(source_id)),
        }
    }

    /// Returns the storage discriminator.
    #[must_use]
    pub fn source_type(&self) -> GrantSourceType {
        match self {
            Self::Direct(_) => GrantSourceType::Direct,
            Self::Department(_) => GrantSourceType::Department,
            Self::Role(_) => GrantSourceType::Role,
            Self::Group(_) => GrantSourceType::Group,
        }
    }

    /// Returns the raw id of the user, department, role or group.
    #[must_use]
    pub fn source_id(&self) -> Uuid {
        match self {
            Self::Direct(id) => id.as_uuid(),
            Self::Department(id) => id.as_uuid(),
            Self::Role(id) => id.as_uuid(),
            Self::Group(id) => id.as_uuid(),
        }
    }

    /// Tie-break rank among equal priorities: Direct > Role > Group > Department.
    #[must_use]
    pub fn precedence(&self) -> u8 {
        match self {
            Self::Direct(_) => 3,
            Self::Role(_) => 2,
            Self::Group(_) => 1,
            Self::Department(_) => 0,
        }
    }
}

/// One allow or deny row for a capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionGrant {
    /// Stable grant id.
    pub grant_id: GrantId,
    /// Where the grant comes from.
    pub source: GrantSource,
    /// Guarded capability.
    pub capability: Capability,
    /// Explicit allow (`true`) or explicit deny (`false`).
    pub granted: bool,
    /// Higher priority wins among grants for the same capability.
    pub priority: i32,
    /// Opaque predicate passed through to the caller.
    pub conditions: Option<Value>,
    /// Instant after which the grant is inert.
    pub expires_at: Option<DateTime<Utc>>,
    /// Instant the grant was created.
    pub granted_at: DateTime<Utc>,
    /// Template that produced this grant, when applied in bulk.
    pub template_id: Option<TemplateId>,
}

impl PermissionGrant {
    /// Returns the user the grant is assigned to, for direct grants.
    #[must_use]
    pub fn subject_id(&self) -> Option<UserId> {
        match self.source {
            GrantSource::Direct(user_id) => Some(user_id),
            _ => None,
        }
    }

    /// Returns whether the grant has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at < now)
    }
}

/// Result of resolving all candidate grants for one capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectiveDecision {
    /// Whether access is allowed.
    pub granted: bool,
    /// Source of the winning grant, `None` for default deny.
    pub source: Option<GrantSource>,
    /// Winning grant id, `None` for default deny.
    pub grant_id: Option<GrantId>,
    /// Winning priority, 0 for default deny.
    pub priority: i32,
    /// Conditions of the winning grant.
    pub conditions: Option<Value>,
    /// Expiry of the winning grant.
    pub expires_at: Option<DateTime<Utc>>,
    /// Number of candidate grants that were ranked.
    pub candidates_considered: usize,
}

impl EffectiveDecision {
    /// Decision returned when no grant applies.
    #[must_use]
    pub fn default_deny() -> Self {
        Self {
            granted: false,
            source: None,
            grant_id: None,
            priority: 0,
            conditions: None,
            expires_at: None,
            candidates_considered: 0,
        }
    }

    /// Decision taken from the winning grant.
    #[must_use]
    pub fn from_grant(grant: &PermissionGrant, candidates_considered: usize) -> Self {
        Self {
            granted: grant.granted,
            source: Some(grant.source),
            grant_id: Some(grant.grant_id),
            priority: grant.priority,
            conditions: grant.conditions.clone(),
            expires_at: grant.expires_at,
            candidates_considered,
        }
    }
}
