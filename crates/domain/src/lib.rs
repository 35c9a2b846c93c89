//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod department;
mod ids;
mod path;
mod permission;
mod security;
mod template;

pub use department::{Department, DepartmentStatus};
pub use ids::{DepartmentId, GrantId, GroupId, RoleId, TemplateId, UserId};
pub use path::{
    DepartmentCode, DepartmentPath, MAX_DEPARTMENT_LEVEL, PATH_SEPARATOR, path_codec,
};
pub use permission::{
    Capability, EffectiveDecision, GrantSource, GrantSourceType, PermissionGrant,
};
pub use security::AuditAction;
pub use template::{PermissionTemplate, TemplateOperation};
