//! Application services and ports.

#![forbid(unsafe_code)]

mod audit_ports;
mod department_hierarchy_service;
mod department_ports;
mod grant_collector;
mod permission_ports;
mod permission_resolution_service;
mod template_application_service;
mod template_ports;

#[cfg(test)]
mod test_support;

pub use audit_ports::{AuditEvent, AuditRepository, AuditTrail};
pub use department_hierarchy_service::DepartmentHierarchyService;
pub use department_ports::{
    CreateDepartmentInput, DepartmentRepository, DepartmentTransaction, DepartmentView,
};
pub use grant_collector::GrantCollector;
pub use permission_ports::{GrantChangeEntry, GrantChangeKind, GrantQuery, PermissionRepository};
pub use permission_resolution_service::{PermissionResolutionService, resolve};
pub use template_application_service::TemplateApplicationService;
pub use template_ports::{
    ApplicationResult, CreateTemplateInput, TemplateRepository, TemplateUsage,
    UserApplicationOutcome, UserApplicationResult,
};
