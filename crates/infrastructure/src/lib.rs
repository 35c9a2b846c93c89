//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_audit_repository;
mod in_memory_organization_repository;
mod in_memory_template_repository;
mod postgres_audit_repository;
mod postgres_department_repository;
mod postgres_permission_repository;
mod postgres_template_repository;

#[cfg(test)]
mod postgres_test_support;

pub use in_memory_audit_repository::InMemoryAuditRepository;
pub use in_memory_organization_repository::InMemoryOrganizationRepository;
pub use in_memory_template_repository::InMemoryTemplateRepository;
pub use postgres_audit_repository::PostgresAuditRepository;
pub use postgres_department_repository::PostgresDepartmentRepository;
pub use postgres_permission_repository::PostgresPermissionRepository;
pub use postgres_template_repository::PostgresTemplateRepository;
