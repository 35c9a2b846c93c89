use std::sync::Arc;

use orgperm_application::{
    AuditRepository, AuditTrail, DepartmentHierarchyService, DepartmentRepository,
    GrantCollector, PermissionRepository, PermissionResolutionService, TemplateApplicationService,
    TemplateRepository,
};
use orgperm_infrastructure::{
    InMemoryAuditRepository, InMemoryOrganizationRepository, InMemoryTemplateRepository,
    PostgresAuditRepository, PostgresDepartmentRepository, PostgresPermissionRepository,
    PostgresTemplateRepository,
};
use sqlx::PgPool;

use crate::state::AppState;

struct RepositorySet {
    department_repository: Arc<dyn DepartmentRepository>,
    permission_repository: Arc<dyn PermissionRepository>,
    template_repository: Arc<dyn TemplateRepository>,
    audit_repository: Arc<dyn AuditRepository>,
}

pub fn build_postgres_state(pool: PgPool) -> AppState {
    build_app_state(RepositorySet {
        department_repository: Arc::new(PostgresDepartmentRepository::new(pool.clone())),
        permission_repository: Arc::new(PostgresPermissionRepository::new(pool.clone())),
        template_repository: Arc::new(PostgresTemplateRepository::new(pool.clone())),
        audit_repository: Arc::new(PostgresAuditRepository::new(pool)),
    })
}

pub fn build_in_memory_state() -> AppState {
    let organization = Arc::new(InMemoryOrganizationRepository::new());

    build_app_state(RepositorySet {
        department_repository: organization.clone(),
        permission_repository: organization,
        template_repository: Arc::new(InMemoryTemplateRepository::new()),
        audit_repository: Arc::new(InMemoryAuditRepository::new()),
    })
}

fn build_app_state(repositories: RepositorySet) -> AppState {
    let audit_trail = AuditTrail::new(repositories.audit_repository);

    AppState {
        department_service: DepartmentHierarchyService::new(
            repositories.department_repository,
            audit_trail.clone(),
        ),
        permission_service: PermissionResolutionService::new(GrantCollector::new(
            repositories.permission_repository.clone(),
        )),
        template_service: TemplateApplicationService::new(
            repositories.template_repository,
            repositories.permission_repository,
            audit_trail,
        ),
    }
}
