use orgperm_application::{
    DepartmentHierarchyService, PermissionResolutionService, TemplateApplicationService,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub department_service: DepartmentHierarchyService,
    pub permission_service: PermissionResolutionService,
    pub template_service: TemplateApplicationService,
}
