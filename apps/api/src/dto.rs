mod common;
mod departments;
mod permissions;
mod templates;

pub use common::HealthResponse;
pub use departments::{
    CreateDepartmentRequest, DepartmentResponse, DepartmentTreeQuery, DepartmentViewResponse,
    MoveDepartmentRequest, ReorderDepartmentsRequest, RenameDepartmentCodeRequest,
};
pub use permissions::{
    CheckPermissionQuery, EffectiveDecisionResponse, GrantSourceResponse,
    PermissionMatrixEntryResponse, PermissionMatrixRequest,
};
pub use templates::{
    ApplyTemplateRequest, CreateTemplateRequest, TemplateApplicationResponse, TemplateResponse,
    UpdateTemplateStatusRequest, UserApplicationResponse,
};
