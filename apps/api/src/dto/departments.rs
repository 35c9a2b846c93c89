use orgperm_application::DepartmentView;
use orgperm_domain::{Department, DepartmentId};
use serde::{Deserialize, Serialize};

/// Query string for tree listings.
#[derive(Debug, Default, Deserialize)]
pub struct DepartmentTreeQuery {
    pub root_id: Option<DepartmentId>,
}

/// Incoming payload for department creation.
#[derive(Debug, Deserialize)]
pub struct CreateDepartmentRequest {
    pub parent_id: Option<DepartmentId>,
    pub code: String,
    pub name: String,
    pub sort_order: Option<i32>,
}

/// Incoming payload for moving a department subtree.
#[derive(Debug, Deserialize)]
pub struct MoveDepartmentRequest {
    pub new_parent_id: Option<DepartmentId>,
    pub position: Option<usize>,
}

/// Incoming payload for changing a department code.
#[derive(Debug, Deserialize)]
pub struct RenameDepartmentCodeRequest {
    pub code: String,
}

/// Incoming payload for sibling reordering.
#[derive(Debug, Deserialize)]
pub struct ReorderDepartmentsRequest {
    pub parent_id: Option<DepartmentId>,
    pub ordered_ids: Vec<DepartmentId>,
}

/// API representation of a department.
#[derive(Debug, Serialize)]
pub struct DepartmentResponse {
    pub id: String,
    pub parent_id: Option<String>,
    pub code: String,
    pub name: String,
    pub path: String,
    pub level: usize,
    pub sort_order: i32,
    pub status: &'static str,
}

/// API representation of a department with its neighbourhood.
#[derive(Debug, Serialize)]
pub struct DepartmentViewResponse {
    pub department: DepartmentResponse,
    pub parent: Option<DepartmentResponse>,
    pub children: Vec<DepartmentResponse>,
}

impl From<Department> for DepartmentResponse {
    fn from(value: Department) -> Self {
        Self {
            id: value.id().to_string(),
            parent_id: value.parent_id().map(|parent_id| parent_id.to_string()),
            code: value.code().to_string(),
            name: value.name().to_owned(),
            path: value.path().to_string(),
            level: value.level(),
            sort_order: value.sort_order(),
            status: value.status().as_str(),
        }
    }
}

impl From<DepartmentView> for DepartmentViewResponse {
    fn from(value: DepartmentView) -> Self {
        Self {
            department: DepartmentResponse::from(value.department),
            parent: value.parent.map(DepartmentResponse::from),
            children: value
                .children
                .into_iter()
                .map(DepartmentResponse::from)
                .collect(),
        }
    }
}
