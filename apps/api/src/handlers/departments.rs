use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use orgperm_application::CreateDepartmentInput;
use orgperm_core::Actor;
use orgperm_domain::DepartmentId;

use crate::dto::{
    CreateDepartmentRequest, DepartmentResponse, DepartmentTreeQuery, DepartmentViewResponse,
    MoveDepartmentRequest, RenameDepartmentCodeRequest, ReorderDepartmentsRequest,
};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_departments_handler(
    State(state): State<AppState>,
    Query(query): Query<DepartmentTreeQuery>,
) -> ApiResult<Json<Vec<DepartmentResponse>>> {
    let departments = state
        .department_service
        .department_tree(query.root_id)
        .await?
        .into_iter()
        .map(DepartmentResponse::from)
        .collect();

    Ok(Json(departments))
}

pub async fn department_view_handler(
    State(state): State<AppState>,
    Path(department_id): Path<DepartmentId>,
) -> ApiResult<Json<DepartmentViewResponse>> {
    let view = state
        .department_service
        .department_view(department_id)
        .await?;

    Ok(Json(DepartmentViewResponse::from(view)))
}

pub async fn create_department_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<CreateDepartmentRequest>,
) -> ApiResult<(StatusCode, Json<DepartmentResponse>)> {
    let department = state
        .department_service
        .create_department(
            &actor,
            CreateDepartmentInput {
                parent_id: payload.parent_id,
                code: payload.code,
                name: payload.name,
                sort_order: payload.sort_order,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(DepartmentResponse::from(department))))
}

pub async fn move_department_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(department_id): Path<DepartmentId>,
    Json(payload): Json<MoveDepartmentRequest>,
) -> ApiResult<Json<DepartmentViewResponse>> {
    let view = state
        .department_service
        .move_department(&actor, department_id, payload.new_parent_id, payload.position)
        .await?;

    Ok(Json(DepartmentViewResponse::from(view)))
}

pub async fn rename_department_code_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(department_id): Path<DepartmentId>,
    Json(payload): Json<RenameDepartmentCodeRequest>,
) -> ApiResult<Json<DepartmentViewResponse>> {
    let view = state
        .department_service
        .rename_department_code(&actor, department_id, payload.code.as_str())
        .await?;

    Ok(Json(DepartmentViewResponse::from(view)))
}

pub async fn disable_department_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(department_id): Path<DepartmentId>,
) -> ApiResult<Json<DepartmentResponse>> {
    let department = state
        .department_service
        .disable_department(&actor, department_id)
        .await?;

    Ok(Json(DepartmentResponse::from(department)))
}

pub async fn reorder_departments_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<ReorderDepartmentsRequest>,
) -> ApiResult<StatusCode> {
    state
        .department_service
        .reorder_siblings(&actor, payload.parent_id, &payload.ordered_ids)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
