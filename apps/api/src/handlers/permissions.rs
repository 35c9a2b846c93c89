use axum::Json;
use axum::extract::{Query, State};
use chrono::Utc;
use orgperm_domain::Capability;

use crate::dto::{
    CheckPermissionQuery, EffectiveDecisionResponse, PermissionMatrixEntryResponse,
    PermissionMatrixRequest,
};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn check_permission_handler(
    State(state): State<AppState>,
    Query(query): Query<CheckPermissionQuery>,
) -> ApiResult<Json<EffectiveDecisionResponse>> {
    let decision = state
        .permission_service
        .check_permission(query.user_id, query.resource.as_str(), query.action.as_str())
        .await?;

    Ok(Json(EffectiveDecisionResponse::from(decision)))
}

pub async fn permission_matrix_handler(
    State(state): State<AppState>,
    Json(payload): Json<PermissionMatrixRequest>,
) -> ApiResult<Json<Vec<PermissionMatrixEntryResponse>>> {
    let capabilities = payload
        .capabilities
        .iter()
        .map(|value| Capability::parse(value.as_str()))
        .collect::<Result<Vec<_>, _>>()?;

    let matrix = state
        .permission_service
        .resolve_effective_permission_matrix(payload.user_id, &capabilities, Utc::now())
        .await?
        .into_iter()
        .map(PermissionMatrixEntryResponse::from)
        .collect();

    Ok(Json(matrix))
}
