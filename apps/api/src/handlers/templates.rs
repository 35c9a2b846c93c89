use std::str::FromStr;

use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use orgperm_application::CreateTemplateInput;
use orgperm_core::Actor;
use orgperm_domain::{TemplateId, TemplateOperation};

use crate::dto::{
    ApplyTemplateRequest, CreateTemplateRequest, TemplateApplicationResponse, TemplateResponse,
    UpdateTemplateStatusRequest,
};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_templates_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<TemplateResponse>>> {
    let templates = state
        .template_service
        .list_templates()
        .await?
        .into_iter()
        .map(TemplateResponse::from)
        .collect();

    Ok(Json(templates))
}

pub async fn create_template_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<CreateTemplateRequest>,
) -> ApiResult<(StatusCode, Json<TemplateResponse>)> {
    let template = state
        .template_service
        .create_template(
            &actor,
            CreateTemplateInput {
                name: payload.name,
                description: payload.description,
                permissions: payload.permissions,
                priority: payload.priority,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(TemplateResponse::from(template))))
}

pub async fn update_template_status_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(template_id): Path<TemplateId>,
    Json(payload): Json<UpdateTemplateStatusRequest>,
) -> ApiResult<Json<TemplateResponse>> {
    let template = state
        .template_service
        .set_template_active(&actor, template_id, payload.is_active)
        .await?;

    Ok(Json(TemplateResponse::from(template)))
}

pub async fn delete_template_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(template_id): Path<TemplateId>,
) -> ApiResult<StatusCode> {
    state
        .template_service
        .delete_template(&actor, template_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn apply_template_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(template_id): Path<TemplateId>,
    Json(payload): Json<ApplyTemplateRequest>,
) -> ApiResult<Json<TemplateApplicationResponse>> {
    let operation = TemplateOperation::from_str(payload.operation.as_str())?;
    let result = state
        .template_service
        .apply_template(
            &actor,
            template_id,
            &payload.user_ids,
            operation,
            payload.reason.as_deref(),
        )
        .await?;

    Ok(Json(TemplateApplicationResponse::from(result)))
}
