use orgperm_application::{ApplicationResult, UserApplicationOutcome, UserApplicationResult};
use orgperm_domain::{PermissionTemplate, UserId};
use serde::{Deserialize, Serialize};

/// Incoming payload for template creation.
#[derive(Debug, Deserialize)]
pub struct CreateTemplateRequest {
    pub name: String,
    pub description: Option<String>,
    pub permissions: Vec<String>,
    #[serde(default)]
    pub priority: i32,
}

/// Incoming payload for activating or deactivating a template.
#[derive(Debug, Deserialize)]
pub struct UpdateTemplateStatusRequest {
    pub is_active: bool,
}

/// Incoming payload for applying a template to users.
#[derive(Debug, Deserialize)]
pub struct ApplyTemplateRequest {
    pub user_ids: Vec<UserId>,
    pub operation: String,
    pub reason: Option<String>,
}

/// API representation of a permission template.
#[derive(Debug, Serialize)]
pub struct TemplateResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub permissions: Vec<String>,
    pub priority: i32,
    pub is_system: bool,
    pub is_active: bool,
}

/// Per-user outcome of a template application.
#[derive(Debug, Serialize)]
pub struct UserApplicationResponse {
    pub user_id: String,
    pub success: bool,
    pub grants_created: usize,
    pub grants_deactivated: u64,
    pub error: Option<String>,
}

/// API representation of a template application batch.
#[derive(Debug, Serialize)]
pub struct TemplateApplicationResponse {
    pub template_id: String,
    pub template_name: String,
    pub operation: &'static str,
    pub total_users: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub results: Vec<UserApplicationResponse>,
}

impl From<PermissionTemplate> for TemplateResponse {
    fn from(value: PermissionTemplate) -> Self {
        Self {
            id: value.id().to_string(),
            name: value.name().to_owned(),
            description: value.description().map(str::to_owned),
            permissions: value
                .permissions()
                .iter()
                .map(|capability| capability.to_string())
                .collect(),
            priority: value.priority(),
            is_system: value.is_system(),
            is_active: value.is_active(),
        }
    }
}

impl From<UserApplicationResult> for UserApplicationResponse {
    fn from(value: UserApplicationResult) -> Self {
        let user_id = value.user_id.to_string();
        match value.outcome {
            UserApplicationOutcome::Applied {
                grants_created,
                grants_deactivated,
            } => Self {
                user_id,
                success: true,
                grants_created,
                grants_deactivated,
                error: None,
            },
            UserApplicationOutcome::Failed {
                reason,
                grants_created,
                grants_deactivated,
            } => Self {
                user_id,
                success: false,
                grants_created,
                grants_deactivated,
                error: Some(reason),
            },
        }
    }
}

impl From<ApplicationResult> for TemplateApplicationResponse {
    fn from(value: ApplicationResult) -> Self {
        Self {
            template_id: value.template_id.to_string(),
            template_name: value.template_name,
            operation: value.operation.as_str(),
            total_users: value.total_users,
            success_count: value.success_count,
            failure_count: value.failure_count,
            results: value
                .per_user_results
                .into_iter()
                .map(UserApplicationResponse::from)
                .collect(),
        }
    }
}
