use async_trait::async_trait;
use chrono::{DateTime, Utc};

use orgperm_core::AppResult;
use orgperm_domain::{PermissionTemplate, TemplateId, TemplateOperation, UserId};

/// Input payload for creating a permission template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTemplateInput {
    /// Unique template name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Capabilities in `resource:action` form.
    pub permissions: Vec<String>,
    /// Priority of grants produced by the template.
    pub priority: i32,
}

/// Usage statistics row appended after each template application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateUsage {
    /// Applied template.
    pub template_id: TemplateId,
    /// Operation mode.
    pub operation: TemplateOperation,
    /// Users in the batch.
    pub total_users: usize,
    /// Users that received the template.
    pub success_count: usize,
    /// Users that failed.
    pub failure_count: usize,
    /// Subject that applied the template.
    pub applied_by: String,
    /// Application timestamp.
    pub applied_at: DateTime<Utc>,
}

/// Outcome of applying a template to one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserApplicationOutcome {
    /// Grants were written.
    Applied {
        /// Direct grants inserted.
        grants_created: usize,
        /// Direct grants deactivated by `replace`.
        grants_deactivated: u64,
    },
    /// The user failed part way; the rest of the batch continued.
    ///
    /// Writes made before the failure are not undone, so the counts describe
    /// the user's state after the failure.
    Failed {
        /// Human-readable failure reason.
        reason: String,
        /// Direct grants inserted before the failure.
        grants_created: usize,
        /// Direct grants deactivated before the failure.
        grants_deactivated: u64,
    },
}

/// Per-user entry of an application result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserApplicationResult {
    /// Target user.
    pub user_id: UserId,
    /// What happened for this user.
    pub outcome: UserApplicationOutcome,
}

/// Summary of a template application batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationResult {
    /// Applied template.
    pub template_id: TemplateId,
    /// Applied template name.
    pub template_name: String,
    /// Operation mode.
    pub operation: TemplateOperation,
    /// Distinct users in the batch.
    pub total_users: usize,
    /// Users that received the template.
    pub success_count: usize,
    /// Users that failed.
    pub failure_count: usize,
    /// Per-user outcomes in request order.
    pub per_user_results: Vec<UserApplicationResult>,
}

/// Storage port for permission templates.
#[async_trait]
pub trait TemplateRepository: Send + Sync {
    /// Finds one template by id.
    async fn find_template(&self, template_id: TemplateId) -> AppResult<Option<PermissionTemplate>>;

    /// Lists templates ordered by name.
    async fn list_templates(&self) -> AppResult<Vec<PermissionTemplate>>;

    /// Inserts a template; a duplicate name is a conflict.
    async fn save_template(&self, template: PermissionTemplate) -> AppResult<()>;

    /// Replaces a stored template.
    async fn update_template(&self, template: PermissionTemplate) -> AppResult<()>;

    /// Deletes a template.
    async fn delete_template(&self, template_id: TemplateId) -> AppResult<()>;

    /// Appends a usage statistics row.
    async fn record_template_usage(&self, usage: TemplateUsage) -> AppResult<()>;
}
