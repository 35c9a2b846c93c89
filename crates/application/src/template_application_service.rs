use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use orgperm_core::{Actor, AppError, AppResult};
use orgperm_domain::{
    AuditAction, GrantId, GrantSource, PermissionGrant, PermissionTemplate, TemplateId,
    TemplateOperation, UserId,
};
use tracing::{info, warn};

use crate::{
    ApplicationResult, AuditEvent, AuditTrail, GrantChangeEntry, GrantChangeKind,
    PermissionRepository, TemplateRepository, TemplateUsage, UserApplicationOutcome,
    UserApplicationResult,
};

mod administration;


/// Application service applying permission templates to batches of users.
#[derive(Clone)]
pub struct TemplateApplicationService {
    templates: Arc<dyn TemplateRepository>,
    permissions: Arc<dyn PermissionRepository>,
    audit_trail: AuditTrail,
}

struct ApplicationRequest<'a> {
    actor: &'a Actor,
    template: &'a PermissionTemplate,
    operation: TemplateOperation,
    reason: Option<&'a str>,
    now: DateTime<Utc>,
}

/// Writes already made for one user.
#[derive(Debug, Default)]
struct UserProgress {
    grants_created: usize,
    grants_deactivated: u64,
}

impl UserProgress {
    fn describe_failure(&self, error: &AppError) -> String {
        if self.grants_created == 0 && self.grants_deactivated == 0 {
            return error.to_string();
        }

        format!(
            "{error} (after deactivating {} and creating {} direct grants)",
            self.grants_deactivated, self.grants_created
        )
    }
}

impl TemplateApplicationService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        templates: Arc<dyn TemplateRepository>,
        permissions: Arc<dyn PermissionRepository>,
        audit_trail: AuditTrail,
    ) -> Self {
        Self {
            templates,
            permissions,
            audit_trail,
        }
    }

    /// Applies a template to every listed user.
    ///
    /// Missing or inactive templates abort before any user is touched. Per-user
    /// failures are reported in the result and never stop the batch.
    pub async fn apply_template(
        &self,
        actor: &Actor,
        template_id: TemplateId,
        user_ids: &[UserId],
        operation: TemplateOperation,
        reason: Option<&str>,
    ) -> AppResult<ApplicationResult> {
        let template = self.require_template(template_id).await?;
        if !template.is_active() {
            return Err(AppError::TemplateInactive {
                template_id: template_id.to_string(),
            });
        }

        if user_ids.is_empty() {
            return Ok(ApplicationResult {
                template_id,
                template_name: template.name().to_owned(),
                operation,
                total_users: 0,
                success_count: 0,
                failure_count: 0,
                per_user_results: Vec::new(),
            });
        }

        let mut seen = HashSet::new();
        let targets: Vec<UserId> = user_ids
            .iter()
            .copied()
            .filter(|user_id| seen.insert(*user_id))
            .collect();

        let request = ApplicationRequest {
            actor,
            template: &template,
            operation,
            reason,
            now: Utc::now(),
        };

        let mut per_user_results = Vec::with_capacity(targets.len());
        for user_id in targets {
            let mut progress = UserProgress::default();
            let outcome = match self.apply_to_user(&request, user_id, &mut progress).await {
                Ok(()) => UserApplicationOutcome::Applied {
                    grants_created: progress.grants_created,
                    grants_deactivated: progress.grants_deactivated,
                },
                Err(error) => {
                    warn!(
                        template_id = %template_id,
                        user_id = %user_id,
                        grants_created = progress.grants_created,
                        grants_deactivated = progress.grants_deactivated,
                        error = %error,
                        "failed to apply permission template to user"
                    );
                    UserApplicationOutcome::Failed {
                        reason: progress.describe_failure(&error),
                        grants_created: progress.grants_created,
                        grants_deactivated: progress.grants_deactivated,
                    }
                }
            };
            per_user_results.push(UserApplicationResult { user_id, outcome });
        }

        let success_count = per_user_results
            .iter()
            .filter(|result| matches!(result.outcome, UserApplicationOutcome::Applied { .. }))
            .count();
        let result = ApplicationResult {
            template_id,
            template_name: template.name().to_owned(),
            operation,
            total_users: per_user_results.len(),
            success_count,
            failure_count: per_user_results.len() - success_count,
            per_user_results,
        };

        if let Err(error) = self
            .templates
            .record_template_usage(TemplateUsage {
                template_id,
                operation,
                total_users: result.total_users,
                success_count: result.success_count,
                failure_count: result.failure_count,
                applied_by: actor.subject().to_owned(),
                applied_at: request.now,
            })
            .await
        {
            warn!(
                template_id = %template_id,
                error = %error,
                "failed to record permission template usage"
            );
        }

        info!(
            template_id = %template_id,
            operation = operation.as_str(),
            total_users = result.total_users,
            success_count = result.success_count,
            failure_count = result.failure_count,
            "applied permission template"
        );

        self.audit_trail
            .record(AuditEvent {
                subject: actor.subject().to_owned(),
                action: AuditAction::TemplateApplied,
                resource_type: "permission_template".to_owned(),
                resource_id: template_id.to_string(),
                detail: Some(format!(
                    "applied template '{}' ({}) to {} users: {} succeeded, {} failed",
                    template.name(),
                    operation.as_str(),
                    result.total_users,
                    result.success_count,
                    result.failure_count
                )),
            })
            .await;

        Ok(result)
    }

    async fn require_template(&self, template_id: TemplateId) -> AppResult<PermissionTemplate> {
        self.templates
            .find_template(template_id)
            .await?
            .ok_or_else(|| AppError::TemplateNotFound {
                template_id: template_id.to_string(),
            })
    }

    /// Replace-then-insert for one user; the sequence is strictly ordered.
    async fn apply_to_user(
        &self,
        request: &ApplicationRequest<'_>,
        user_id: UserId,
        progress: &mut UserProgress,
    ) -> AppResult<()> {
        if !self.permissions.user_exists(user_id).await? {
            return Err(AppError::NotFound(format!("user '{user_id}' was not found")));
        }

        if request.operation == TemplateOperation::Replace {
            let grants_deactivated = self.permissions.deactivate_direct_grants(user_id).await?;
            progress.grants_deactivated = grants_deactivated;
            self.record_history(GrantChangeEntry {
                user_id,
                kind: GrantChangeKind::DirectGrantsDeactivated,
                grant_id: None,
                capability: None,
                affected_rows: grants_deactivated,
                template_id: Some(request.template.id()),
                reason: request.reason.map(str::to_owned),
                changed_by: request.actor.subject().to_owned(),
                changed_at: request.now,
            })
            .await;
        }

        for capability in request.template.permissions() {
            let grant_id = self
                .permissions
                .insert_grant(PermissionGrant {
                    grant_id: GrantId::new(),
                    source: GrantSource::Direct(user_id),
                    capability: capability.clone(),
                    granted: true,
                    priority: request.template.priority(),
                    conditions: None,
                    expires_at: None,
                    granted_at: request.now,
                    template_id: Some(request.template.id()),
                })
                .await?;
            progress.grants_created += 1;

            self.record_history(GrantChangeEntry {
                user_id,
                kind: GrantChangeKind::Granted,
                grant_id: Some(grant_id),
                capability: Some(capability.clone()),
                affected_rows: 1,
                template_id: Some(request.template.id()),
                reason: request.reason.map(str::to_owned),
                changed_by: request.actor.subject().to_owned(),
                changed_at: request.now,
            })
            .await;
        }

        Ok(())
    }

    async fn record_history(&self, entry: GrantChangeEntry) {
        let user_id = entry.user_id;
        let kind = entry.kind;
        if let Err(error) = self.permissions.record_change_history(entry).await {
            warn!(
                user_id = %user_id,
                change = kind.as_str(),
                error = %error,
                "failed to record grant change history"
            );
        }
    }
}
