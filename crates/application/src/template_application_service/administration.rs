use std::collections::BTreeSet;

use orgperm_core::{Actor, AppError, AppResult};
use orgperm_domain::{AuditAction, Capability, PermissionTemplate, TemplateId};

use crate::{AuditEvent, CreateTemplateInput};

use super::TemplateApplicationService;

impl TemplateApplicationService {
    /// Lists all templates.
    pub async fn list_templates(&self) -> AppResult<Vec<PermissionTemplate>> {
        self.templates.list_templates().await
    }

    /// Creates a custom (non-system) template.
    pub async fn create_template(
        &self,
        actor: &Actor,
        input: CreateTemplateInput,
    ) -> AppResult<PermissionTemplate> {
        let permissions = input
            .permissions
            .iter()
            .map(|value| Capability::parse(value))
            .collect::<AppResult<BTreeSet<_>>>()?;
        let template = PermissionTemplate::new(
            TemplateId::new(),
            input.name.trim(),
            input.description,
            permissions,
            input.priority,
            false,
        )?;

        self.templates.save_template(template.clone()).await?;

        self.audit_trail
            .record(AuditEvent {
                subject: actor.subject().to_owned(),
                action: AuditAction::TemplateCreated,
                resource_type: "permission_template".to_owned(),
                resource_id: template.id().to_string(),
                detail: Some(format!(
                    "created template '{}' with {} capabilities",
                    template.name(),
                    template.permissions().len()
                )),
            })
            .await;

        Ok(template)
    }

    /// Activates or deactivates a custom template.
    pub async fn set_template_active(
        &self,
        actor: &Actor,
        template_id: TemplateId,
        is_active: bool,
    ) -> AppResult<PermissionTemplate> {
        let template = self.require_template(template_id).await?;
        let updated = template.with_active(is_active)?;
        self.templates.update_template(updated.clone()).await?;

        self.audit_trail
            .record(AuditEvent {
                subject: actor.subject().to_owned(),
                action: AuditAction::TemplateStatusChanged,
                resource_type: "permission_template".to_owned(),
                resource_id: template_id.to_string(),
                detail: Some(format!(
                    "set template '{}' active={is_active}",
                    updated.name()
                )),
            })
            .await;

        Ok(updated)
    }

    /// Deletes a custom template; system templates cannot be deleted.
    pub async fn delete_template(&self, actor: &Actor, template_id: TemplateId) -> AppResult<()> {
        let template = self.require_template(template_id).await?;
        if template.is_system() {
            return Err(AppError::Conflict(format!(
                "system template '{}' cannot be deleted",
                template.name()
            )));
        }

        self.templates.delete_template(template_id).await?;

        self.audit_trail
            .record(AuditEvent {
                subject: actor.subject().to_owned(),
                action: AuditAction::TemplateDeleted,
                resource_type: "permission_template".to_owned(),
                resource_id: template_id.to_string(),
                detail: Some(format!("deleted template '{}'", template.name())),
            })
            .await;

        Ok(())
    }
}
