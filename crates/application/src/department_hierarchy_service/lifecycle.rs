use orgperm_core::{Actor, AppError, AppResult};
use orgperm_domain::{AuditAction, Department, DepartmentCode, DepartmentId, DepartmentStatus};
use tracing::info;

use crate::{AuditEvent, CreateDepartmentInput};

use super::{DepartmentHierarchyService, write_batch};

impl DepartmentHierarchyService {
    /// Creates a department under an active parent.
    pub async fn create_department(
        &self,
        actor: &Actor,
        input: CreateDepartmentInput,
    ) -> AppResult<Department> {
        let code = DepartmentCode::new(input.code)?;
        let parent = match input.parent_id {
            Some(parent_id) => {
                let parent = self.repository.find_department(parent_id).await?.ok_or_else(|| {
                    AppError::InvalidParent {
                        parent_id: parent_id.to_string(),
                        reason: "department does not exist".to_owned(),
                    }
                })?;
                if !parent.is_active() {
                    return Err(AppError::InvalidParent {
                        parent_id: parent_id.to_string(),
                        reason: "department is disabled".to_owned(),
                    });
                }
                Some(parent)
            }
            None => None,
        };

        let siblings = self.repository.list_siblings(input.parent_id).await?;
        let sort_order = match input.sort_order {
            Some(sort_order) => sort_order,
            None => siblings
                .iter()
                .map(Department::sort_order)
                .max()
                .map_or(0, |highest| highest.saturating_add(1)),
        };

        let department = Department::new(
            DepartmentId::new(),
            parent.as_ref(),
            code,
            input.name,
            sort_order,
        )?;
        Self::ensure_code_free(&siblings, department.id(), &department)?;

        self.repository.create_department(department.clone()).await?;

        info!(
            department_id = %department.id(),
            path = %department.path(),
            "created department"
        );

        self.audit_trail
            .record(AuditEvent {
                subject: actor.subject().to_owned(),
                action: AuditAction::DepartmentCreated,
                resource_type: "department".to_owned(),
                resource_id: department.id().to_string(),
                detail: Some(format!("created department '{}'", department.path())),
            })
            .await;

        Ok(department)
    }

    /// Soft-deletes a department that no longer has active members.
    pub async fn disable_department(
        &self,
        actor: &Actor,
        department_id: DepartmentId,
    ) -> AppResult<Department> {
        let department = self.require_department(department_id).await?;
        if !department.is_active() {
            return Ok(department);
        }

        let members = self.repository.count_active_members(department_id).await?;
        if members > 0 {
            return Err(AppError::Conflict(format!(
                "department '{department_id}' still has {members} active members"
            )));
        }

        let disabled = department.with_status(DepartmentStatus::Disabled);
        let transaction = self
            .repository
            .begin_subtree_transaction(department_id)
            .await?;
        write_batch(transaction, &[], vec![disabled]).await?;

        info!(department_id = %department_id, "disabled department");

        self.audit_trail
            .record(AuditEvent {
                subject: actor.subject().to_owned(),
                action: AuditAction::DepartmentDisabled,
                resource_type: "department".to_owned(),
                resource_id: department_id.to_string(),
                detail: Some(format!("disabled department '{}'", department.path())),
            })
            .await;

        self.require_department(department_id).await
    }
}
