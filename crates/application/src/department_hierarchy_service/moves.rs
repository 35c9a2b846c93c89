use std::collections::BTreeMap;

use orgperm_core::{Actor, AppError, AppResult};
use orgperm_domain::{
    AuditAction, Department, DepartmentCode, DepartmentId, DepartmentStatus, path_codec,
};
use tracing::info;

use crate::{AuditEvent, DepartmentView};

use super::{
    DepartmentHierarchyService, changed_rows, plan_subtree_relocation, sibling_sort_order,
    write_batch,
};

impl DepartmentHierarchyService {
    /// Moves a department and its whole subtree under `new_parent_id`.
    ///
    /// The destination siblings are renumbered so the moved department lands
    /// at `desired_position`, or last when none is given. Siblings left behind
    /// at the old parent are renumbered to close the gap.
    pub async fn move_department(
        &self,
        actor: &Actor,
        department_id: DepartmentId,
        new_parent_id: Option<DepartmentId>,
        desired_position: Option<usize>,
    ) -> AppResult<DepartmentView> {
        let department = self.require_department(department_id).await?;

        if new_parent_id == Some(department_id) {
            return Err(AppError::CircularReference {
                department_id: department_id.to_string(),
                target_parent_id: department_id.to_string(),
            });
        }

        let new_parent = match new_parent_id {
            Some(parent_id) => Some(self.require_move_target(&department, parent_id).await?),
            None => None,
        };

        if new_parent_id == department.parent_id() && desired_position.is_none() {
            return self.department_view(department_id).await;
        }

        let new_path = path_codec::encode(new_parent.as_ref().map(Department::path), department.code());
        let subtree = self
            .repository
            .list_departments_by_path_prefix(department.path())
            .await?;
        let mut planned = plan_subtree_relocation(&subtree, &department, new_parent_id, &new_path)?;

        let destination_siblings = self.repository.list_siblings(new_parent_id).await?;
        if let Some(moved) = planned.get(&department_id) {
            Self::ensure_code_free(&destination_siblings, department_id, moved)?;
        }

        let mut originals: BTreeMap<DepartmentId, Department> = subtree
            .into_iter()
            .map(|node| (node.id(), node))
            .collect();

        let mut ordered: Vec<Department> = destination_siblings
            .into_iter()
            .filter(|sibling| sibling.id() != department_id)
            .collect();
        for sibling in &ordered {
            originals.insert(sibling.id(), sibling.clone());
        }

        let moved = planned.remove(&department_id).ok_or_else(|| {
            AppError::Internal(format!(
                "department '{department_id}' missing from its own subtree listing"
            ))
        })?;
        let index = desired_position.map_or(ordered.len(), |position| position.min(ordered.len()));
        ordered.insert(index, moved);

        for (order, sibling) in ordered.into_iter().enumerate() {
            planned.insert(sibling.id(), sibling.with_sort_order(sibling_sort_order(order)?));
        }

        if new_parent_id != department.parent_id() {
            let source_siblings = self.repository.list_siblings(department.parent_id()).await?;
            for (order, sibling) in source_siblings
                .into_iter()
                .filter(|sibling| sibling.id() != department_id)
                .enumerate()
            {
                planned.insert(sibling.id(), sibling.with_sort_order(sibling_sort_order(order)?));
                originals.insert(sibling.id(), sibling);
            }
        }

        let rewritten = planned
            .values()
            .filter(|node| originals.get(&node.id()).map(Department::path) != Some(node.path()))
            .count();
        let rows = changed_rows(&originals, planned);
        let unchanged: Vec<Department> = new_parent.iter().cloned().collect();

        let transaction = self
            .repository
            .begin_subtree_transaction(department_id)
            .await?;
        write_batch(transaction, &unchanged, rows).await?;

        info!(
            department_id = %department_id,
            from_path = %department.path(),
            to_path = %new_path,
            rewritten_rows = rewritten,
            "moved department subtree"
        );

        self.audit_trail
            .record(AuditEvent {
                subject: actor.subject().to_owned(),
                action: AuditAction::DepartmentMoved,
                resource_type: "department".to_owned(),
                resource_id: department_id.to_string(),
                detail: Some(format!(
                    "moved department from '{}' to '{}' ({rewritten} paths rewritten)",
                    department.path(),
                    new_path
                )),
            })
            .await;

        self.department_view(department_id).await
    }

    /// Changes a department's code and rewrites the paths of its subtree.
    pub async fn rename_department_code(
        &self,
        actor: &Actor,
        department_id: DepartmentId,
        new_code: &str,
    ) -> AppResult<DepartmentView> {
        let department = self.require_department(department_id).await?;
        let new_code = DepartmentCode::new(new_code)?;
        if department.code() == &new_code {
            return self.department_view(department_id).await;
        }

        let parent_path = department.path().parent();
        let new_path = path_codec::encode(parent_path.as_ref(), &new_code);
        let subtree = self
            .repository
            .list_departments_by_path_prefix(department.path())
            .await?;
        let planned =
            plan_subtree_relocation(&subtree, &department, department.parent_id(), &new_path)?;

        let siblings = self.repository.list_siblings(department.parent_id()).await?;
        if let Some(renamed) = planned.get(&department_id) {
            Self::ensure_code_free(&siblings, department_id, renamed)?;
        }

        let originals: BTreeMap<DepartmentId, Department> = subtree
            .into_iter()
            .map(|node| (node.id(), node))
            .collect();
        let rows = changed_rows(&originals, planned);
        let rewritten = rows.len();

        let transaction = self
            .repository
            .begin_subtree_transaction(department_id)
            .await?;
        write_batch(transaction, &[], rows).await?;

        info!(
            department_id = %department_id,
            from_path = %department.path(),
            to_path = %new_path,
            rewritten_rows = rewritten,
            "renamed department code"
        );

        self.audit_trail
            .record(AuditEvent {
                subject: actor.subject().to_owned(),
                action: AuditAction::DepartmentRenamed,
                resource_type: "department".to_owned(),
                resource_id: department_id.to_string(),
                detail: Some(format!(
                    "renamed department code from '{}' to '{}'",
                    department.code(),
                    new_code
                )),
            })
            .await;

        self.department_view(department_id).await
    }

    async fn require_move_target(
        &self,
        department: &Department,
        parent_id: DepartmentId,
    ) -> AppResult<Department> {
        let parent = self
            .repository
            .find_department(parent_id)
            .await?
            .ok_or_else(|| AppError::InvalidParent {
                parent_id: parent_id.to_string(),
                reason: "department does not exist".to_owned(),
            })?;

        if path_codec::is_descendant_or_self(parent.path(), department.path()) {
            return Err(AppError::CircularReference {
                department_id: department.id().to_string(),
                target_parent_id: parent_id.to_string(),
            });
        }

        if parent.status() == DepartmentStatus::Disabled {
            return Err(AppError::InvalidParent {
                parent_id: parent_id.to_string(),
                reason: "department is disabled".to_owned(),
            });
        }

        Ok(parent)
    }
}
