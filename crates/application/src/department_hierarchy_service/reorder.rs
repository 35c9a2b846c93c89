use std::collections::{BTreeMap, HashSet};

use orgperm_core::{Actor, AppError, AppResult};
use orgperm_domain::{AuditAction, Department, DepartmentId};
use tracing::info;

use crate::AuditEvent;

use super::{DepartmentHierarchyService, changed_rows, sibling_sort_order, write_batch};

impl DepartmentHierarchyService {
    /// Assigns sequential sort orders to the children of `parent_id`.
    ///
    /// Listed departments come first in the given order; children missing from
    /// the list keep their relative order after them.
    pub async fn reorder_siblings(
        &self,
        actor: &Actor,
        parent_id: Option<DepartmentId>,
        ordered_department_ids: &[DepartmentId],
    ) -> AppResult<()> {
        if let Some(parent_id) = parent_id {
            self.require_department(parent_id).await?;
        }

        let siblings = self.repository.list_siblings(parent_id).await?;
        let by_id: BTreeMap<DepartmentId, Department> = siblings
            .iter()
            .map(|sibling| (sibling.id(), sibling.clone()))
            .collect();

        let mut seen = HashSet::new();
        for department_id in ordered_department_ids {
            if !by_id.contains_key(department_id) {
                return Err(AppError::InvalidSiblingSet {
                    parent_id: parent_id
                        .map(|value| value.to_string())
                        .unwrap_or_else(|| "root".to_owned()),
                    department_id: department_id.to_string(),
                });
            }
            if !seen.insert(*department_id) {
                return Err(AppError::Validation(format!(
                    "department '{department_id}' appears more than once in the requested order"
                )));
            }
        }

        let remaining = siblings
            .iter()
            .filter(|sibling| !seen.contains(&sibling.id()))
            .map(Department::id);
        let mut planned = BTreeMap::new();
        for (order, department_id) in ordered_department_ids
            .iter()
            .copied()
            .chain(remaining)
            .enumerate()
        {
            let sort_order = sibling_sort_order(order)?;
            if let Some(sibling) = by_id.get(&department_id) {
                planned.insert(department_id, sibling.with_sort_order(sort_order));
            }
        }

        let rows = changed_rows(&by_id, planned);
        if rows.is_empty() {
            return Ok(());
        }
        let changed = rows.len();

        let transaction = self.repository.begin_sibling_transaction(parent_id).await?;
        write_batch(transaction, &[], rows).await?;

        let scope = parent_id
            .map(|value| value.to_string())
            .unwrap_or_else(|| "root".to_owned());
        info!(parent_id = %scope, changed_rows = changed, "reordered sibling departments");

        self.audit_trail
            .record(AuditEvent {
                subject: actor.subject().to_owned(),
                action: AuditAction::DepartmentsReordered,
                resource_type: "department".to_owned(),
                resource_id: scope,
                detail: Some(format!("reordered {} sibling departments", siblings.len())),
            })
            .await;

        Ok(())
    }
}
