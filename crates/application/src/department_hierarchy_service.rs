use std::collections::BTreeMap;
use std::sync::Arc;

use orgperm_core::{AppError, AppResult};
use orgperm_domain::{Department, DepartmentId, DepartmentPath, path_codec};
use tracing::warn;

use crate::{AuditTrail, DepartmentRepository, DepartmentTransaction, DepartmentView};

mod lifecycle;
mod moves;
mod reorder;


/// Application service that keeps the department tree consistent.
///
/// Every structural change is validated against a snapshot first and then
/// written through one store transaction, so a rejected or failed change
/// leaves the tree untouched.
#[derive(Clone)]
pub struct DepartmentHierarchyService {
    repository: Arc<dyn DepartmentRepository>,
    audit_trail: AuditTrail,
}

impl DepartmentHierarchyService {
    /// Creates a new service from a repository implementation.
    #[must_use]
    pub fn new(repository: Arc<dyn DepartmentRepository>, audit_trail: AuditTrail) -> Self {
        Self {
            repository,
            audit_trail,
        }
    }

    /// Returns departments under `root_id` (or the whole forest) ordered by path.
    pub async fn department_tree(
        &self,
        root_id: Option<DepartmentId>,
    ) -> AppResult<Vec<Department>> {
        match root_id {
            Some(root_id) => {
                let root = self.require_department(root_id).await?;
                self.repository
                    .list_departments_by_path_prefix(root.path())
                    .await
            }
            None => self.repository.list_departments().await,
        }
    }

    /// Returns a department with its parent and children.
    pub async fn department_view(&self, department_id: DepartmentId) -> AppResult<DepartmentView> {
        let department = self.require_department(department_id).await?;
        let parent = match department.parent_id() {
            Some(parent_id) => self.repository.find_department(parent_id).await?,
            None => None,
        };
        let children = self.repository.list_siblings(Some(department_id)).await?;

        Ok(DepartmentView {
            department,
            parent,
            children,
        })
    }

    async fn require_department(&self, department_id: DepartmentId) -> AppResult<Department> {
        self.repository
            .find_department(department_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("department '{department_id}' was not found")))
    }

    /// Rejects a sibling code collision at the destination.
    fn ensure_code_free(
        siblings: &[Department],
        moving_id: DepartmentId,
        candidate: &Department,
    ) -> AppResult<()> {
        if let Some(existing) = siblings
            .iter()
            .find(|sibling| sibling.id() != moving_id && sibling.code() == candidate.code())
        {
            return Err(AppError::Conflict(format!(
                "department code '{}' is already used by sibling '{}'",
                candidate.code(),
                existing.id()
            )));
        }

        Ok(())
    }
}

/// Computes the relocated copy of every node in `subtree`.
///
/// `subtree` must contain `root` and its descendants. Each descendant keeps its
/// suffix relative to `root`; the level check covers the deepest node.
fn plan_subtree_relocation(
    subtree: &[Department],
    root: &Department,
    new_parent_id: Option<DepartmentId>,
    new_root_path: &DepartmentPath,
) -> AppResult<BTreeMap<DepartmentId, Department>> {
    let mut planned = BTreeMap::new();

    for node in subtree {
        let new_path = path_codec::rebase(node.path(), root.path(), new_root_path).ok_or_else(|| {
            AppError::Internal(format!(
                "department '{}' at '{}' is not inside subtree '{}'",
                node.id(),
                node.path(),
                root.path()
            ))
        })?;
        let parent_id = if node.id() == root.id() {
            new_parent_id
        } else {
            node.parent_id()
        };

        planned.insert(node.id(), node.relocated(parent_id, new_path)?);
    }

    Ok(planned)
}

/// Converts a sibling index into a stored sort order.
fn sibling_sort_order(order: usize) -> AppResult<i32> {
    i32::try_from(order)
        .map_err(|_| AppError::Validation(format!("sibling position {order} is out of range")))
}

/// Stages `rows` and commits, rolling back on the first failed write.
async fn write_batch(
    mut transaction: Box<dyn DepartmentTransaction>,
    unchanged: &[Department],
    rows: Vec<Department>,
) -> AppResult<()> {
    let staged = stage_rows(transaction.as_mut(), unchanged, rows).await;
    if let Err(error) = staged {
        if let Err(rollback_error) = transaction.rollback().await {
            warn!(
                error = %rollback_error,
                "failed to roll back department transaction"
            );
        }
        return Err(error);
    }

    transaction.commit().await
}

async fn stage_rows(
    transaction: &mut dyn DepartmentTransaction,
    unchanged: &[Department],
    rows: Vec<Department>,
) -> AppResult<()> {
    for department in unchanged {
        transaction.assert_unchanged(department).await?;
    }
    for department in rows {
        transaction.write_department(department).await?;
    }
    Ok(())
}

/// Keeps only the rows that differ from their snapshot.
fn changed_rows(
    originals: &BTreeMap<DepartmentId, Department>,
    planned: BTreeMap<DepartmentId, Department>,
) -> Vec<Department> {
    planned
        .into_values()
        .filter(|department| originals.get(&department.id()) != Some(department))
        .collect()
}
