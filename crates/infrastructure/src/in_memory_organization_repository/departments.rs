use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use orgperm_application::{DepartmentRepository, DepartmentTransaction};
use orgperm_core::{AppError, AppResult};
use orgperm_domain::{Department, DepartmentId, DepartmentPath, path_codec};
use tokio::sync::{OwnedMutexGuard, RwLock};

use super::InMemoryOrganizationRepository;

type DepartmentTable = Arc<RwLock<HashMap<DepartmentId, Department>>>;

/// Write scope holding the repository's write gate until commit or drop.
struct InMemoryDepartmentTransaction {
    departments: DepartmentTable,
    _write_guard: OwnedMutexGuard<()>,
    expected: Vec<(DepartmentId, i64)>,
    staged: BTreeMap<DepartmentId, Department>,
}

fn check_version(
    departments: &HashMap<DepartmentId, Department>,
    department_id: DepartmentId,
    version: i64,
) -> AppResult<()> {
    match departments.get(&department_id) {
        Some(stored) if stored.version() == version => Ok(()),
        Some(_) => Err(AppError::ConcurrentModification {
            department_id: department_id.to_string(),
        }),
        None => Err(AppError::NotFound(format!(
            "department '{department_id}' was not found"
        ))),
    }
}

#[async_trait]
impl DepartmentTransaction for InMemoryDepartmentTransaction {
    async fn write_department(&mut self, department: Department) -> AppResult<()> {
        check_version(
            &*self.departments.read().await,
            department.id(),
            department.version(),
        )?;
        self.staged.insert(department.id(), department);
        Ok(())
    }

    async fn assert_unchanged(&mut self, department: &Department) -> AppResult<()> {
        check_version(
            &*self.departments.read().await,
            department.id(),
            department.version(),
        )?;
        self.expected.push((department.id(), department.version()));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let transaction = *self;
        let mut departments = transaction.departments.write().await;

        for (department_id, version) in &transaction.expected {
            check_version(&departments, *department_id, *version)?;
        }
        for department in transaction.staged.values() {
            check_version(&departments, department.id(), department.version())?;
        }

        let mut occupied: HashMap<&DepartmentPath, DepartmentId> = HashMap::new();
        for stored in departments.values() {
            let department = transaction.staged.get(&stored.id()).unwrap_or(stored);
            if let Some(other) = occupied.insert(department.path(), department.id()) {
                return Err(AppError::Conflict(format!(
                    "department path '{}' is used by both '{}' and '{}'",
                    department.path(),
                    other,
                    department.id()
                )));
            }
        }

        for (department_id, department) in transaction.staged {
            let next_version = department.version() + 1;
            departments.insert(department_id, department.with_version(next_version));
        }

        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        Ok(())
    }
}

impl InMemoryOrganizationRepository {
    async fn begin_transaction(&self) -> Box<dyn DepartmentTransaction> {
        let write_guard = self.write_gate.clone().lock_owned().await;
        Box::new(InMemoryDepartmentTransaction {
            departments: self.departments.clone(),
            _write_guard: write_guard,
            expected: Vec::new(),
            staged: BTreeMap::new(),
        })
    }
}

#[async_trait]
impl DepartmentRepository for InMemoryOrganizationRepository {
    async fn find_department(&self, department_id: DepartmentId) -> AppResult<Option<Department>> {
        Ok(self.departments.read().await.get(&department_id).cloned())
    }

    async fn list_departments_by_path_prefix(
        &self,
        prefix: &DepartmentPath,
    ) -> AppResult<Vec<Department>> {
        let mut values: Vec<Department> = self
            .departments
            .read()
            .await
            .values()
            .filter(|department| path_codec::is_descendant_or_self(department.path(), prefix))
            .cloned()
            .collect();
        values.sort_by(|left, right| left.path().cmp(right.path()));

        Ok(values)
    }

    async fn list_siblings(&self, parent_id: Option<DepartmentId>) -> AppResult<Vec<Department>> {
        let mut values: Vec<Department> = self
            .departments
            .read()
            .await
            .values()
            .filter(|department| department.parent_id() == parent_id)
            .cloned()
            .collect();
        values.sort_by(|left, right| {
            left.sort_order()
                .cmp(&right.sort_order())
                .then_with(|| left.code().cmp(right.code()))
        });

        Ok(values)
    }

    async fn list_departments(&self) -> AppResult<Vec<Department>> {
        let mut values: Vec<Department> =
            self.departments.read().await.values().cloned().collect();
        values.sort_by(|left, right| {
            left.path()
                .cmp(right.path())
                .then_with(|| left.sort_order().cmp(&right.sort_order()))
        });

        Ok(values)
    }

    async fn create_department(&self, department: Department) -> AppResult<()> {
        let _write_guard = self.write_gate.lock().await;
        let mut departments = self.departments.write().await;

        if departments
            .values()
            .any(|stored| stored.path() == department.path())
        {
            return Err(AppError::Conflict(format!(
                "department path '{}' already exists",
                department.path()
            )));
        }

        if let Some(parent_id) = department.parent_id() {
            let parent = departments.get(&parent_id).cloned().ok_or_else(|| {
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
            departments.insert(parent_id, parent.with_version(parent.version() + 1));
        }

        departments.insert(department.id(), department);
        Ok(())
    }

    async fn count_active_members(&self, department_id: DepartmentId) -> AppResult<u64> {
        let count = self
            .memberships
            .read()
            .await
            .iter()
            .filter(|((_, member_department_id), is_active)| {
                *member_department_id == department_id && **is_active
            })
            .count();

        u64::try_from(count)
            .map_err(|error| AppError::Internal(format!("member count overflow: {error}")))
    }

    async fn begin_subtree_transaction(
        &self,
        _root_id: DepartmentId,
    ) -> AppResult<Box<dyn DepartmentTransaction>> {
        Ok(self.begin_transaction().await)
    }

    async fn begin_sibling_transaction(
        &self,
        _parent_id: Option<DepartmentId>,
    ) -> AppResult<Box<dyn DepartmentTransaction>> {
        Ok(self.begin_transaction().await)
    }
}
