use async_trait::async_trait;

use orgperm_core::AppResult;
use orgperm_domain::{Department, DepartmentId, DepartmentPath};

/// Input payload for creating a department.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateDepartmentInput {
    /// Parent department, `None` for a root.
    pub parent_id: Option<DepartmentId>,
    /// Sibling-unique code.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Explicit sibling order; appended after the last sibling when omitted.
    pub sort_order: Option<i32>,
}

/// Department with its neighbourhood, returned after structural changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepartmentView {
    /// The department itself.
    pub department: Department,
    /// Its parent, when it has one.
    pub parent: Option<Department>,
    /// Its direct children ordered by sort order.
    pub children: Vec<Department>,
}

/// Storage port for department rows.
#[async_trait]
pub trait DepartmentRepository: Send + Sync {
    /// Finds one department by id.
    async fn find_department(&self, department_id: DepartmentId) -> AppResult<Option<Department>>;

    /// Lists the department at `prefix` and every department below it, ordered by path.
    async fn list_departments_by_path_prefix(
        &self,
        prefix: &DepartmentPath,
    ) -> AppResult<Vec<Department>>;

    /// Lists direct children of `parent_id` (roots for `None`) ordered by sort order.
    async fn list_siblings(&self, parent_id: Option<DepartmentId>) -> AppResult<Vec<Department>>;

    /// Lists every department ordered by path.
    async fn list_departments(&self) -> AppResult<Vec<Department>>;

    /// Inserts a new department; a duplicate sibling code is a conflict.
    ///
    /// The parent's version is bumped so that a concurrent subtree write over
    /// the parent notices the new child.
    async fn create_department(&self, department: Department) -> AppResult<()>;

    /// Counts active user memberships of a department.
    async fn count_active_members(&self, department_id: DepartmentId) -> AppResult<u64>;

    /// Opens a write scope covering the subtree rooted at `root_id`.
    async fn begin_subtree_transaction(
        &self,
        root_id: DepartmentId,
    ) -> AppResult<Box<dyn DepartmentTransaction>>;

    /// Opens a write scope covering the direct children of `parent_id`.
    async fn begin_sibling_transaction(
        &self,
        parent_id: Option<DepartmentId>,
    ) -> AppResult<Box<dyn DepartmentTransaction>>;
}

/// Atomic batch of department writes.
///
/// Each write is conditional on the version carried by the department value;
/// a mismatch fails with `AppError::ConcurrentModification`. Nothing is
/// observable until `commit` succeeds, and dropping the transaction without
/// committing discards every write.
#[async_trait]
pub trait DepartmentTransaction: Send {
    /// Stages one department row.
    async fn write_department(&mut self, department: Department) -> AppResult<()>;

    /// Fails the transaction unless the stored row still has the department's version.
    async fn assert_unchanged(&mut self, department: &Department) -> AppResult<()>;

    /// Makes every staged write visible at once.
    async fn commit(self: Box<Self>) -> AppResult<()>;

    /// Discards every staged write.
    async fn rollback(self: Box<Self>) -> AppResult<()>;
}
