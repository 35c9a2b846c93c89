use std::str::FromStr;

use async_trait::async_trait;
use orgperm_application::{DepartmentRepository, DepartmentTransaction};
use orgperm_core::{AppError, AppResult};
use orgperm_domain::{
    Department, DepartmentCode, DepartmentId, DepartmentPath, DepartmentStatus,
};
use sqlx::{FromRow, PgPool};
use tracing::warn;
use uuid::Uuid;

mod transaction;


use transaction::PostgresDepartmentTransaction;

/// PostgreSQL-backed department tree repository.
#[derive(Clone)]
pub struct PostgresDepartmentRepository {
    pool: PgPool,
}

impl PostgresDepartmentRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct DepartmentRow {
    id: Uuid,
    parent_id: Option<Uuid>,
    code: String,
    name: String,
    path: String,
    sort_order: i32,
    status: String,
    version: i64,
}

impl TryFrom<DepartmentRow> for Department {
    type Error = AppError;

    fn try_from(row: DepartmentRow) -> Result<Self, Self::Error> {
        let invalid = |error: AppError| {
            AppError::Internal(format!("persisted department '{}' is invalid: {error}", row.id))
        };

        Department::from_storage(
            DepartmentId::from_uuid(row.id),
            row.parent_id.map(DepartmentId::from_uuid),
            DepartmentCode::new(row.code.as_str()).map_err(invalid)?,
            row.name.as_str(),
            DepartmentPath::parse(row.path.as_str()).map_err(invalid)?,
            row.sort_order,
            DepartmentStatus::from_str(row.status.as_str()).map_err(invalid)?,
            row.version,
        )
        .map_err(invalid)
    }
}

fn departments_from_rows(rows: Vec<DepartmentRow>) -> AppResult<Vec<Department>> {
    rows.into_iter().map(Department::try_from).collect()
}

/// Maps lock and serialization failures to a retryable error.
fn map_write_error(error: sqlx::Error, scope: &str, context: &str) -> AppError {
    if let sqlx::Error::Database(database_error) = &error {
        match database_error.code().as_deref() {
            Some(code @ ("40001" | "40P01" | "55P03")) => {
                warn!(scope = %scope, code = %code, "department write lost a concurrent update race");
                return AppError::ConcurrentModification {
                    department_id: scope.to_owned(),
                };
            }
            Some("23505") => {
                return AppError::Conflict(format!(
                    "department path is already taken under '{scope}'"
                ));
            }
            _ => {}
        }
    }

    AppError::Internal(format!("{context}: {error}"))
}

#[async_trait]
impl DepartmentRepository for PostgresDepartmentRepository {
    async fn find_department(&self, department_id: DepartmentId) -> AppResult<Option<Department>> {
        let row = sqlx::query_as::<_, DepartmentRow>(
            r#"
            SELECT id, parent_id, code, name, path, sort_order, status, version
            FROM departments
            WHERE id = $1
            "#,
        )
        .bind(department_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to find department '{department_id}': {error}"
            ))
        })?;

        row.map(Department::try_from).transpose()
    }

    async fn list_departments_by_path_prefix(
        &self,
        prefix: &DepartmentPath,
    ) -> AppResult<Vec<Department>> {
        let rows = sqlx::query_as::<_, DepartmentRow>(
            r#"
            SELECT id, parent_id, code, name, path, sort_order, status, version
            FROM departments
            WHERE path = $1 OR starts_with(path, $1 || '.')
            "#,
        )
        .bind(prefix.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list departments under '{prefix}': {error}"
            ))
        })?;

        let mut departments = departments_from_rows(rows)?;
        departments.sort_by(|left, right| left.path().cmp(right.path()));
        Ok(departments)
    }

    async fn list_siblings(&self, parent_id: Option<DepartmentId>) -> AppResult<Vec<Department>> {
        let rows = sqlx::query_as::<_, DepartmentRow>(
            r#"
            SELECT id, parent_id, code, name, path, sort_order, status, version
            FROM departments
            WHERE parent_id IS NOT DISTINCT FROM $1
            ORDER BY sort_order, code COLLATE "C"
            "#,
        )
        .bind(parent_id.map(|value| value.as_uuid()))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list sibling departments: {error}"))
        })?;

        departments_from_rows(rows)
    }

    async fn list_departments(&self) -> AppResult<Vec<Department>> {
        let rows = sqlx::query_as::<_, DepartmentRow>(
            r#"
            SELECT id, parent_id, code, name, path, sort_order, status, version
            FROM departments
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list departments: {error}")))?;

        let mut departments = departments_from_rows(rows)?;
        departments.sort_by(|left, right| {
            left.path()
                .cmp(right.path())
                .then_with(|| left.sort_order().cmp(&right.sort_order()))
        });
        Ok(departments)
    }

    async fn create_department(&self, department: Department) -> AppResult<()> {
        let scope = department.id().to_string();
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to start department create transaction: {error}"
            ))
        })?;

        if let Some(parent_id) = department.parent_id() {
            let parent_status: Option<String> = sqlx::query_scalar(
                r#"
                UPDATE departments
                SET version = version + 1, updated_at = now()
                WHERE id = $1
                RETURNING status
                "#,
            )
            .bind(parent_id.as_uuid())
            .fetch_optional(&mut *transaction)
            .await
            .map_err(|error| map_write_error(error, &scope, "failed to lock parent department"))?;

            match parent_status.as_deref() {
                None => {
                    return Err(AppError::InvalidParent {
                        parent_id: parent_id.to_string(),
                        reason: "department does not exist".to_owned(),
                    });
                }
                Some("active") => {}
                Some(_) => {
                    return Err(AppError::InvalidParent {
                        parent_id: parent_id.to_string(),
                        reason: "department is disabled".to_owned(),
                    });
                }
            }
        }

        sqlx::query(
            r#"
            INSERT INTO departments (id, parent_id, code, name, path, sort_order, status, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(department.id().as_uuid())
        .bind(department.parent_id().map(|value| value.as_uuid()))
        .bind(department.code().as_str())
        .bind(department.name())
        .bind(department.path().to_string())
        .bind(department.sort_order())
        .bind(department.status().as_str())
        .bind(department.version())
        .execute(&mut *transaction)
        .await
        .map_err(|error| map_write_error(error, &scope, "failed to insert department"))?;

        transaction.commit().await.map_err(|error| {
            map_write_error(error, &scope, "failed to commit department create transaction")
        })?;

        Ok(())
    }

    async fn count_active_members(&self, department_id: DepartmentId) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM department_memberships
            WHERE department_id = $1 AND is_active
            "#,
        )
        .bind(department_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to count members of department '{department_id}': {error}"
            ))
        })?;

        u64::try_from(count)
            .map_err(|error| AppError::Internal(format!("invalid member count: {error}")))
    }

    async fn begin_subtree_transaction(
        &self,
        root_id: DepartmentId,
    ) -> AppResult<Box<dyn DepartmentTransaction>> {
        let transaction = PostgresDepartmentTransaction::begin_subtree(&self.pool, root_id).await?;
        Ok(Box::new(transaction))
    }

    async fn begin_sibling_transaction(
        &self,
        parent_id: Option<DepartmentId>,
    ) -> AppResult<Box<dyn DepartmentTransaction>> {
        let transaction =
            PostgresDepartmentTransaction::begin_siblings(&self.pool, parent_id).await?;
        Ok(Box::new(transaction))
    }
}
