use async_trait::async_trait;
use orgperm_application::DepartmentTransaction;
use orgperm_core::{AppError, AppResult};
use orgperm_domain::{Department, DepartmentId};
use sqlx::{PgPool, Postgres, Transaction};

use super::map_write_error;

/// Write scope over a locked set of department rows.
///
/// Rows in scope are locked `FOR UPDATE` when the transaction starts; every
/// write is additionally conditional on the version the caller read.
pub(super) struct PostgresDepartmentTransaction {
    transaction: Transaction<'static, Postgres>,
    scope: String,
}

impl PostgresDepartmentTransaction {
    pub(super) async fn begin_subtree(pool: &PgPool, root_id: DepartmentId) -> AppResult<Self> {
        let scope = root_id.to_string();
        let mut transaction = begin(pool, &scope).await?;

        let root_path: Option<String> = sqlx::query_scalar(
            r#"
            SELECT path
            FROM departments
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(root_id.as_uuid())
        .fetch_optional(&mut *transaction)
        .await
        .map_err(|error| map_write_error(error, &scope, "failed to lock department"))?;

        let Some(root_path) = root_path else {
            return Err(AppError::NotFound(format!(
                "department '{root_id}' was not found"
            )));
        };

        sqlx::query(
            r#"
            SELECT id
            FROM departments
            WHERE starts_with(path, $1 || '.')
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(root_path)
        .execute(&mut *transaction)
        .await
        .map_err(|error| map_write_error(error, &scope, "failed to lock department subtree"))?;

        Ok(Self { transaction, scope })
    }

    pub(super) async fn begin_siblings(
        pool: &PgPool,
        parent_id: Option<DepartmentId>,
    ) -> AppResult<Self> {
        let scope = parent_id
            .map(|value| value.to_string())
            .unwrap_or_else(|| "root".to_owned());
        let mut transaction = begin(pool, &scope).await?;

        sqlx::query(
            r#"
            SELECT id
            FROM departments
            WHERE parent_id IS NOT DISTINCT FROM $1
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(parent_id.map(|value| value.as_uuid()))
        .execute(&mut *transaction)
        .await
        .map_err(|error| map_write_error(error, &scope, "failed to lock sibling departments"))?;

        Ok(Self { transaction, scope })
    }
}

async fn begin(pool: &PgPool, scope: &str) -> AppResult<Transaction<'static, Postgres>> {
    pool.begin().await.map_err(|error| {
        AppError::Internal(format!(
            "failed to start department transaction for '{scope}': {error}"
        ))
    })
}

#[async_trait]
impl DepartmentTransaction for PostgresDepartmentTransaction {
    async fn write_department(&mut self, department: Department) -> AppResult<()> {
        let department_id = department.id();
        let result = sqlx::query(
            r#"
            UPDATE departments
            SET parent_id = $2,
                code = $3,
                name = $4,
                path = $5,
                sort_order = $6,
                status = $7,
                version = version + 1,
                updated_at = now()
            WHERE id = $1 AND version = $8
            "#,
        )
        .bind(department_id.as_uuid())
        .bind(department.parent_id().map(|value| value.as_uuid()))
        .bind(department.code().as_str())
        .bind(department.name())
        .bind(department.path().to_string())
        .bind(department.sort_order())
        .bind(department.status().as_str())
        .bind(department.version())
        .execute(&mut *self.transaction)
        .await
        .map_err(|error| {
            map_write_error(
                error,
                &department_id.to_string(),
                "failed to write department",
            )
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::ConcurrentModification {
                department_id: department_id.to_string(),
            });
        }

        Ok(())
    }

    async fn assert_unchanged(&mut self, department: &Department) -> AppResult<()> {
        let department_id = department.id();
        let version: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT version
            FROM departments
            WHERE id = $1
            FOR SHARE
            "#,
        )
        .bind(department_id.as_uuid())
        .fetch_optional(&mut *self.transaction)
        .await
        .map_err(|error| {
            map_write_error(
                error,
                &department_id.to_string(),
                "failed to read department version",
            )
        })?;

        if version != Some(department.version()) {
            return Err(AppError::ConcurrentModification {
                department_id: department_id.to_string(),
            });
        }

        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let Self { transaction, scope } = *self;
        transaction.commit().await.map_err(|error| {
            map_write_error(error, &scope, "failed to commit department transaction")
        })
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        let Self { transaction, scope } = *self;
        transaction.rollback().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to roll back department transaction for '{scope}': {error}"
            ))
        })
    }
}
