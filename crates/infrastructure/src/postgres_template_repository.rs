use std::collections::BTreeSet;

use async_trait::async_trait;
use orgperm_application::{TemplateRepository, TemplateUsage};
use orgperm_core::{AppError, AppResult};
use orgperm_domain::{Capability, PermissionTemplate, TemplateId};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;


/// PostgreSQL-backed permission template repository.
#[derive(Clone)]
pub struct PostgresTemplateRepository {
    pool: PgPool,
}

impl PostgresTemplateRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct TemplateRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    permissions: Value,
    priority: i32,
    is_system: bool,
    is_active: bool,
}

impl TryFrom<TemplateRow> for PermissionTemplate {
    type Error = AppError;

    fn try_from(row: TemplateRow) -> Result<Self, Self::Error> {
        let values: Vec<String> = serde_json::from_value(row.permissions).map_err(|error| {
            AppError::Internal(format!(
                "persisted permissions of template '{}' are not a string array: {error}",
                row.id
            ))
        })?;
        let permissions = values
            .iter()
            .map(|value| Capability::parse(value))
            .collect::<AppResult<BTreeSet<Capability>>>()
            .map_err(|error| {
                AppError::Internal(format!(
                    "persisted template '{}' has an invalid capability: {error}",
                    row.id
                ))
            })?;

        PermissionTemplate::from_storage(
            TemplateId::from_uuid(row.id),
            row.name,
            row.description,
            permissions,
            row.priority,
            row.is_system,
            row.is_active,
        )
    }
}

fn permissions_json(template: &PermissionTemplate) -> Value {
    Value::Array(
        template
            .permissions()
            .iter()
            .map(|capability| Value::String(capability.to_string()))
            .collect(),
    )
}

fn map_template_conflict(error: sqlx::Error, template_name: &str) -> AppError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some("23505")
    {
        return AppError::Conflict(format!(
            "permission template '{template_name}' already exists"
        ));
    }

    AppError::Internal(format!("failed to save permission template: {error}"))
}

fn count_column(value: usize, column: &str) -> AppResult<i32> {
    i32::try_from(value)
        .map_err(|error| AppError::Internal(format!("template usage {column} overflow: {error}")))
}

#[async_trait]
impl TemplateRepository for PostgresTemplateRepository {
    async fn find_template(&self, template_id: TemplateId) -> AppResult<Option<PermissionTemplate>> {
        let row = sqlx::query_as::<_, TemplateRow>(
            r#"
            SELECT id, name, description, permissions, priority, is_system, is_active
            FROM permission_templates
            WHERE id = $1
            "#,
        )
        .bind(template_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to find permission template '{template_id}': {error}"
            ))
        })?;

        row.map(PermissionTemplate::try_from).transpose()
    }

    async fn list_templates(&self) -> AppResult<Vec<PermissionTemplate>> {
        let rows = sqlx::query_as::<_, TemplateRow>(
            r#"
            SELECT id, name, description, permissions, priority, is_system, is_active
            FROM permission_templates
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list permission templates: {error}"))
        })?;

        rows.into_iter().map(PermissionTemplate::try_from).collect()
    }

    async fn save_template(&self, template: PermissionTemplate) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO permission_templates (
                id,
                name,
                description,
                permissions,
                priority,
                is_system,
                is_active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(template.id().as_uuid())
        .bind(template.name())
        .bind(template.description())
        .bind(permissions_json(&template))
        .bind(template.priority())
        .bind(template.is_system())
        .bind(template.is_active())
        .execute(&self.pool)
        .await
        .map_err(|error| map_template_conflict(error, template.name()))?;

        Ok(())
    }

    async fn update_template(&self, template: PermissionTemplate) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE permission_templates
            SET name = $2,
                description = $3,
                permissions = $4,
                priority = $5,
                is_active = $6,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(template.id().as_uuid())
        .bind(template.name())
        .bind(template.description())
        .bind(permissions_json(&template))
        .bind(template.priority())
        .bind(template.is_active())
        .execute(&self.pool)
        .await
        .map_err(|error| map_template_conflict(error, template.name()))?;

        if result.rows_affected() == 0 {
            return Err(AppError::TemplateNotFound {
                template_id: template.id().to_string(),
            });
        }

        Ok(())
    }

    async fn delete_template(&self, template_id: TemplateId) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            DELETE FROM permission_templates
            WHERE id = $1
            "#,
        )
        .bind(template_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to delete permission template '{template_id}': {error}"
            ))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::TemplateNotFound {
                template_id: template_id.to_string(),
            });
        }

        Ok(())
    }

    async fn record_template_usage(&self, usage: TemplateUsage) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO permission_template_usage (
                template_id,
                operation,
                total_users,
                success_count,
                failure_count,
                applied_by,
                applied_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(usage.template_id.as_uuid())
        .bind(usage.operation.as_str())
        .bind(count_column(usage.total_users, "total_users")?)
        .bind(count_column(usage.success_count, "success_count")?)
        .bind(count_column(usage.failure_count, "failure_count")?)
        .bind(usage.applied_by.as_str())
        .bind(usage.applied_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to record usage of template '{}': {error}",
                usage.template_id
            ))
        })?;

        Ok(())
    }
}
