use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orgperm_application::{GrantChangeEntry, GrantQuery, PermissionRepository};
use orgperm_core::{AppError, AppResult};
use orgperm_domain::{
    Capability, DepartmentId, GrantId, GrantSource, GrantSourceType, PermissionGrant, TemplateId,
    UserId,
};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[cfg(test)]
mod tests;

/// PostgreSQL-backed grant, membership and grant history repository.
#[derive(Clone)]
pub struct PostgresPermissionRepository {
    pool: PgPool,
}

impl PostgresPermissionRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_grants(
        &self,
        sql: &str,
        source_id: Uuid,
        query: GrantQuery<'_>,
        context: &str,
    ) -> AppResult<Vec<PermissionGrant>> {
        let rows = sqlx::query_as::<_, GrantRow>(sql)
            .bind(source_id)
            .bind(query.resource)
            .bind(query.action)
            .fetch_all(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to list {context}: {error}")))?;

        rows.into_iter().map(PermissionGrant::try_from).collect()
    }
}

#[derive(Debug, FromRow)]
struct GrantRow {
    id: Uuid,
    source_type: String,
    source_id: Uuid,
    resource: String,
    action: String,
    granted: bool,
    priority: i32,
    conditions: Option<Value>,
    expires_at: Option<DateTime<Utc>>,
    granted_at: DateTime<Utc>,
    template_id: Option<Uuid>,
}

impl TryFrom<GrantRow> for PermissionGrant {
    type Error = AppError;

    fn try_from(row: GrantRow) -> Result<Self, Self::Error> {
        let invalid = |error: AppError| {
            AppError::Internal(format!("persisted grant '{}' is invalid: {error}", row.id))
        };
        let source_type = GrantSourceType::from_str(row.source_type.as_str()).map_err(invalid)?;

        Ok(PermissionGrant {
            grant_id: GrantId::from_uuid(row.id),
            source: GrantSource::from_parts(source_type, row.source_id),
            capability: Capability::new(row.resource.as_str(), row.action.as_str())
                .map_err(invalid)?,
            granted: row.granted,
            priority: row.priority,
            conditions: row.conditions,
            expires_at: row.expires_at,
            granted_at: row.granted_at,
            template_id: row.template_id.map(TemplateId::from_uuid),
        })
    }
}

const GRANT_COLUMNS: &str = "g.id, g.source_type, g.source_id, g.resource, g.action, g.granted, \
     g.priority, g.conditions, g.expires_at, g.granted_at, g.template_id";

fn filtered_grants_sql(from_clause: &str, source_filter: &str) -> String {
    format!(
        "SELECT {GRANT_COLUMNS} FROM {from_clause} \
         WHERE {source_filter} AND g.is_active \
         AND ($2::TEXT IS NULL OR g.resource = $2) \
         AND ($3::TEXT IS NULL OR g.action = $3)"
    )
}

#[async_trait]
impl PermissionRepository for PostgresPermissionRepository {
    async fn list_direct_grants(
        &self,
        user_id: UserId,
        query: GrantQuery<'_>,
    ) -> AppResult<Vec<PermissionGrant>> {
        let sql = filtered_grants_sql(
            "permission_grants g",
            "g.source_type = 'direct' AND g.source_id = $1",
        );
        self.fetch_grants(&sql, user_id.as_uuid(), query, "direct grants")
            .await
    }

    async fn list_active_department_ids(&self, user_id: UserId) -> AppResult<Vec<DepartmentId>> {
        let department_ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT department_id
            FROM department_memberships
            WHERE user_id = $1 AND is_active
            ORDER BY department_id
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list department memberships for user '{user_id}': {error}"
            ))
        })?;

        Ok(department_ids
            .into_iter()
            .map(DepartmentId::from_uuid)
            .collect())
    }

    async fn list_department_grants(
        &self,
        department_ids: &[DepartmentId],
        query: GrantQuery<'_>,
    ) -> AppResult<Vec<PermissionGrant>> {
        if department_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = filtered_grants_sql(
            "permission_grants g",
            "g.source_type = 'department' AND g.source_id = ANY($1)",
        );
        let ids: Vec<Uuid> = department_ids.iter().map(|id| id.as_uuid()).collect();
        let rows = sqlx::query_as::<_, GrantRow>(&sql)
            .bind(ids)
            .bind(query.resource)
            .bind(query.action)
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to list department grants: {error}"))
            })?;

        rows.into_iter().map(PermissionGrant::try_from).collect()
    }

    async fn list_role_grants(
        &self,
        user_id: UserId,
        query: GrantQuery<'_>,
    ) -> AppResult<Vec<PermissionGrant>> {
        let sql = filtered_grants_sql(
            "permission_grants g JOIN role_members m ON m.role_id = g.source_id",
            "g.source_type = 'role' AND m.user_id = $1",
        );
        self.fetch_grants(&sql, user_id.as_uuid(), query, "role grants")
            .await
    }

    async fn list_group_grants(
        &self,
        user_id: UserId,
        query: GrantQuery<'_>,
    ) -> AppResult<Vec<PermissionGrant>> {
        let sql = filtered_grants_sql(
            "permission_grants g JOIN group_members m ON m.group_id = g.source_id",
            "g.source_type = 'group' AND m.user_id = $1",
        );
        self.fetch_grants(&sql, user_id.as_uuid(), query, "group grants")
            .await
    }

    async fn user_exists(&self, user_id: UserId) -> AppResult<bool> {
        sqlx::query_scalar(
            r#"
            SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to look up user '{user_id}': {error}"))
        })
    }

    async fn insert_grant(&self, grant: PermissionGrant) -> AppResult<GrantId> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO permission_grants (
                id,
                source_type,
                source_id,
                resource,
                action,
                granted,
                priority,
                conditions,
                expires_at,
                granted_at,
                template_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
            "#,
        )
        .bind(grant.grant_id.as_uuid())
        .bind(grant.source.source_type().as_str())
        .bind(grant.source.source_id())
        .bind(grant.capability.resource())
        .bind(grant.capability.action())
        .bind(grant.granted)
        .bind(grant.priority)
        .bind(grant.conditions)
        .bind(grant.expires_at)
        .bind(grant.granted_at)
        .bind(grant.template_id.map(|value| value.as_uuid()))
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to insert grant '{}': {error}",
                grant.capability
            ))
        })?;

        Ok(GrantId::from_uuid(id))
    }

    async fn deactivate_direct_grants(&self, user_id: UserId) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE permission_grants
            SET is_active = false
            WHERE source_type = 'direct' AND source_id = $1 AND is_active
            "#,
        )
        .bind(user_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to deactivate direct grants for user '{user_id}': {error}"
            ))
        })?;

        Ok(result.rows_affected())
    }

    async fn record_change_history(&self, entry: GrantChangeEntry) -> AppResult<()> {
        let affected_rows = i64::try_from(entry.affected_rows).map_err(|error| {
            AppError::Internal(format!("grant history row count overflow: {error}"))
        })?;

        sqlx::query(
            r#"
            INSERT INTO permission_grant_history (
                user_id,
                change_kind,
                grant_id,
                resource,
                action,
                affected_rows,
                template_id,
                reason,
                changed_by,
                changed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(entry.user_id.as_uuid())
        .bind(entry.kind.as_str())
        .bind(entry.grant_id.map(|value| value.as_uuid()))
        .bind(entry.capability.as_ref().map(Capability::resource))
        .bind(entry.capability.as_ref().map(Capability::action))
        .bind(affected_rows)
        .bind(entry.template_id.map(|value| value.as_uuid()))
        .bind(entry.reason)
        .bind(entry.changed_by)
        .bind(entry.changed_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to record grant history for user '{}': {error}",
                entry.user_id
            ))
        })?;

        Ok(())
    }
}
