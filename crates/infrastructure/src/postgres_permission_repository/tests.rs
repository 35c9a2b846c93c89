use chrono::{Duration, Utc};
use orgperm_application::{
    DepartmentRepository, GrantChangeEntry, GrantChangeKind, GrantQuery, PermissionRepository,
};
use orgperm_domain::{
    Capability, Department, DepartmentCode, DepartmentId, GrantId, GrantSource, PermissionGrant,
    RoleId, UserId,
};
use sqlx::PgPool;
use uuid::Uuid;

use super::PostgresPermissionRepository;
use crate::PostgresDepartmentRepository;
use crate::postgres_test_support::test_pool;

async fn insert_user(pool: &PgPool) -> UserId {
    let user_id = UserId::new();
    let insert = sqlx::query(
        r#"
        INSERT INTO users (id, display_name)
        VALUES ($1, $2)
        "#,
    )
    .bind(user_id.as_uuid())
    .bind("Test User")
    .execute(pool)
    .await;
    assert!(insert.is_ok());
    user_id
}

async fn insert_department(pool: &PgPool) -> DepartmentId {
    let code = format!("P{}", &Uuid::new_v4().simple().to_string()[..10]);
    let code = DepartmentCode::new(code).unwrap_or_else(|error| panic!("{error}"));
    let department = Department::new(DepartmentId::new(), None, code, "Grants", 0)
        .unwrap_or_else(|error| panic!("{error}"));
    let created = PostgresDepartmentRepository::new(pool.clone())
        .create_department(department.clone())
        .await;
    assert!(created.is_ok());
    department.id()
}

fn grant(source: GrantSource, capability: &str, granted: bool, priority: i32) -> PermissionGrant {
    PermissionGrant {
        grant_id: GrantId::new(),
        source,
        capability: Capability::parse(capability).unwrap_or_else(|error| panic!("{error}")),
        granted,
        priority,
        conditions: Some(serde_json::json!({ "ip_range": "10.0.0.0/8" })),
        expires_at: Some(Utc::now() + Duration::days(1)),
        granted_at: Utc::now(),
        template_id: None,
    }
}

#[tokio::test]
async fn grants_are_listed_per_source_with_filters() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresPermissionRepository::new(pool.clone());
    let user_id = insert_user(&pool).await;
    let department_id = insert_department(&pool).await;
    let role_id = RoleId::new();

    let memberships = sqlx::query(
        r#"
        INSERT INTO department_memberships (user_id, department_id, is_active)
        VALUES ($1, $2, true)
        "#,
    )
    .bind(user_id.as_uuid())
    .bind(department_id.as_uuid())
    .execute(&pool)
    .await;
    assert!(memberships.is_ok());

    let role = sqlx::query(
        r#"
        WITH role AS (INSERT INTO roles (id, name) VALUES ($1, $2) RETURNING id)
        INSERT INTO role_members (role_id, user_id) SELECT id, $3 FROM role
        "#,
    )
    .bind(role_id.as_uuid())
    .bind(format!("role-{role_id}"))
    .bind(user_id.as_uuid())
    .execute(&pool)
    .await;
    assert!(role.is_ok());

    let direct = grant(GrantSource::Direct(user_id), "exam:grade", true, 10);
    for candidate in [
        direct.clone(),
        grant(GrantSource::Direct(user_id), "exam:read", true, 10),
        grant(GrantSource::Department(department_id), "exam:grade", false, 50),
        grant(GrantSource::Role(role_id), "exam:grade", true, 30),
    ] {
        assert!(repository.insert_grant(candidate).await.is_ok());
    }

    let capability = Capability::parse("exam:grade").unwrap_or_else(|error| panic!("{error}"));
    let query = GrantQuery::for_capability(&capability);

    let listed = repository
        .list_direct_grants(user_id, query)
        .await
        .unwrap_or_default();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].grant_id, direct.grant_id);
    assert_eq!(listed[0].conditions, direct.conditions);

    let departments = repository
        .list_active_department_ids(user_id)
        .await
        .unwrap_or_default();
    assert_eq!(departments, vec![department_id]);
    let department_grants = repository
        .list_department_grants(&departments, query)
        .await
        .unwrap_or_default();
    assert_eq!(department_grants.len(), 1);
    assert!(!department_grants[0].granted);

    let role_grants = repository
        .list_role_grants(user_id, query)
        .await
        .unwrap_or_default();
    assert_eq!(role_grants.len(), 1);
    assert_eq!(role_grants[0].source, GrantSource::Role(role_id));
}

#[tokio::test]
async fn deactivation_hides_direct_grants_and_history_is_recorded() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresPermissionRepository::new(pool.clone());
    let user_id = insert_user(&pool).await;
    assert_eq!(repository.user_exists(user_id).await.ok(), Some(true));
    assert_eq!(repository.user_exists(UserId::new()).await.ok(), Some(false));

    assert!(
        repository
            .insert_grant(grant(GrantSource::Direct(user_id), "exam:grade", true, 10))
            .await
            .is_ok()
    );
    assert_eq!(repository.deactivate_direct_grants(user_id).await.ok(), Some(1));
    let remaining = repository
        .list_direct_grants(user_id, GrantQuery::default())
        .await
        .unwrap_or_default();
    assert!(remaining.is_empty());

    let recorded = repository
        .record_change_history(GrantChangeEntry {
            user_id,
            kind: GrantChangeKind::DirectGrantsDeactivated,
            grant_id: None,
            capability: None,
            affected_rows: 1,
            template_id: None,
            reason: Some("reset".to_owned()),
            changed_by: "admin".to_owned(),
            changed_at: Utc::now(),
        })
        .await;
    assert!(recorded.is_ok());

    let kinds: Result<Vec<String>, sqlx::Error> = sqlx::query_scalar(
        r#"
        SELECT change_kind
        FROM permission_grant_history
        WHERE user_id = $1
        "#,
    )
    .bind(user_id.as_uuid())
    .fetch_all(&pool)
    .await;
    assert_eq!(
        kinds.unwrap_or_default(),
        vec!["direct_grants_deactivated".to_owned()]
    );
}
