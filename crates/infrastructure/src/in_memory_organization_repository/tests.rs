use std::sync::Arc;

use chrono::Utc;
use orgperm_application::{
    AuditTrail, CreateDepartmentInput, DepartmentHierarchyService, DepartmentRepository,
    GrantCollector, GrantQuery, PermissionRepository, PermissionResolutionService,
};
use orgperm_core::{Actor, AppError};
use orgperm_domain::{
    Capability, Department, DepartmentCode, DepartmentId, DepartmentStatus, GrantId, GrantSource,
    GroupId, PermissionGrant, RoleId, UserId,
};

use super::InMemoryOrganizationRepository;

fn code(value: &str) -> DepartmentCode {
    DepartmentCode::new(value).unwrap_or_else(|error| panic!("{error}"))
}

fn department(parent: Option<&Department>, value: &str) -> Department {
    Department::new(DepartmentId::new(), parent, code(value), value, 0)
        .unwrap_or_else(|error| panic!("{error}"))
}

fn grant(source: GrantSource, capability: &str, granted: bool, priority: i32) -> PermissionGrant {
    PermissionGrant {
        grant_id: GrantId::new(),
        source,
        capability: Capability::parse(capability).unwrap_or_else(|error| panic!("{error}")),
        granted,
        priority,
        conditions: None,
        expires_at: None,
        granted_at: Utc::now(),
        template_id: None,
    }
}

async fn stored(repository: &InMemoryOrganizationRepository, department: &Department) -> Department {
    repository
        .find_department(department.id())
        .await
        .ok()
        .flatten()
        .unwrap_or_else(|| panic!("department '{}' missing", department.id()))
}

#[tokio::test]
async fn create_bumps_parent_version_and_rejects_duplicate_path() {
    let repository = InMemoryOrganizationRepository::new();
    let root = department(None, "A");
    assert!(repository.create_department(root.clone()).await.is_ok());

    let child = department(Some(&root), "B");
    assert!(repository.create_department(child.clone()).await.is_ok());
    assert_eq!(stored(&repository, &root).await.version(), root.version() + 1);

    let twin = department(Some(&root), "B");
    let duplicate = repository.create_department(twin).await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn create_rechecks_parent_status_under_the_write_gate() {
    let repository = InMemoryOrganizationRepository::new();
    let root = department(None, "A");
    assert!(repository.create_department(root.clone()).await.is_ok());
    let child = department(Some(&root), "B");

    let mut transaction = repository
        .begin_subtree_transaction(root.id())
        .await
        .unwrap_or_else(|error| panic!("{error}"));
    let disabled = transaction
        .write_department(root.with_status(DepartmentStatus::Disabled))
        .await;
    assert!(disabled.is_ok());
    assert!(transaction.commit().await.is_ok());

    let created = repository.create_department(child.clone()).await;
    assert!(matches!(created, Err(AppError::InvalidParent { .. })));
    assert!(repository.find_department(child.id()).await.ok().flatten().is_none());
}

#[tokio::test]
async fn staged_writes_are_invisible_until_commit() {
    let repository = InMemoryOrganizationRepository::new();
    let root = department(None, "A");
    assert!(repository.create_department(root.clone()).await.is_ok());

    let mut transaction = repository
        .begin_subtree_transaction(root.id())
        .await
        .unwrap_or_else(|error| panic!("{error}"));
    let write = transaction
        .write_department(root.with_sort_order(7))
        .await;
    assert!(write.is_ok());
    assert_eq!(stored(&repository, &root).await.sort_order(), 0);

    assert!(transaction.commit().await.is_ok());
    let committed = stored(&repository, &root).await;
    assert_eq!(committed.sort_order(), 7);
    assert_eq!(committed.version(), root.version() + 1);
}

#[tokio::test]
async fn dropped_transaction_discards_writes_and_releases_gate() {
    let repository = InMemoryOrganizationRepository::new();
    let root = department(None, "A");
    assert!(repository.create_department(root.clone()).await.is_ok());

    {
        let mut transaction = repository
            .begin_sibling_transaction(None)
            .await
            .unwrap_or_else(|error| panic!("{error}"));
        assert!(
            transaction
                .write_department(root.with_sort_order(3))
                .await
                .is_ok()
        );
        assert!(transaction.rollback().await.is_ok());
    }

    assert_eq!(stored(&repository, &root).await, root);
    assert!(
        repository
            .create_department(department(None, "B"))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn stale_version_is_a_concurrent_modification() {
    let repository = InMemoryOrganizationRepository::new();
    let root = department(None, "A");
    assert!(repository.create_department(root.clone()).await.is_ok());
    assert!(
        repository
            .create_department(department(Some(&root), "B"))
            .await
            .is_ok()
    );

    let mut transaction = repository
        .begin_subtree_transaction(root.id())
        .await
        .unwrap_or_else(|error| panic!("{error}"));
    let stale = transaction.assert_unchanged(&root).await;

    match stale {
        Err(error @ AppError::ConcurrentModification { .. }) => assert!(error.is_retryable()),
        other => panic!("expected concurrent modification, got {other:?}"),
    }
}

#[tokio::test]
async fn commit_rejects_colliding_paths() {
    let repository = InMemoryOrganizationRepository::new();
    let left = department(None, "L");
    let right = department(None, "R");
    assert!(repository.create_department(left.clone()).await.is_ok());
    assert!(repository.create_department(right.clone()).await.is_ok());

    let onto_right = left
        .relocated(None, right.path().clone())
        .unwrap_or_else(|error| panic!("{error}"));
    let mut transaction = repository
        .begin_sibling_transaction(None)
        .await
        .unwrap_or_else(|error| panic!("{error}"));
    assert!(transaction.write_department(onto_right).await.is_ok());

    let committed = transaction.commit().await;
    assert!(matches!(committed, Err(AppError::Conflict(_))));
    assert_eq!(stored(&repository, &left).await, left);
}

#[tokio::test]
async fn grant_listings_follow_sources_and_filters() {
    let repository = InMemoryOrganizationRepository::new();
    let user_id = UserId::new();
    let other_user = UserId::new();
    let department_id = DepartmentId::new();
    let role_id = RoleId::new();
    let group_id = GroupId::new();
    repository.add_role_member(role_id, user_id).await;
    repository.add_group_member(group_id, other_user).await;
    repository.set_membership(user_id, department_id, true).await;

    for candidate in [
        grant(GrantSource::Direct(user_id), "exam:grade", true, 10),
        grant(GrantSource::Direct(user_id), "exam:read", true, 10),
        grant(GrantSource::Direct(other_user), "exam:grade", true, 10),
        grant(GrantSource::Department(department_id), "exam:grade", false, 50),
        grant(GrantSource::Role(role_id), "exam:grade", true, 20),
        grant(GrantSource::Group(group_id), "exam:grade", true, 20),
    ] {
        assert!(repository.insert_grant(candidate).await.is_ok());
    }

    let capability = Capability::parse("exam:grade").unwrap_or_else(|error| panic!("{error}"));
    let query = GrantQuery::for_capability(&capability);

    let direct = repository
        .list_direct_grants(user_id, query)
        .await
        .unwrap_or_default();
    assert_eq!(direct.len(), 1);

    let all_direct = repository
        .list_direct_grants(user_id, GrantQuery::default())
        .await
        .unwrap_or_default();
    assert_eq!(all_direct.len(), 2);

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

    let roles = repository
        .list_role_grants(user_id, query)
        .await
        .unwrap_or_default();
    assert_eq!(roles.len(), 1);
    let groups = repository
        .list_group_grants(user_id, query)
        .await
        .unwrap_or_default();
    assert!(groups.is_empty());
}

#[tokio::test]
async fn deactivation_only_touches_active_direct_grants() {
    let repository = InMemoryOrganizationRepository::new();
    let user_id = UserId::new();
    let department_id = DepartmentId::new();
    for candidate in [
        grant(GrantSource::Direct(user_id), "exam:grade", true, 10),
        grant(GrantSource::Direct(user_id), "exam:read", true, 10),
        grant(GrantSource::Department(department_id), "exam:grade", true, 10),
    ] {
        assert!(repository.insert_grant(candidate).await.is_ok());
    }

    assert_eq!(repository.deactivate_direct_grants(user_id).await.ok(), Some(2));
    assert_eq!(repository.deactivate_direct_grants(user_id).await.ok(), Some(0));
    let remaining = repository
        .list_department_grants(&[department_id], GrantQuery::default())
        .await
        .unwrap_or_default();
    assert_eq!(remaining.len(), 1);
}

#[tokio::test]
async fn member_count_ignores_inactive_memberships() {
    let repository = InMemoryOrganizationRepository::new();
    let department_id = DepartmentId::new();
    repository.set_membership(UserId::new(), department_id, true).await;
    repository.set_membership(UserId::new(), department_id, false).await;

    assert_eq!(repository.count_active_members(department_id).await.ok(), Some(1));
}

#[tokio::test]
async fn racing_cross_moves_never_form_a_cycle() {
    let repository = Arc::new(InMemoryOrganizationRepository::new());
    let service = DepartmentHierarchyService::new(repository.clone(), AuditTrail::disabled());
    let actor = Actor::system();

    let mut roots = Vec::new();
    for value in ["X", "Y"] {
        let created = service
            .create_department(
                &actor,
                CreateDepartmentInput {
                    parent_id: None,
                    code: value.to_owned(),
                    name: value.to_owned(),
                    sort_order: None,
                },
            )
            .await
            .unwrap_or_else(|error| panic!("{error}"));
        roots.push(created.id());
    }
    let (x, y) = (roots[0], roots[1]);

    let (first, second) = tokio::join!(
        service.move_department(&actor, x, Some(y), None),
        service.move_department(&actor, y, Some(x), None),
    );

    assert!(first.is_ok() != second.is_ok());
    let failure = first.err().or(second.err());
    assert!(matches!(
        failure,
        Some(AppError::ConcurrentModification { .. } | AppError::CircularReference { .. })
    ));

    let departments = repository.list_departments().await.unwrap_or_default();
    assert_eq!(departments.iter().filter(|row| row.parent_id().is_none()).count(), 1);
}

#[tokio::test]
async fn department_grant_reaches_members_through_resolution() {
    let repository = Arc::new(InMemoryOrganizationRepository::new());
    let hierarchy = DepartmentHierarchyService::new(repository.clone(), AuditTrail::disabled());
    let resolution = PermissionResolutionService::new(GrantCollector::new(repository.clone()));
    let actor = Actor::system();
    let user_id = UserId::new();
    repository.add_user(user_id).await;

    let faculty = hierarchy
        .create_department(
            &actor,
            CreateDepartmentInput {
                parent_id: None,
                code: "FAC".to_owned(),
                name: "Faculty".to_owned(),
                sort_order: None,
            },
        )
        .await
        .unwrap_or_else(|error| panic!("{error}"));
    repository.set_membership(user_id, faculty.id(), true).await;
    assert!(
        repository
            .insert_grant(grant(GrantSource::Department(faculty.id()), "exam:grade", true, 50))
            .await
            .is_ok()
    );

    let allowed = resolution
        .check_permission(user_id, "exam", "grade")
        .await
        .unwrap_or_else(|error| panic!("{error}"));
    assert!(allowed.granted);
    assert_eq!(allowed.source, Some(GrantSource::Department(faculty.id())));

    assert!(
        repository
            .insert_grant(grant(GrantSource::Direct(user_id), "exam:grade", false, 80))
            .await
            .is_ok()
    );
    let denied = resolution
        .check_permission(user_id, "exam", "grade")
        .await
        .unwrap_or_else(|error| panic!("{error}"));
    assert!(!denied.granted);
    assert_eq!(denied.priority, 80);
    assert_eq!(denied.candidates_considered, 2);

    let disabled = hierarchy.disable_department(&actor, faculty.id()).await;
    assert!(matches!(disabled, Err(AppError::Conflict(_))));
}
