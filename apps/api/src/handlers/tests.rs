use std::sync::Arc;

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use orgperm_application::{
    AuditTrail, DepartmentHierarchyService, GrantCollector, PermissionResolutionService,
    TemplateApplicationService,
};
use orgperm_core::{Actor, AppError};
use orgperm_domain::{DepartmentId, TemplateId, UserId};
use orgperm_infrastructure::{
    InMemoryAuditRepository, InMemoryOrganizationRepository, InMemoryTemplateRepository,
};

use super::{departments, health, permissions, templates};
use crate::dto::{
    ApplyTemplateRequest, CheckPermissionQuery, CreateDepartmentRequest, CreateTemplateRequest,
    DepartmentResponse, DepartmentTreeQuery, MoveDepartmentRequest, PermissionMatrixRequest,
    ReorderDepartmentsRequest, UpdateTemplateStatusRequest,
};
use crate::state::AppState;

struct TestContext {
    state: AppState,
    organization: Arc<InMemoryOrganizationRepository>,
    audit: Arc<InMemoryAuditRepository>,
}

fn test_context() -> TestContext {
    let organization = Arc::new(InMemoryOrganizationRepository::new());
    let audit = Arc::new(InMemoryAuditRepository::new());
    let audit_trail = AuditTrail::new(audit.clone());

    let state = AppState {
        department_service: DepartmentHierarchyService::new(
            organization.clone(),
            audit_trail.clone(),
        ),
        permission_service: PermissionResolutionService::new(GrantCollector::new(
            organization.clone(),
        )),
        template_service: TemplateApplicationService::new(
            Arc::new(InMemoryTemplateRepository::new()),
            organization.clone(),
            audit_trail,
        ),
    };

    TestContext {
        state,
        organization,
        audit,
    }
}

fn actor() -> Actor {
    Actor::new("alice", Some("Alice".to_owned()))
}

async fn create_department(
    state: &AppState,
    parent_id: Option<DepartmentId>,
    code: &str,
) -> DepartmentResponse {
    let (status, Json(department)) = departments::create_department_handler(
        State(state.clone()),
        Extension(actor()),
        Json(CreateDepartmentRequest {
            parent_id,
            code: code.to_owned(),
            name: code.to_uppercase(),
            sort_order: None,
        }),
    )
    .await
    .unwrap_or_else(|error| panic!("create department failed: {:?}", error.0));

    assert_eq!(status, StatusCode::CREATED);
    department
}

fn department_id(response: &DepartmentResponse) -> DepartmentId {
    response
        .id
        .parse::<DepartmentId>()
        .unwrap_or_else(|error| panic!("invalid department id: {error}"))
}

#[tokio::test]
async fn health_reports_ok() {
    let Json(response) = health::health_handler().await;
    assert_eq!(response.status, "ok");
}

#[tokio::test]
async fn move_rewrites_paths_visible_in_tree_listing() {
    let context = test_context();
    let root = create_department(&context.state, None, "root").await;
    let sales = create_department(&context.state, Some(department_id(&root)), "sales").await;
    let east = create_department(&context.state, Some(department_id(&sales)), "east").await;
    let ops = create_department(&context.state, Some(department_id(&root)), "ops").await;

    let Json(view) = departments::move_department_handler(
        State(context.state.clone()),
        Extension(actor()),
        Path(department_id(&sales)),
        Json(MoveDepartmentRequest {
            new_parent_id: Some(department_id(&ops)),
            position: None,
        }),
    )
    .await
    .unwrap_or_else(|error| panic!("move failed: {:?}", error.0));

    assert_eq!(view.department.path, "root.ops.sales");
    assert_eq!(view.department.level, 3);
    assert_eq!(view.parent.map(|parent| parent.id), Some(ops.id.clone()));

    let Json(tree) = departments::list_departments_handler(
        State(context.state.clone()),
        Query(DepartmentTreeQuery {
            root_id: Some(department_id(&ops)),
        }),
    )
    .await
    .unwrap_or_else(|error| panic!("tree listing failed: {:?}", error.0));

    let Json(ops_view) = departments::department_view_handler(
        State(context.state.clone()),
        Path(department_id(&ops)),
    )
    .await
    .unwrap_or_else(|error| panic!("department view failed: {:?}", error.0));
    assert_eq!(ops_view.children.len(), 1);
    assert_eq!(ops_view.children[0].id, sales.id);

    let moved_child = tree
        .iter()
        .find(|department| department.id == east.id)
        .unwrap_or_else(|| panic!("moved child missing from subtree"));
    assert_eq!(moved_child.path, "root.ops.sales.east");
    assert_eq!(moved_child.level, 4);
    assert!(!context.audit.events().await.is_empty());
}

#[tokio::test]
async fn moving_into_own_descendant_is_rejected() {
    let context = test_context();
    let root = create_department(&context.state, None, "root").await;
    let child = create_department(&context.state, Some(department_id(&root)), "child").await;

    let result = departments::move_department_handler(
        State(context.state.clone()),
        Extension(actor()),
        Path(department_id(&root)),
        Json(MoveDepartmentRequest {
            new_parent_id: Some(department_id(&child)),
            position: None,
        }),
    )
    .await;

    assert!(matches!(
        result.map(|_| ()).map_err(|error| error.0),
        Err(AppError::CircularReference { .. })
    ));
}

#[tokio::test]
async fn reorder_with_duplicate_ids_is_rejected() {
    let context = test_context();
    let first = create_department(&context.state, None, "first").await;
    let _second = create_department(&context.state, None, "second").await;

    let result = departments::reorder_departments_handler(
        State(context.state.clone()),
        Extension(actor()),
        Json(ReorderDepartmentsRequest {
            parent_id: None,
            ordered_ids: vec![department_id(&first), department_id(&first)],
        }),
    )
    .await;

    assert!(matches!(
        result.map_err(|error| error.0),
        Err(AppError::Validation(_))
    ));
}

#[tokio::test]
async fn reorder_returns_no_content_and_renumbers_siblings() {
    let context = test_context();
    let first = create_department(&context.state, None, "first").await;
    let second = create_department(&context.state, None, "second").await;

    let status = departments::reorder_departments_handler(
        State(context.state.clone()),
        Extension(actor()),
        Json(ReorderDepartmentsRequest {
            parent_id: None,
            ordered_ids: vec![department_id(&second), department_id(&first)],
        }),
    )
    .await
    .unwrap_or_else(|error| panic!("reorder failed: {:?}", error.0));
    assert_eq!(status, StatusCode::NO_CONTENT);

    let Json(tree) = departments::list_departments_handler(
        State(context.state.clone()),
        Query(DepartmentTreeQuery::default()),
    )
    .await
    .unwrap_or_else(|error| panic!("tree listing failed: {:?}", error.0));

    let order_of = |id: &str| {
        tree.iter()
            .find(|department| department.id == id)
            .map(|department| department.sort_order)
    };
    assert_eq!(order_of(&second.id), Some(0));
    assert_eq!(order_of(&first.id), Some(1));
}

#[tokio::test]
async fn applied_template_grants_are_visible_to_permission_checks() {
    let context = test_context();
    let known_user = UserId::new();
    let unknown_user = UserId::new();
    context.organization.add_user(known_user).await;

    let (status, Json(template)) = templates::create_template_handler(
        State(context.state.clone()),
        Extension(actor()),
        Json(CreateTemplateRequest {
            name: "grader".to_owned(),
            description: Some("Exam grading".to_owned()),
            permissions: vec!["exam:grade".to_owned(), "exam:read".to_owned()],
            priority: 20,
        }),
    )
    .await
    .unwrap_or_else(|error| panic!("create template failed: {:?}", error.0));
    assert_eq!(status, StatusCode::CREATED);

    let template_id = template
        .id
        .parse::<TemplateId>()
        .unwrap_or_else(|error| panic!("invalid template id: {error}"));

    let Json(application) = templates::apply_template_handler(
        State(context.state.clone()),
        Extension(actor()),
        Path(template_id),
        Json(ApplyTemplateRequest {
            user_ids: vec![known_user, unknown_user],
            operation: "add".to_owned(),
            reason: Some("onboarding".to_owned()),
        }),
    )
    .await
    .unwrap_or_else(|error| panic!("apply template failed: {:?}", error.0));

    assert_eq!(application.total_users, 2);
    assert_eq!(application.success_count, 1);
    assert_eq!(application.failure_count, 1);
    assert!(application.results[0].success);
    assert_eq!(application.results[0].grants_created, 2);
    assert!(application.results[1].error.is_some());

    let Json(decision) = permissions::check_permission_handler(
        State(context.state.clone()),
        Query(CheckPermissionQuery {
            user_id: known_user,
            resource: "exam".to_owned(),
            action: "grade".to_owned(),
        }),
    )
    .await
    .unwrap_or_else(|error| panic!("permission check failed: {:?}", error.0));

    assert!(decision.granted);
    assert_eq!(decision.priority, 20);
    assert_eq!(
        decision.source.map(|source| source.source_type),
        Some("direct")
    );

    let Json(matrix) = permissions::permission_matrix_handler(
        State(context.state.clone()),
        Json(PermissionMatrixRequest {
            user_id: known_user,
            capabilities: vec!["exam:read".to_owned(), "exam:delete".to_owned()],
        }),
    )
    .await
    .unwrap_or_else(|error| panic!("matrix failed: {:?}", error.0));

    assert_eq!(matrix.len(), 2);
    let delete_entry = matrix
        .iter()
        .find(|entry| entry.capability == "exam:delete")
        .unwrap_or_else(|| panic!("missing exam:delete entry"));
    assert!(!delete_entry.decision.granted);
}

#[tokio::test]
async fn unknown_operation_is_rejected_before_applying() {
    let context = test_context();
    let user_id = UserId::new();
    context.organization.add_user(user_id).await;

    let result = templates::apply_template_handler(
        State(context.state.clone()),
        Extension(actor()),
        Path(TemplateId::new()),
        Json(ApplyTemplateRequest {
            user_ids: vec![user_id],
            operation: "merge".to_owned(),
            reason: None,
        }),
    )
    .await;

    assert!(matches!(
        result.map(|_| ()).map_err(|error| error.0),
        Err(AppError::Validation(_))
    ));
}

#[tokio::test]
async fn inactive_template_cannot_be_applied() {
    let context = test_context();
    let user_id = UserId::new();
    context.organization.add_user(user_id).await;

    let (_, Json(template)) = templates::create_template_handler(
        State(context.state.clone()),
        Extension(actor()),
        Json(CreateTemplateRequest {
            name: "viewer".to_owned(),
            description: None,
            permissions: vec!["report:read".to_owned()],
            priority: 10,
        }),
    )
    .await
    .unwrap_or_else(|error| panic!("create template failed: {:?}", error.0));
    let template_id = template
        .id
        .parse::<TemplateId>()
        .unwrap_or_else(|error| panic!("invalid template id: {error}"));

    let Json(updated) = templates::update_template_status_handler(
        State(context.state.clone()),
        Extension(actor()),
        Path(template_id),
        Json(UpdateTemplateStatusRequest { is_active: false }),
    )
    .await
    .unwrap_or_else(|error| panic!("status update failed: {:?}", error.0));
    assert!(!updated.is_active);

    let result = templates::apply_template_handler(
        State(context.state.clone()),
        Extension(actor()),
        Path(template_id),
        Json(ApplyTemplateRequest {
            user_ids: vec![user_id],
            operation: "replace".to_owned(),
            reason: None,
        }),
    )
    .await;

    assert!(matches!(
        result.map(|_| ()).map_err(|error| error.0),
        Err(AppError::TemplateInactive { .. })
    ));
}

#[tokio::test]
async fn malformed_matrix_capability_is_a_validation_error() {
    let context = test_context();

    let result = permissions::permission_matrix_handler(
        State(context.state.clone()),
        Json(PermissionMatrixRequest {
            user_id: UserId::new(),
            capabilities: vec!["exam".to_owned()],
        }),
    )
    .await;

    assert!(matches!(
        result.map(|_| ()).map_err(|error| error.0),
        Err(AppError::Validation(_))
    ));
}
