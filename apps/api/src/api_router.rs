use axum::Router;
use axum::middleware::from_fn;
use axum::routing::{delete, get, post, put};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{handlers, middleware};

pub fn build_router(app_state: AppState) -> Router {
    let api_routes = Router::new()
        .route(
            "/api/departments",
            get(handlers::departments::list_departments_handler)
                .post(handlers::departments::create_department_handler),
        )
        .route(
            "/api/departments/order",
            put(handlers::departments::reorder_departments_handler),
        )
        .route(
            "/api/departments/{department_id}",
            get(handlers::departments::department_view_handler),
        )
        .route(
            "/api/departments/{department_id}/move",
            post(handlers::departments::move_department_handler),
        )
        .route(
            "/api/departments/{department_id}/code",
            put(handlers::departments::rename_department_code_handler),
        )
        .route(
            "/api/departments/{department_id}/disable",
            post(handlers::departments::disable_department_handler),
        )
        .route(
            "/api/permissions/check",
            get(handlers::permissions::check_permission_handler),
        )
        .route(
            "/api/permissions/matrix",
            post(handlers::permissions::permission_matrix_handler),
        )
        .route(
            "/api/templates",
            get(handlers::templates::list_templates_handler)
                .post(handlers::templates::create_template_handler),
        )
        .route(
            "/api/templates/{template_id}",
            delete(handlers::templates::delete_template_handler),
        )
        .route(
            "/api/templates/{template_id}/status",
            put(handlers::templates::update_template_status_handler),
        )
        .route(
            "/api/templates/{template_id}/apply",
            post(handlers::templates::apply_template_handler),
        )
        .layer(from_fn(middleware::resolve_actor));

    Router::new()
        .route("/health", get(handlers::health::health_handler))
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
