use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use orgperm_core::Actor;

/// Header carrying the acting subject for audit attribution.
pub const ACTOR_SUBJECT_HEADER: &str = "x-actor-subject";

/// Attaches the acting subject to the request; requests without one act as the system.
pub async fn resolve_actor(mut request: Request, next: Next) -> Response {
    let actor = request
        .headers()
        .get(ACTOR_SUBJECT_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| Actor::new(value, None))
        .unwrap_or_else(Actor::system);

    request.extensions_mut().insert(actor);
    next.run(request).await
}
