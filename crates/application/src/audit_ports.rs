use std::sync::Arc;

use async_trait::async_trait;
use orgperm_core::AppResult;
use orgperm_domain::AuditAction;
use tracing::warn;

/// Immutable audit event payload emitted by application services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    /// Subject that performed the action.
    pub subject: String,
    /// Stable audit action identifier.
    pub action: AuditAction,
    /// Resource type label.
    pub resource_type: String,
    /// Resource identifier.
    pub resource_id: String,
    /// Optional audit detail payload.
    pub detail: Option<String>,
}

/// Port for persisting append-only audit events.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Persists one audit event.
    async fn append_event(&self, event: AuditEvent) -> AppResult<()>;
}

/// Best-effort audit side-channel.
///
/// A failing or absent audit repository never changes the outcome of the
/// operation being audited; failures are only logged.
#[derive(Clone, Default)]
pub struct AuditTrail {
    repository: Option<Arc<dyn AuditRepository>>,
}

impl AuditTrail {
    /// Creates a trail writing to the given repository.
    #[must_use]
    pub fn new(repository: Arc<dyn AuditRepository>) -> Self {
        Self {
            repository: Some(repository),
        }
    }

    /// Creates a trail that drops every event.
    #[must_use]
    pub fn disabled() -> Self {
        Self { repository: None }
    }

    /// Appends an event, logging instead of failing when the repository errors.
    pub async fn record(&self, event: AuditEvent) {
        let Some(repository) = &self.repository else {
            return;
        };

        let action = event.action;
        let resource_id = event.resource_id.clone();
        if let Err(error) = repository.append_event(event).await {
            warn!(
                action = action.as_str(),
                resource_id = %resource_id,
                error = %error,
                "failed to append audit event"
            );
        }
    }
}
