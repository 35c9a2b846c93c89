use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use orgperm_core::{AppError, AppResult};
use orgperm_domain::{Capability, EffectiveDecision, PermissionGrant, UserId};
use tracing::debug;

use crate::GrantCollector;


/// Picks the single effective decision among candidate grants.
///
/// Grants are ranked by priority, then by source (direct, role, group,
/// department), then by most recent grant time, then by grant id. Polarity
/// plays no part: a higher-priority allow beats a lower-priority deny.
#[must_use]
pub fn resolve(candidates: &[PermissionGrant]) -> EffectiveDecision {
    candidates
        .iter()
        .max_by(|left, right| rank(left, right))
        .map(|winner| EffectiveDecision::from_grant(winner, candidates.len()))
        .unwrap_or_else(EffectiveDecision::default_deny)
}

fn rank(left: &PermissionGrant, right: &PermissionGrant) -> Ordering {
    left.priority
        .cmp(&right.priority)
        .then_with(|| left.source.precedence().cmp(&right.source.precedence()))
        .then_with(|| left.granted_at.cmp(&right.granted_at))
        .then_with(|| left.grant_id.cmp(&right.grant_id))
}

/// Application service answering authorization checks.
#[derive(Clone)]
pub struct PermissionResolutionService {
    collector: GrantCollector,
}

impl PermissionResolutionService {
    /// Creates a new service from a grant collector.
    #[must_use]
    pub fn new(collector: GrantCollector) -> Self {
        Self { collector }
    }

    /// Resolves the effective decision for a user and capability now.
    pub async fn check_permission(
        &self,
        user_id: UserId,
        resource: &str,
        action: &str,
    ) -> AppResult<EffectiveDecision> {
        let capability = Capability::new(resource, action)?;
        self.check_permission_at(user_id, &capability, Utc::now())
            .await
    }

    /// Resolves the effective decision at a given instant.
    pub async fn check_permission_at(
        &self,
        user_id: UserId,
        capability: &Capability,
        now: DateTime<Utc>,
    ) -> AppResult<EffectiveDecision> {
        let candidates = self.collector.collect(user_id, capability, now).await?;
        let decision = resolve(&candidates);

        debug!(
            user_id = %user_id,
            capability = %capability,
            candidates = candidates.len(),
            granted = decision.granted,
            priority = decision.priority,
            "resolved effective permission"
        );

        Ok(decision)
    }

    /// Ensures the user is currently allowed the capability.
    pub async fn require_permission(
        &self,
        user_id: UserId,
        capability: &Capability,
    ) -> AppResult<()> {
        let decision = self
            .check_permission_at(user_id, capability, Utc::now())
            .await?;
        if decision.granted {
            return Ok(());
        }

        Err(AppError::Forbidden(format!(
            "user '{user_id}' is not allowed '{capability}'"
        )))
    }

    /// Resolves every requested capability for a user.
    pub async fn resolve_effective_permission_matrix(
        &self,
        user_id: UserId,
        capabilities: &[Capability],
        now: DateTime<Utc>,
    ) -> AppResult<BTreeMap<Capability, EffectiveDecision>> {
        let mut matrix = BTreeMap::new();
        for capability in capabilities {
            if matrix.contains_key(capability) {
                continue;
            }
            let decision = self.check_permission_at(user_id, capability, now).await?;
            matrix.insert(capability.clone(), decision);
        }

        Ok(matrix)
    }
}
