use chrono::{DateTime, Utc};
use orgperm_domain::{Capability, EffectiveDecision, GrantSource, UserId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Query string for a single permission check.
#[derive(Debug, Deserialize)]
pub struct CheckPermissionQuery {
    pub user_id: UserId,
    pub resource: String,
    pub action: String,
}

/// Incoming payload for resolving several capabilities at once.
#[derive(Debug, Deserialize)]
pub struct PermissionMatrixRequest {
    pub user_id: UserId,
    pub capabilities: Vec<String>,
}

/// Source of the winning grant.
#[derive(Debug, Serialize)]
pub struct GrantSourceResponse {
    pub source_type: &'static str,
    pub source_id: String,
}

/// API representation of an effective decision.
#[derive(Debug, Serialize)]
pub struct EffectiveDecisionResponse {
    pub granted: bool,
    pub source: Option<GrantSourceResponse>,
    pub grant_id: Option<String>,
    pub priority: i32,
    pub conditions: Option<Value>,
    pub expires_at: Option<DateTime<Utc>>,
    pub candidates_considered: usize,
}

/// One row of a permission matrix.
#[derive(Debug, Serialize)]
pub struct PermissionMatrixEntryResponse {
    pub capability: String,
    pub decision: EffectiveDecisionResponse,
}

impl From<GrantSource> for GrantSourceResponse {
    fn from(value: GrantSource) -> Self {
        Self {
            source_type: value.source_type().as_str(),
            source_id: value.source_id().to_string(),
        }
    }
}

impl From<EffectiveDecision> for EffectiveDecisionResponse {
    fn from(value: EffectiveDecision) -> Self {
        Self {
            granted: value.granted,
            source: value.source.map(GrantSourceResponse::from),
            grant_id: value.grant_id.map(|grant_id| grant_id.to_string()),
            priority: value.priority,
            conditions: value.conditions,
            expires_at: value.expires_at,
            candidates_considered: value.candidates_considered,
        }
    }
}

impl From<(Capability, EffectiveDecision)> for PermissionMatrixEntryResponse {
    fn from((capability, decision): (Capability, EffectiveDecision)) -> Self {
        Self {
            capability: capability.to_string(),
            decision: EffectiveDecisionResponse::from(decision),
        }
    }
}
