//! Auth context, risk assessment, confirmation requests and audit entries.

use super::service::RiskLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Derived per request from a verified bearer token (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: String,
    pub scopes: HashSet<String>,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,
}

impl AuthContext {
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains("admin") || self.scopes.contains(scope)
    }

    pub fn has_all_scopes<'a, I: IntoIterator<Item = &'a String>>(&self, required: I) -> bool {
        required.into_iter().all(|s| self.has_scope(s))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub requires_confirmation: bool,
    pub reasons: Vec<String>,
    pub mitigation: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationStatus {
    Pending,
    Confirmed,
    Denied,
    Expired,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfirmationResponse {
    pub confirmed: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfirmationRequest {
    pub id: String,
    pub plan_id: String,
    pub call_id: String,
    pub assessment: RiskAssessment,
    pub status: ConfirmationStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub response: Option<ConfirmationResponse>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum AuditKind {
    ToolInvoke,
    ToolComplete,
    SecurityWarning,
    RoutingDecision,
    PlanCreated,
    ConfirmationRequested,
    ConfirmationConfirmed,
    ConfirmationDenied,
    ConfirmationExpired,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub request_id: Option<String>,
    pub kind: AuditKind,
    pub details: HashMap<String, serde_json::Value>,
}

/// In-memory sliding-window counter keyed by (user_id, bucket) — spec §3.
/// Core components consult this for observability only; actual 429
/// enforcement lives in the gateway's `tower_governor` layer (spec §5).
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitCounter {
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}
