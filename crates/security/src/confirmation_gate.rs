//! TTL-bounded human confirmation workflow (spec §4.9).
//!
//! Unlike the teacher's `ApprovalStore` (which blocks a waiting task on a
//! oneshot channel until a human resolves it), requests here are answered
//! over stateless HTTP: callers create a request, then either poll
//! `status(id)` or submit `respond(id, ...)` from a separate request.
//! State is plain poll-based, not channel-based.

use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;
use yukie_domain::model::{ConfirmationRequest, ConfirmationResponse, ConfirmationStatus, RiskAssessment};
use yukie_domain::{Error, Result};

pub struct ConfirmationGate {
    pending: RwLock<HashMap<String, ConfirmationRequest>>,
    default_ttl_seconds: i64,
}

impl ConfirmationGate {
    pub fn new(default_ttl_seconds: u64) -> Self {
        ConfirmationGate {
            pending: RwLock::new(HashMap::new()),
            default_ttl_seconds: default_ttl_seconds as i64,
        }
    }

    /// Creates a pending confirmation request for `call_id` within
    /// `plan_id`, expiring `default_ttl_seconds` from now.
    pub fn create_request(&self, plan_id: &str, call_id: &str, assessment: RiskAssessment) -> ConfirmationRequest {
        let now = Utc::now();
        let request = ConfirmationRequest {
            id: Uuid::new_v4().to_string(),
            plan_id: plan_id.to_string(),
            call_id: call_id.to_string(),
            assessment,
            status: ConfirmationStatus::Pending,
            created_at: now,
            expires_at: now + ChronoDuration::seconds(self.default_ttl_seconds),
            response: None,
        };
        self.pending.write().insert(request.id.clone(), request.clone());
        request
    }

    /// Transitions a pending request to confirmed/denied. Expired or
    /// already-resolved requests cannot be responded to.
    pub fn respond(&self, id: &str, confirmed: bool, reason: Option<String>) -> Result<ConfirmationRequest> {
        let mut pending = self.pending.write();
        let request = pending
            .get_mut(id)
            .ok_or_else(|| Error::BadRequest(format!("unknown confirmation request {id}")))?;

        if request.status != ConfirmationStatus::Pending {
            return Err(Error::BadRequest(format!(
                "confirmation request {id} is already {:?}",
                request.status
            )));
        }
        if Utc::now() > request.expires_at {
            request.status = ConfirmationStatus::Expired;
            return Err(Error::ConfirmationExpired);
        }

        request.status = if confirmed {
            ConfirmationStatus::Confirmed
        } else {
            ConfirmationStatus::Denied
        };
        request.response = Some(ConfirmationResponse { confirmed, reason });
        Ok(request.clone())
    }

    /// Current status of `id`, expiring it in place if its TTL has passed.
    pub fn status(&self, id: &str) -> Option<ConfirmationStatus> {
        let mut pending = self.pending.write();
        let request = pending.get_mut(id)?;
        if request.status == ConfirmationStatus::Pending && Utc::now() > request.expires_at {
            request.status = ConfirmationStatus::Expired;
        }
        Some(request.status)
    }

    pub fn get(&self, id: &str) -> Option<ConfirmationRequest> {
        self.pending.read().get(id).cloned()
    }

    /// Scans all pending entries and expires any past their TTL. Returns
    /// the ids that transitioned.
    pub fn expire_stale(&self) -> Vec<String> {
        let now = Utc::now();
        let mut pending = self.pending.write();
        let mut expired = Vec::new();
        for request in pending.values_mut() {
            if request.status == ConfirmationStatus::Pending && now > request.expires_at {
                request.status = ConfirmationStatus::Expired;
                expired.push(request.id.clone());
            }
        }
        expired
    }

    /// Full history, newest first.
    pub fn history(&self) -> Vec<ConfirmationRequest> {
        let mut all: Vec<ConfirmationRequest> = self.pending.read().values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all
    }
}
