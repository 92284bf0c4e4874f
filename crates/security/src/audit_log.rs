//! Append-only, bounded in-memory audit trail (spec §4.10).

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;
use yukie_domain::model::{AuditEntry, AuditKind};

const REDACTED: &str = "[REDACTED]";

fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    ["password", "apikey", "api_key", "token", "secret", "authorization", "cookie"]
        .iter()
        .any(|sensitive| lower == *sensitive)
}

fn redact(details: HashMap<String, Value>) -> HashMap<String, Value> {
    details
        .into_iter()
        .map(|(k, v)| {
            if is_sensitive_key(&k) {
                (k, Value::String(REDACTED.to_string()))
            } else {
                (k, v)
            }
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct AuditStats {
    pub total: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub security_events: usize,
}

impl AuditStats {
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.success_count as f64 / self.total as f64
        }
    }
}

#[derive(Debug, Default)]
pub struct AuditFilter {
    pub user_id: Option<String>,
    pub kind: Option<AuditKind>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

/// Ring buffer of audit entries; oldest discarded once `capacity` is hit.
pub struct AuditLog {
    inner: Mutex<VecDeque<AuditEntry>>,
    capacity: usize,
}

impl AuditLog {
    pub fn new(capacity: usize) -> Self {
        AuditLog {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn record(&self, user_id: &str, request_id: Option<String>, kind: AuditKind, details: HashMap<String, Value>) {
        let entry = AuditEntry {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            user_id: user_id.to_string(),
            request_id,
            kind,
            details: redact(details),
        };
        let mut buf = self.inner.lock();
        if buf.len() >= self.capacity {
            buf.pop_front();
        }
        buf.push_back(entry);
    }

    /// Entries matching `filter`, newest first.
    pub fn query(&self, filter: &AuditFilter) -> Vec<AuditEntry> {
        let buf = self.inner.lock();
        let mut matched: Vec<AuditEntry> = buf
            .iter()
            .rev()
            .filter(|e| filter.user_id.as_deref().map(|id| id == e.user_id).unwrap_or(true))
            .filter(|e| filter.kind.map(|k| k == e.kind).unwrap_or(true))
            .filter(|e| filter.since.map(|since| e.timestamp >= since).unwrap_or(true))
            .filter(|e| filter.until.map(|until| e.timestamp <= until).unwrap_or(true))
            .cloned()
            .collect();
        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }
        matched
    }

    pub fn get_stats(&self) -> AuditStats {
        let buf = self.inner.lock();
        let mut stats = AuditStats {
            total: buf.len(),
            ..Default::default()
        };
        for entry in buf.iter() {
            match entry.kind {
                AuditKind::ToolComplete => stats.success_count += 1,
                AuditKind::SecurityWarning => stats.security_events += 1,
                _ => {}
            }
        }
        stats.failure_count = stats.total.saturating_sub(stats.success_count);
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ring_buffer_evicts_oldest() {
        let log = AuditLog::new(2);
        log.record("u1", None, AuditKind::ToolInvoke, HashMap::new());
        log.record("u1", None, AuditKind::ToolInvoke, HashMap::new());
        log.record("u1", None, AuditKind::ToolInvoke, HashMap::new());
        let all = log.query(&AuditFilter::default());
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn sensitive_keys_are_redacted() {
        let log = AuditLog::new(10);
        let mut details = HashMap::new();
        details.insert("password".to_string(), json!("hunter2"));
        details.insert("note".to_string(), json!("ok"));
        log.record("u1", None, AuditKind::ToolInvoke, details);
        let all = log.query(&AuditFilter::default());
        assert_eq!(all[0].details.get("password").unwrap(), &json!("[REDACTED]"));
        assert_eq!(all[0].details.get("note").unwrap(), &json!("ok"));
    }

    #[test]
    fn filters_by_user_id() {
        let log = AuditLog::new(10);
        log.record("u1", None, AuditKind::ToolInvoke, HashMap::new());
        log.record("u2", None, AuditKind::ToolInvoke, HashMap::new());
        let filtered = log.query(&AuditFilter {
            user_id: Some("u1".to_string()),
            ..Default::default()
        });
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].user_id, "u1");
    }

    #[test]
    fn filters_by_kind() {
        let log = AuditLog::new(10);
        log.record("u1", None, AuditKind::ToolInvoke, HashMap::new());
        log.record("u1", None, AuditKind::SecurityWarning, HashMap::new());
        let filtered = log.query(&AuditFilter {
            kind: Some(AuditKind::SecurityWarning),
            ..Default::default()
        });
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn get_stats_counts_security_events() {
        let log = AuditLog::new(10);
        log.record("u1", None, AuditKind::ToolComplete, HashMap::new());
        log.record("u1", None, AuditKind::SecurityWarning, HashMap::new());
        let stats = log.get_stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.success_count, 1);
        assert_eq!(stats.security_events, 1);
    }

    #[test]
    fn query_newest_first() {
        let log = AuditLog::new(10);
        log.record("u1", None, AuditKind::ToolInvoke, HashMap::new());
        std::thread::sleep(std::time::Duration::from_millis(2));
        log.record("u1", None, AuditKind::ToolComplete, HashMap::new());
        let all = log.query(&AuditFilter::default());
        assert_eq!(all[0].kind, AuditKind::ToolComplete);
    }
}
