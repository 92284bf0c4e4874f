//! Plans, tool calls and working state (spec §3).

use super::service::RiskLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Single,
    Parallel,
    Sequential,
    Mixed,
}

/// A single tool invocation within a plan.
///
/// Invariants: every id in `depends_on` exists in the same plan; the
/// dependency relation is acyclic; the id appears in exactly one
/// `execution_order` group; that group may only contain ids whose
/// dependencies lie in strictly earlier groups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub service_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub params: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub message: String,
    pub tool_calls: Vec<ToolCall>,
    pub execution_mode: ExecutionMode,
    pub execution_order: Vec<Vec<String>>,
    pub confidence: f64,
    pub reasoning: String,
    pub created_at: DateTime<Utc>,
}

impl Plan {
    pub fn call(&self, id: &str) -> Option<&ToolCall> {
        self.tool_calls.iter().find(|c| c.id == id)
    }

    /// Checks the DAG invariants from spec §8 property 2 & 3: every
    /// `depends_on` id exists in the plan, the dependency graph is acyclic,
    /// and `execution_order` is a valid topological layering.
    pub fn check_invariants(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let ids: HashSet<&str> = self.tool_calls.iter().map(|c| c.id.as_str()).collect();

        for call in &self.tool_calls {
            for dep in &call.depends_on {
                if !ids.contains(dep.as_str()) {
                    errors.push(format!(
                        "call {} depends on unknown call {}",
                        call.id, dep
                    ));
                }
            }
        }

        if has_cycle(&self.tool_calls) {
            errors.push("dependency graph contains a cycle".to_string());
        }

        // Every id appears in exactly one execution_order group.
        let mut seen: HashMap<&str, usize> = HashMap::new();
        for (group_idx, group) in self.execution_order.iter().enumerate() {
            for id in group {
                *seen.entry(id.as_str()).or_insert(0) += 1;
                if !ids.contains(id.as_str()) {
                    errors.push(format!("execution_order references unknown call {id}"));
                }
            }
            let _ = group_idx;
        }
        for id in &ids {
            match seen.get(id) {
                Some(1) => {}
                Some(_) => errors.push(format!("call {id} appears in more than one group")),
                None => errors.push(format!("call {id} missing from execution_order")),
            }
        }

        // Group may only contain ids whose deps lie in strictly earlier groups.
        let mut group_of: HashMap<&str, usize> = HashMap::new();
        for (idx, group) in self.execution_order.iter().enumerate() {
            for id in group {
                group_of.insert(id.as_str(), idx);
            }
        }
        for call in &self.tool_calls {
            if let Some(&g) = group_of.get(call.id.as_str()) {
                for dep in &call.depends_on {
                    if let Some(&dep_g) = group_of.get(dep.as_str()) {
                        if dep_g >= g {
                            errors.push(format!(
                                "call {} depends on {} which is not in a strictly earlier group",
                                call.id, dep
                            ));
                        }
                    }
                }
            }
        }

        errors
    }
}

fn has_cycle(calls: &[ToolCall]) -> bool {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    let index: HashMap<&str, &ToolCall> = calls.iter().map(|c| (c.id.as_str(), c)).collect();
    let mut marks: HashMap<&str, Mark> = calls.iter().map(|c| (c.id.as_str(), Mark::Unvisited)).collect();

    fn visit<'a>(
        id: &'a str,
        index: &HashMap<&'a str, &'a ToolCall>,
        marks: &mut HashMap<&'a str, Mark>,
    ) -> bool {
        match marks.get(id) {
            Some(Mark::Done) => return false,
            Some(Mark::InProgress) => return true,
            _ => {}
        }
        marks.insert(id, Mark::InProgress);
        if let Some(call) = index.get(id) {
            for dep in &call.depends_on {
                if visit(dep.as_str(), index, marks) {
                    return true;
                }
            }
        }
        marks.insert(id, Mark::Done);
        false
    }

    for call in calls {
        if visit(call.id.as_str(), &index, &mut marks) {
            return true;
        }
    }
    false
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolError {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub id: String,
    pub service_id: String,
    pub tool_name: String,
    pub success: bool,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<ToolError>,
    pub duration_ms: u64,
}

/// Mutable per-request execution state. Single-owner: only the executor
/// running a given plan mutates it.
#[derive(Debug, Clone, Serialize)]
pub struct WorkingState {
    pub plan_id: String,
    pub current_step: usize,
    pub total_steps: usize,
    pub completed: HashSet<String>,
    pub pending: HashSet<String>,
    pub failed: HashSet<String>,
    pub results: HashMap<String, ToolCallResult>,
    pub started_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

impl WorkingState {
    pub fn new(plan: &Plan) -> Self {
        let now = Utc::now();
        WorkingState {
            plan_id: plan.id.clone(),
            current_step: 0,
            total_steps: plan.execution_order.len(),
            completed: HashSet::new(),
            pending: plan.tool_calls.iter().map(|c| c.id.clone()).collect(),
            failed: HashSet::new(),
            results: HashMap::new(),
            started_at: now,
            last_updated_at: now,
        }
    }

    pub fn record(&mut self, result: ToolCallResult) {
        self.pending.remove(&result.id);
        if result.success {
            self.completed.insert(result.id.clone());
        } else {
            self.failed.insert(result.id.clone());
        }
        self.results.insert(result.id.clone(), result);
        self.last_updated_at = Utc::now();
    }

    pub fn all_succeeded(&self) -> bool {
        self.results.values().all(|r| r.success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(id: &str, deps: &[&str]) -> ToolCall {
        ToolCall {
            id: id.into(),
            service_id: "svc".into(),
            tool_name: "tool.do".into(),
            params: HashMap::new(),
            depends_on: deps.iter().map(|s| s.to_string()).collect(),
            risk_level: RiskLevel::Low,
        }
    }

    fn plan(calls: Vec<ToolCall>, order: Vec<Vec<&str>>) -> Plan {
        Plan {
            id: "p1".into(),
            message: "test".into(),
            tool_calls: calls,
            execution_mode: ExecutionMode::Sequential,
            execution_order: order
                .into_iter()
                .map(|g| g.into_iter().map(|s| s.to_string()).collect())
                .collect(),
            confidence: 1.0,
            reasoning: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn valid_plan_has_no_errors() {
        let p = plan(
            vec![call("c1", &[]), call("c2", &["c1"])],
            vec![vec!["c1"], vec!["c2"]],
        );
        assert!(p.check_invariants().is_empty());
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let p = plan(vec![call("c1", &["ghost"])], vec![vec!["c1"]]);
        let errors = p.check_invariants();
        assert!(errors.iter().any(|e| e.contains("unknown call")));
    }

    #[test]
    fn cycle_is_rejected() {
        let p = plan(
            vec![call("c1", &["c2"]), call("c2", &["c1"])],
            vec![vec!["c1", "c2"]],
        );
        let errors = p.check_invariants();
        assert!(errors.iter().any(|e| e.contains("cycle")));
    }

    #[test]
    fn dependency_in_same_or_later_group_is_rejected() {
        let p = plan(
            vec![call("c1", &[]), call("c2", &["c1"])],
            vec![vec!["c1", "c2"]],
        );
        let errors = p.check_invariants();
        assert!(errors.iter().any(|e| e.contains("strictly earlier group")));
    }

    #[test]
    fn working_state_tracks_completion() {
        let p = plan(vec![call("c1", &[])], vec![vec!["c1"]]);
        let mut ws = WorkingState::new(&p);
        assert!(ws.pending.contains("c1"));
        ws.record(ToolCallResult {
            id: "c1".into(),
            service_id: "svc".into(),
            tool_name: "tool.do".into(),
            success: true,
            result: None,
            error: None,
            duration_ms: 5,
        });
        assert!(ws.completed.contains("c1"));
        assert!(ws.all_succeeded());
    }
}
