//! Dependency-ordered dispatch of a [`Plan`]'s tool calls (spec §4.8).

use crate::param_resolution::resolve_params;
use serde_json::Value;
use std::time::{Duration, Instant};
use yukie_domain::model::{
    AuthContext, ExecutionMode, Plan, ToolCall, ToolCallResult, ToolError, WorkingState,
};
use yukie_registry::ServiceRegistry;

/// Per-request overrides for plan execution (spec §4.8 inputs).
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub max_parallel: usize,
    pub timeout_ms: u64,
    pub retry_failed_calls: bool,
    pub max_retries: u32,
    /// Accepted for callers that want to thread the override through, but
    /// confirmation gating itself is the caller's responsibility (run the
    /// Security Layer's Risk Classifier + Confirmation Gate before handing
    /// the plan to `execute_plan`) — the executor has no dependency on
    /// `yukie-security` and does not reach for it mid-dispatch.
    pub require_confirmation: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        ExecutorConfig {
            max_parallel: 5,
            timeout_ms: 30_000,
            retry_failed_calls: false,
            max_retries: 2,
            require_confirmation: false,
        }
    }
}

fn failed_result(call: &ToolCall, code: &str, message: String, started: Instant) -> ToolCallResult {
    ToolCallResult {
        id: call.id.clone(),
        service_id: call.service_id.clone(),
        tool_name: call.tool_name.clone(),
        success: false,
        result: None,
        error: Some(ToolError {
            code: code.to_string(),
            message,
            details: None,
        }),
        duration_ms: started.elapsed().as_millis() as u64,
    }
}

async fn dispatch_call(
    http: &reqwest::Client,
    registry: &ServiceRegistry,
    call: &ToolCall,
    auth: &AuthContext,
    state: &WorkingState,
    timeout_ms: u64,
) -> ToolCallResult {
    let started = Instant::now();
    let resolved_params = resolve_params(&call.params, &state.results);

    let Some(svc) = registry.get(&call.service_id) else {
        return failed_result(
            call,
            "EXECUTION_ERROR",
            format!("unknown service {}", call.service_id),
            started,
        );
    };

    let url = format!("{}{}", svc.base_url, svc.endpoints.invoke);
    let scopes: Vec<String> = auth.scopes.iter().cloned().collect();
    let body = serde_json::json!({
        "action": call.tool_name,
        "params": resolved_params,
        "context": {
            "userId": auth.user_id,
            "requestId": auth.request_id,
            "scopes": scopes,
        },
    });

    let mut request = http
        .post(&url)
        .json(&body)
        .header("X-Yukie-User-Id", &auth.user_id)
        .header("X-Yukie-Scopes", scopes.join(","))
        .timeout(Duration::from_millis(timeout_ms));
    if let Some(request_id) = &auth.request_id {
        request = request.header("X-Yukie-Request-Id", request_id);
    }

    let response = match request.send().await {
        Ok(resp) => resp,
        Err(e) if e.is_timeout() => {
            return failed_result(call, "EXECUTION_ERROR", format!("timeout: {e}"), started)
        }
        Err(e) => {
            return failed_result(call, "EXECUTION_ERROR", format!("network error: {e}"), started)
        }
    };

    let status = response.status();
    let body_text = match response.text().await {
        Ok(t) => t,
        Err(e) => {
            return failed_result(
                call,
                "EXECUTION_ERROR",
                format!("failed to read response body: {e}"),
                started,
            )
        }
    };

    if !status.is_success() {
        return ToolCallResult {
            id: call.id.clone(),
            service_id: call.service_id.clone(),
            tool_name: call.tool_name.clone(),
            success: false,
            result: None,
            error: Some(ToolError {
                code: "INVOCATION_FAILED".to_string(),
                message: format!("invocation returned http {status}"),
                details: Some(serde_json::json!({"status": status.as_u16(), "body": body_text})),
            }),
            duration_ms: started.elapsed().as_millis() as u64,
        };
    }

    let parsed: Value = match serde_json::from_str(&body_text) {
        Ok(v) => v,
        Err(e) => {
            return failed_result(
                call,
                "EXECUTION_ERROR",
                format!("invalid JSON response: {e}"),
                started,
            )
        }
    };

    let reported_success = parsed.get("success").and_then(Value::as_bool).unwrap_or(true);
    if !reported_success {
        let error_value = parsed.get("error");
        let (code, message, details) = match error_value {
            Some(Value::Object(_)) => (
                error_value
                    .and_then(|e| e.get("code"))
                    .and_then(Value::as_str)
                    .unwrap_or("EXECUTION_ERROR")
                    .to_string(),
                error_value
                    .and_then(|e| e.get("message"))
                    .and_then(Value::as_str)
                    .unwrap_or("tool reported failure")
                    .to_string(),
                error_value.and_then(|e| e.get("details")).cloned(),
            ),
            Some(Value::String(s)) => ("EXECUTION_ERROR".to_string(), s.clone(), None),
            _ => (
                "EXECUTION_ERROR".to_string(),
                "tool reported failure".to_string(),
                None,
            ),
        };
        return ToolCallResult {
            id: call.id.clone(),
            service_id: call.service_id.clone(),
            tool_name: call.tool_name.clone(),
            success: false,
            result: None,
            error: Some(ToolError { code, message, details }),
            duration_ms: started.elapsed().as_millis() as u64,
        };
    }

    let result = parsed.get("result").cloned().or_else(|| Some(parsed.clone()));
    ToolCallResult {
        id: call.id.clone(),
        service_id: call.service_id.clone(),
        tool_name: call.tool_name.clone(),
        success: true,
        result,
        error: None,
        duration_ms: started.elapsed().as_millis() as u64,
    }
}

async fn dispatch_with_retry(
    http: &reqwest::Client,
    registry: &ServiceRegistry,
    call: &ToolCall,
    auth: &AuthContext,
    state: &WorkingState,
    config: &ExecutorConfig,
) -> ToolCallResult {
    let mut attempt = 0;
    loop {
        let result = dispatch_call(http, registry, call, auth, state, config.timeout_ms).await;
        if result.success || !config.retry_failed_calls || attempt >= config.max_retries {
            return result;
        }
        attempt += 1;
        tracing::warn!(call_id = %call.id, attempt, "retrying failed tool call");
    }
}

async fn run_group(
    ids: &[String],
    plan: &Plan,
    auth: &AuthContext,
    registry: &ServiceRegistry,
    http: &reqwest::Client,
    config: &ExecutorConfig,
    state: &mut WorkingState,
) {
    let calls: Vec<&ToolCall> = ids.iter().filter_map(|id| plan.call(id)).collect();
    if calls.len() <= 1 {
        for call in calls {
            let result = dispatch_with_retry(http, registry, call, auth, state, config).await;
            state.record(result);
        }
        return;
    }

    for batch in calls.chunks(config.max_parallel.max(1)) {
        let futures = batch
            .iter()
            .map(|call| dispatch_with_retry(http, registry, call, auth, &*state, config));
        let results = futures_util::future::join_all(futures).await;
        for result in results {
            state.record(result);
        }
    }
}

/// Executes `plan` end to end following spec §4.8's group/batch algorithm
/// and returns the [`WorkingState`] recording every call's outcome.
pub async fn execute_plan(
    plan: &Plan,
    auth: &AuthContext,
    registry: &ServiceRegistry,
    http: &reqwest::Client,
    config: &ExecutorConfig,
) -> WorkingState {
    let mut state = WorkingState::new(plan);

    if plan.execution_mode == ExecutionMode::Single && plan.tool_calls.len() == 1 {
        let call = &plan.tool_calls[0];
        let result = dispatch_with_retry(http, registry, call, auth, &state, config).await;
        state.record(result);
        return state;
    }

    if !plan.execution_order.is_empty() {
        for group in &plan.execution_order {
            run_group(group, plan, auth, registry, http, config, &mut state).await;
        }
    } else {
        let ids: Vec<String> = plan.tool_calls.iter().map(|c| c.id.clone()).collect();
        run_group(&ids, plan, auth, registry, http, config, &mut state).await;
    }

    state
}

/// `success` of the whole plan, per spec §4.8: every recorded result
/// succeeded (a plan with zero calls trivially succeeds).
pub fn plan_succeeded(state: &WorkingState) -> bool {
    state.results.values().all(|r| r.success)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use yukie_domain::model::RiskLevel;

    fn call(id: &str, depends_on: Vec<&str>) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            service_id: "svc".into(),
            tool_name: "tool".into(),
            params: HashMap::new(),
            depends_on: depends_on.into_iter().map(String::from).collect(),
            risk_level: RiskLevel::Low,
        }
    }

    #[test]
    fn plan_succeeded_true_when_all_results_ok() {
        let mut state = WorkingState {
            plan_id: "p1".into(),
            current_step: 0,
            total_steps: 1,
            completed: Default::default(),
            pending: Default::default(),
            failed: Default::default(),
            results: HashMap::new(),
            started_at: chrono::Utc::now(),
            last_updated_at: chrono::Utc::now(),
        };
        state.record(ToolCallResult {
            id: "c1".into(),
            service_id: "svc".into(),
            tool_name: "tool".into(),
            success: true,
            result: Some(serde_json::json!({"ok": true})),
            error: None,
            duration_ms: 5,
        });
        assert!(plan_succeeded(&state));
    }

    #[test]
    fn plan_succeeded_false_when_any_result_failed() {
        let mut state = WorkingState {
            plan_id: "p1".into(),
            current_step: 0,
            total_steps: 1,
            completed: Default::default(),
            pending: Default::default(),
            failed: Default::default(),
            results: HashMap::new(),
            started_at: chrono::Utc::now(),
            last_updated_at: chrono::Utc::now(),
        };
        state.record(ToolCallResult {
            id: "c1".into(),
            service_id: "svc".into(),
            tool_name: "tool".into(),
            success: false,
            result: None,
            error: Some(ToolError {
                code: "EXECUTION_ERROR".into(),
                message: "boom".into(),
                details: None,
            }),
            duration_ms: 5,
        });
        assert!(!plan_succeeded(&state));
    }

    #[test]
    fn failed_call_against_unknown_service_is_execution_error() {
        let c = call("c1", vec![]);
        let started = Instant::now();
        let result = failed_result(&c, "EXECUTION_ERROR", "unknown service svc".into(), started);
        assert!(!result.success);
        assert_eq!(result.error.unwrap().code, "EXECUTION_ERROR");
    }
}
