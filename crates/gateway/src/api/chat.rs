//! `POST /chat` — the primary interface (spec §2, §6).
//!
//! Handler → retrieval router → planner → plan validator → security layer
//! (risk classification, sanitization, confirmation gating) → executor →
//! composer → response. Single-service scope per spec §1: one request
//! routes to exactly one target service.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Extension, State};
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use yukie_domain::model::{
    AuditKind, AuthContext, Plan, RiskAssessment, ServiceDefinition, ToolCall, ToolCallResult, ToolError,
};
use yukie_domain::{Error, Result};
use yukie_executor::ExecutorConfig;
use yukie_planner::AvailableTool;
use yukie_providers::ChatRequest as LlmChatRequest;
use yukie_router::RouteRequest;

use crate::error_response::ApiError;
use crate::state::AppState;

const MAX_MESSAGE_LEN: usize = 10_000;
const CHAT_SCOPE: &str = "yukie:chat";

#[derive(Debug, Deserialize)]
pub struct ChatApiRequest {
    pub message: String,
    #[serde(default, rename = "conversationId")]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatApiResponse {
    pub response: String,
    #[serde(rename = "conversationId")]
    pub conversation_id: String,
    #[serde(rename = "serviceUsed", skip_serializing_if = "Option::is_none")]
    pub service_used: Option<String>,
    #[serde(rename = "actionInvoked", skip_serializing_if = "Option::is_none")]
    pub action_invoked: Option<String>,
    #[serde(rename = "routingDetails", skip_serializing_if = "Option::is_none")]
    pub routing_details: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

pub async fn chat(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<ChatApiRequest>,
) -> Response {
    if let Err(err) = validate_request(&body) {
        return ApiError(err).into_response();
    }
    if !auth.has_scope(CHAT_SCOPE) {
        return ApiError(Error::Forbidden(format!("missing required scope `{CHAT_SCOPE}`"))).into_response();
    }

    match process_chat(&state, &auth, body).await {
        Ok(resp) => Json(resp).into_response(),
        Err(err) => ApiError(err).into_response(),
    }
}

fn validate_request(body: &ChatApiRequest) -> Result<()> {
    if body.message.trim().is_empty() || body.message.len() > MAX_MESSAGE_LEN {
        return Err(Error::BadRequest(format!(
            "message must be 1..{MAX_MESSAGE_LEN} characters"
        )));
    }
    Ok(())
}

/// `ENABLE_ROUTING=false` (or `0`) skips the retrieval router entirely and
/// sends the message straight to the LLM — a debug escape hatch (spec §6
/// Environment) for exercising the LLM seam without a registered service.
fn routing_disabled() -> bool {
    matches!(
        std::env::var("ENABLE_ROUTING").ok().as_deref(),
        Some("false") | Some("0")
    )
}

async fn process_chat(state: &AppState, auth: &AuthContext, body: ChatApiRequest) -> Result<ChatApiResponse> {
    let conversation_id = body
        .conversation_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    if routing_disabled() {
        let reply = direct_llm_reply(&state.llm, &body.message, body.model.clone()).await;
        return Ok(ChatApiResponse {
            response: reply.clone(),
            conversation_id,
            service_used: None,
            action_invoked: None,
            routing_details: None,
            content: Some(reply),
        });
    }

    let services = state.registry.get_enabled();
    let route_result = yukie_router::route(
        &state.llm,
        RouteRequest {
            message: &body.message,
            auth,
            model: body.model.clone(),
            max_candidates: None,
        },
        &services,
        &state.router_config,
    )
    .await;

    state.audit_log.record(
        &auth.user_id,
        auth.request_id.clone(),
        AuditKind::RoutingDecision,
        to_details(&route_result),
    );

    if route_result.target_service == "none" {
        let reply = apology_reply(&body.message);
        return Ok(ChatApiResponse {
            response: reply.clone(),
            conversation_id,
            service_used: None,
            action_invoked: None,
            routing_details: Some(serde_json::to_value(&route_result).unwrap_or(Value::Null)),
            content: Some(reply),
        });
    }

    let Some(service) = state.registry.get(&route_result.target_service) else {
        return Err(Error::BadRequest(format!(
            "routed service `{}` is no longer registered",
            route_result.target_service
        )));
    };

    if ensure_manifest(state, &service).await.is_err() {
        tracing::warn!(service_id = %service.id, "could not reach routed service, falling back to apology");
        let reply = apology_reply(&body.message);
        return Ok(ChatApiResponse {
            response: reply.clone(),
            conversation_id,
            service_used: Some(service.id.clone()),
            action_invoked: None,
            routing_details: Some(serde_json::to_value(&route_result).unwrap_or(Value::Null)),
            content: Some(reply),
        });
    }

    let available_tools = available_tools_for(state, &service);
    if available_tools.is_empty() {
        return Err(Error::BadRequest(format!("service `{}` exposes no tools", service.id)));
    }

    let plan = yukie_planner::plan(
        &state.llm,
        yukie_planner::PlanRequest {
            message: &body.message,
            auth,
            available_tools: &available_tools,
            model: body.model.clone(),
            max_tools: None,
        },
    )
    .await;

    state
        .audit_log
        .record(&auth.user_id, auth.request_id.clone(), AuditKind::PlanCreated, to_details(&plan));

    if plan.tool_calls.is_empty() {
        let reply = apology_reply(&body.message);
        return Ok(ChatApiResponse {
            response: reply.clone(),
            conversation_id,
            service_used: Some(service.id.clone()),
            action_invoked: None,
            routing_details: Some(serde_json::to_value(&route_result).unwrap_or(Value::Null)),
            content: Some(reply),
        });
    }

    let validation = yukie_planner::validate_plan(&plan, auth, &available_tools);
    if !validation.is_valid() {
        let messages: Vec<String> = validation.errors.iter().map(|e| e.message.clone()).collect();
        return Err(Error::ValidationError(messages));
    }
    for warning in &validation.warnings {
        tracing::warn!(call_id = %warning.call_id, message = %warning.message, "plan validation warning");
    }

    let (sub_plan, mut gated_results) = apply_security(state, auth, &plan, &service);

    let working_state = if sub_plan.tool_calls.is_empty() {
        yukie_domain::model::WorkingState::new(&plan)
    } else {
        yukie_executor::execute_plan(&sub_plan, auth, &state.registry, &state.http, &ExecutorConfig {
            timeout_ms: state.config.registry.default_timeout,
            ..ExecutorConfig::default()
        })
        .await
    };

    let mut results: Vec<ToolCallResult> = Vec::with_capacity(plan.tool_calls.len());
    for call in &plan.tool_calls {
        if let Some(result) = working_state.results.get(&call.id) {
            results.push(result.clone());
        } else if let Some(result) = gated_results.remove(&call.id) {
            results.push(result);
        }
    }

    for result in &results {
        state.audit_log.record(
            &auth.user_id,
            auth.request_id.clone(),
            AuditKind::ToolComplete,
            to_details(result),
        );
    }

    let action_invoked = results.first().map(|r| r.tool_name.clone());
    let reply = if results.len() == 1 {
        yukie_composer::compose_single(
            &state.llm,
            &body.message,
            &results[0].service_id,
            &results[0].tool_name,
            &results[0],
            body.model.clone(),
        )
        .await
    } else {
        yukie_composer::compose_overview(&state.llm, &body.message, &results, body.model.clone()).await
    };

    Ok(ChatApiResponse {
        response: reply.clone(),
        conversation_id,
        service_used: Some(service.id.clone()),
        action_invoked,
        routing_details: Some(serde_json::to_value(&route_result).unwrap_or(Value::Null)),
        content: Some(reply),
    })
}

async fn ensure_manifest(state: &AppState, service: &ServiceDefinition) -> Result<()> {
    if state.registry.manifest_cache.get(&service.id).is_some() {
        return Ok(());
    }
    state.registry.fetch_actions(&service.id).await
}

fn available_tools_for(state: &AppState, service: &ServiceDefinition) -> Vec<AvailableTool> {
    let Some(manifest) = state.registry.manifest_cache.get(&service.id) else {
        return Vec::new();
    };
    manifest
        .tools
        .into_iter()
        .map(|tool| AvailableTool {
            service_id: service.id.clone(),
            risk_level: tool.risk_level.unwrap_or(service.risk_level),
            tool,
        })
        .collect()
}

/// Runs each call in `plan` through risk classification, sanitization and
/// confirmation gating. Calls that are blocked or awaiting confirmation are
/// pulled out of the executable sub-plan and given a synthetic failed
/// result instead; everything else is handed to the executor unchanged.
fn apply_security(
    state: &AppState,
    auth: &AuthContext,
    plan: &Plan,
    service: &ServiceDefinition,
) -> (Plan, HashMap<String, ToolCallResult>) {
    let mut executable: Vec<ToolCall> = Vec::new();
    let mut gated: HashMap<String, ToolCallResult> = HashMap::new();

    for call in &plan.tool_calls {
        let assessment: RiskAssessment = yukie_security::classify(call, service);
        let sanitize_report = yukie_security::sanitize(&call.params);

        if sanitize_report.is_blocked() {
            state.audit_log.record(
                auth.user_id.as_str(),
                auth.request_id.clone(),
                AuditKind::SecurityWarning,
                blocked_details(call, &sanitize_report.blocked),
            );
            gated.insert(call.id.clone(), blocked_result(call, &sanitize_report.blocked));
            continue;
        }
        if !sanitize_report.warnings.is_empty() {
            tracing::warn!(call_id = %call.id, warnings = ?sanitize_report.warnings, "input sanitizer warnings");
        }

        if assessment.requires_confirmation {
            let request = state.confirmation_gate.create_request(&plan.id, &call.id, assessment.clone());
            state.audit_log.record(
                auth.user_id.as_str(),
                auth.request_id.clone(),
                AuditKind::ConfirmationRequested,
                confirmation_details(&request.id, &assessment),
            );
            gated.insert(call.id.clone(), confirmation_result(call, &request.id));
            continue;
        }

        let mut cleaned = call.clone();
        cleaned.params = sanitize_report.clean;
        executable.push(cleaned);
    }

    let execute_ids: std::collections::HashSet<&str> = executable.iter().map(|c| c.id.as_str()).collect();
    let execution_order: Vec<Vec<String>> = plan
        .execution_order
        .iter()
        .map(|group| group.iter().filter(|id| execute_ids.contains(id.as_str())).cloned().collect::<Vec<_>>())
        .filter(|group: &Vec<String>| !group.is_empty())
        .collect();

    let sub_plan = Plan {
        id: plan.id.clone(),
        message: plan.message.clone(),
        execution_mode: if executable.len() == 1 {
            yukie_domain::model::ExecutionMode::Single
        } else {
            plan.execution_mode
        },
        tool_calls: executable,
        execution_order,
        confidence: plan.confidence,
        reasoning: plan.reasoning.clone(),
        created_at: plan.created_at,
    };

    (sub_plan, gated)
}

fn blocked_result(call: &ToolCall, reasons: &[String]) -> ToolCallResult {
    ToolCallResult {
        id: call.id.clone(),
        service_id: call.service_id.clone(),
        tool_name: call.tool_name.clone(),
        success: false,
        result: None,
        error: Some(ToolError {
            code: "SECURITY_BLOCKED".to_string(),
            message: reasons.join("; "),
            details: None,
        }),
        duration_ms: 0,
    }
}

fn confirmation_result(call: &ToolCall, confirmation_id: &str) -> ToolCallResult {
    ToolCallResult {
        id: call.id.clone(),
        service_id: call.service_id.clone(),
        tool_name: call.tool_name.clone(),
        success: false,
        result: None,
        error: Some(ToolError {
            code: "CONFIRMATION_REQUIRED".to_string(),
            message: "this action requires explicit confirmation before it can run".to_string(),
            details: Some(serde_json::json!({ "confirmationId": confirmation_id })),
        }),
        duration_ms: 0,
    }
}

fn blocked_details(call: &ToolCall, reasons: &[String]) -> HashMap<String, Value> {
    let mut details = HashMap::new();
    details.insert("callId".to_string(), Value::String(call.id.clone()));
    details.insert("reasons".to_string(), serde_json::json!(reasons));
    details
}

fn confirmation_details(confirmation_id: &str, assessment: &RiskAssessment) -> HashMap<String, Value> {
    let mut details = HashMap::new();
    details.insert("confirmationId".to_string(), Value::String(confirmation_id.to_string()));
    details.insert("riskLevel".to_string(), serde_json::to_value(assessment.level).unwrap_or(Value::Null));
    details
}

fn to_details<T: Serialize>(value: &T) -> HashMap<String, Value> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map.into_iter().collect(),
        Ok(other) => HashMap::from([("value".to_string(), other)]),
        Err(_) => HashMap::new(),
    }
}

fn apology_reply(_original_message: &str) -> String {
    "I'm not sure how to help with that yet — could you rephrase or try a different request?".to_string()
}

async fn direct_llm_reply(llm: &Arc<dyn yukie_providers::LlmProvider>, message: &str, model: Option<String>) -> String {
    let mut req = LlmChatRequest::new(
        "You are a helpful assistant. Answer directly; you have no tools available right now.",
        message,
    );
    req.model = model;
    match llm.chat(req).await {
        Ok(resp) if !resp.content.trim().is_empty() => resp.content,
        _ => apology_reply(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use yukie_domain::config::Config;
    use yukie_domain::model::{
        AuthMethod, ExecutionMode, RiskLevel, ServiceAuth, ServiceDefinition, ServiceEndpoints, Transport,
    };
    use yukie_providers::NullProvider;
    use yukie_registry::ServiceRegistry;
    use yukie_router::RouterConfig;
    use yukie_security::{AuditLog, ConfirmationGate};

    fn test_state() -> AppState {
        AppState {
            config: Arc::new(Config::default()),
            registry: Arc::new(ServiceRegistry::new(300)),
            llm: Arc::new(NullProvider),
            router_config: Arc::new(RouterConfig::default()),
            http: reqwest::Client::new(),
            confirmation_gate: Arc::new(ConfirmationGate::new(300)),
            audit_log: Arc::new(AuditLog::new(100)),
            jwt_secret: Arc::new(b"test-secret".to_vec()),
            started_at: Instant::now(),
        }
    }

    fn test_auth() -> AuthContext {
        AuthContext {
            user_id: "u1".to_string(),
            scopes: [CHAT_SCOPE.to_string()].into_iter().collect(),
            request_id: Some("req-1".to_string()),
            utc_offset_minutes: None,
        }
    }

    fn test_service() -> ServiceDefinition {
        ServiceDefinition {
            id: "helpdesk".to_string(),
            name: "Helpdesk".to_string(),
            description: "ticketing".to_string(),
            base_url: "http://helpdesk.internal".to_string(),
            transport: Transport::Http,
            auth: ServiceAuth { method: AuthMethod::None, required_scopes: Vec::new() },
            endpoints: ServiceEndpoints {
                health: "/health".to_string(),
                meta: "/meta".to_string(),
                actions: "/actions".to_string(),
                invoke: "/invoke".to_string(),
            },
            capabilities: Vec::new(),
            tags: Vec::new(),
            keywords: Vec::new(),
            risk_level: RiskLevel::Low,
            enabled: true,
            priority: 0,
        }
    }

    fn call(id: &str, tool_name: &str, params: HashMap<String, Value>) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            service_id: "helpdesk".to_string(),
            tool_name: tool_name.to_string(),
            params,
            depends_on: Vec::new(),
            risk_level: RiskLevel::Low,
        }
    }

    fn plan_of(calls: Vec<ToolCall>) -> Plan {
        let execution_order = vec![calls.iter().map(|c| c.id.clone()).collect()];
        Plan {
            id: "plan-1".to_string(),
            message: "do the thing".to_string(),
            tool_calls: calls,
            execution_mode: ExecutionMode::Sequential,
            execution_order,
            confidence: 0.9,
            reasoning: "test plan".to_string(),
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn validate_request_rejects_empty_message() {
        let body = ChatApiRequest { message: "   ".to_string(), conversation_id: None, model: None };
        assert!(validate_request(&body).is_err());
    }

    #[test]
    fn validate_request_rejects_oversized_message() {
        let body = ChatApiRequest { message: "x".repeat(MAX_MESSAGE_LEN + 1), conversation_id: None, model: None };
        assert!(validate_request(&body).is_err());
    }

    #[test]
    fn validate_request_accepts_reasonable_message() {
        let body = ChatApiRequest { message: "hello".to_string(), conversation_id: None, model: None };
        assert!(validate_request(&body).is_ok());
    }

    #[test]
    fn apply_security_passes_through_clean_low_risk_call() {
        let state = test_state();
        let auth = test_auth();
        let service = test_service();
        let params = HashMap::from([("ticketId".to_string(), Value::String("T-1".to_string()))]);
        let plan = plan_of(vec![call("c1", "lookup_ticket", params)]);

        let (sub_plan, gated) = apply_security(&state, &auth, &plan, &service);

        assert_eq!(sub_plan.tool_calls.len(), 1);
        assert!(gated.is_empty());
    }

    #[test]
    fn apply_security_blocks_sql_injection_params() {
        let state = test_state();
        let auth = test_auth();
        let service = test_service();
        let params = HashMap::from([(
            "query".to_string(),
            Value::String("foo'; DROP TABLE users; --".to_string()),
        )]);
        let plan = plan_of(vec![call("c1", "run_query", params)]);

        let (sub_plan, gated) = apply_security(&state, &auth, &plan, &service);

        assert!(sub_plan.tool_calls.is_empty());
        let result = gated.get("c1").expect("blocked call recorded");
        assert!(!result.success);
        assert_eq!(result.error.as_ref().unwrap().code, "SECURITY_BLOCKED");
    }

    #[test]
    fn apply_security_gates_destructive_tool_behind_confirmation() {
        let state = test_state();
        let auth = test_auth();
        let service = test_service();
        let params = HashMap::from([("ticketId".to_string(), Value::String("T-1".to_string()))]);
        let plan = plan_of(vec![call("c1", "delete_ticket", params)]);

        let (sub_plan, gated) = apply_security(&state, &auth, &plan, &service);

        assert!(sub_plan.tool_calls.is_empty());
        let result = gated.get("c1").expect("gated call recorded");
        assert_eq!(result.error.as_ref().unwrap().code, "CONFIRMATION_REQUIRED");
    }

    #[test]
    fn routing_disabled_recognizes_false_and_zero() {
        std::env::set_var("ENABLE_ROUTING", "false");
        assert!(routing_disabled());
        std::env::set_var("ENABLE_ROUTING", "0");
        assert!(routing_disabled());
        std::env::set_var("ENABLE_ROUTING", "true");
        assert!(!routing_disabled());
        std::env::remove_var("ENABLE_ROUTING");
        assert!(!routing_disabled());
    }
}
