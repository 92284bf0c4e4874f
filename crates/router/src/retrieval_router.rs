//! Lexical pre-filtering + LLM final selection (spec §4.5).

use crate::keyword_extractor::{extract, Intent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use yukie_domain::model::{AuthContext, CandidateTool, RiskLevel, ServiceDefinition};
use yukie_providers::{extract_json, ChatRequest, LlmProvider};

#[derive(Debug, Clone, Copy)]
pub struct RouterWeights {
    pub keyword: f64,
    pub tag: f64,
    pub capability: f64,
    /// Reserved for a future learned/embedding scorer (spec §1 non-goal).
    pub semantic: f64,
    pub priority: f64,
}

impl Default for RouterWeights {
    fn default() -> Self {
        RouterWeights {
            keyword: 1.0,
            tag: 1.5,
            capability: 2.0,
            semantic: 2.5,
            priority: 0.5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub weights: RouterWeights,
    pub min_score: f64,
    pub max_candidates: usize,
    pub model: Option<String>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        RouterConfig {
            weights: RouterWeights::default(),
            min_score: 0.1,
            max_candidates: 15,
            model: None,
        }
    }
}

pub struct RouteRequest<'a> {
    pub message: &'a str,
    pub auth: &'a AuthContext,
    pub model: Option<String>,
    pub max_candidates: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteResult {
    pub target_service: String,
    pub confidence: f64,
    pub reasoning: String,
    pub candidates: Vec<CandidateTool>,
    pub retrieval_time_ms: u64,
    pub routing_time_ms: u64,
}

#[derive(Debug, Deserialize)]
struct LlmRouteDecision {
    #[serde(rename = "targetService")]
    target_service: String,
    confidence: f64,
    reasoning: String,
}

/// Substring match either direction, case-insensitively.
fn contains_either(a: &str, b: &str) -> bool {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    a.contains(&b) || b.contains(&a)
}

fn score_service(
    svc: &ServiceDefinition,
    extracted: &crate::keyword_extractor::ExtractedMessage,
    weights: &RouterWeights,
) -> f64 {
    let mut score = 0.0f64;
    let description_lower = svc.description.to_lowercase();

    for kw in &extracted.keywords {
        if svc.keywords.iter().any(|sk| contains_either(sk, kw)) {
            let exact = svc.keywords.iter().any(|sk| sk.to_lowercase() == *kw);
            score += weights.keyword * if exact { 2.0 } else { 1.0 };
        }
        if svc.capabilities.iter().any(|c| contains_either(c, kw)) {
            score += weights.capability * 2.0;
        }
        if description_lower.contains(kw.as_str()) {
            score += weights.keyword * 0.5;
        }
    }

    for phrase in &extracted.phrases {
        if svc.capabilities.iter().any(|c| contains_either(c, phrase)) {
            score += weights.capability * 3.0;
        }
        if description_lower.contains(phrase.as_str()) {
            score += weights.keyword * 1.0;
        }
    }

    for tag in &extracted.keywords {
        if svc.tags.iter().any(|t| t.to_lowercase() == *tag) {
            score += weights.tag * 2.0;
        }
    }

    for intent in &extracted.intents {
        match intent {
            Intent::CheckIn | Intent::Create => {
                if svc
                    .capabilities
                    .iter()
                    .any(|c| ["check-in", "log", "record"].iter().any(|k| c.to_lowercase().contains(k)))
                {
                    score += weights.capability * 2.0;
                }
            }
            Intent::Query | Intent::Statistics => {
                if svc
                    .capabilities
                    .iter()
                    .any(|c| ["stat", "query", "history"].iter().any(|k| c.to_lowercase().contains(k)))
                {
                    score += weights.capability * 2.0;
                }
            }
            _ => {}
        }
    }

    score += (svc.priority as f64 / 100.0) * weights.priority;
    score
}

/// Scores every enabled service and returns ranked candidates above
/// `min_score`, truncated to `max_candidates`.
pub fn retrieve_candidates(
    message: &str,
    services: &[ServiceDefinition],
    config: &RouterConfig,
) -> Vec<CandidateTool> {
    let extracted = extract(message);
    let mut candidates: Vec<CandidateTool> = services
        .iter()
        .filter(|s| s.enabled)
        .map(|svc| {
            let score = score_service(svc, &extracted, &config.weights);
            CandidateTool {
                service_id: svc.id.clone(),
                service_name: svc.name.clone(),
                service_description: svc.description.clone(),
                tool: None,
                score,
                match_type: "lexical".to_string(),
                priority: svc.priority,
                risk_level: svc.risk_level,
            }
        })
        .filter(|c| c.score >= config.min_score)
        .collect();

    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.priority.cmp(&a.priority))
    });
    candidates.truncate(config.max_candidates);
    candidates
}

fn candidate_list_prompt(candidates: &[CandidateTool]) -> String {
    candidates
        .iter()
        .map(|c| {
            format!(
                "- id={} name=\"{}\" risk={:?} score={:.2}: {}",
                c.service_id, c.service_name, c.risk_level, c.score, c.service_description
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Routes a single message to at most one service (spec §4.5).
///
/// 1. lexical `retrieve_candidates`; 2. if empty, `targetService = "none"`
///    with confidence 1.0; 3. otherwise ask the LLM to pick from the
///    candidate set, parsing its strict-JSON reply with multi-strategy
///    extraction. On any LLM failure: `{targetService: "none", confidence: 0}`.
pub async fn route(
    llm: &Arc<dyn LlmProvider>,
    req: RouteRequest<'_>,
    services: &[ServiceDefinition],
    config: &RouterConfig,
) -> RouteResult {
    let retrieval_start = std::time::Instant::now();
    let mut cfg = config.clone();
    if let Some(max) = req.max_candidates {
        cfg.max_candidates = max;
    }
    let candidates = retrieve_candidates(req.message, services, &cfg);
    let retrieval_time_ms = retrieval_start.elapsed().as_millis() as u64;

    if candidates.is_empty() {
        tracing::info!(user_id = %req.auth.user_id, "retrieval found no candidates");
        return RouteResult {
            target_service: "none".to_string(),
            confidence: 1.0,
            reasoning: "no candidate services matched the message".to_string(),
            candidates,
            retrieval_time_ms,
            routing_time_ms: 0,
        };
    }

    let routing_start = std::time::Instant::now();
    let model = req.model.or_else(|| cfg.model.clone());
    let prompt = format!(
        "You are a request router. Given the user message and a list of candidate \
         services, choose the single best service to handle the request.\n\n\
         User message: {}\n\nCandidates:\n{}\n\n\
         Respond with strict JSON only: {{\"targetService\": <id or \"none\">, \
         \"confidence\": <0..1>, \"reasoning\": <short text>}}.",
        req.message,
        candidate_list_prompt(&candidates)
    );

    let mut chat_req = ChatRequest::new(
        "You are a precise request router that replies with strict JSON only.",
        prompt,
    );
    chat_req.json_mode = true;
    chat_req.model = model;
    chat_req.temperature = Some(0.0);

    let result = match llm.chat(chat_req).await {
        Ok(resp) => extract_json::<LlmRouteDecision>(&resp.content),
        Err(err) => {
            tracing::warn!(error = %err, "retrieval router LLM call failed");
            None
        }
    };

    let routing_time_ms = routing_start.elapsed().as_millis() as u64;

    let (target_service, confidence, reasoning) = match result {
        Some(decision) => (decision.target_service, decision.confidence, decision.reasoning),
        None => ("none".to_string(), 0.0, "Routing failed".to_string()),
    };

    RouteResult {
        target_service,
        confidence,
        reasoning,
        candidates,
        retrieval_time_ms,
        routing_time_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use yukie_domain::model::{AuthMethod, ServiceAuth, ServiceEndpoints, Transport};
    use yukie_providers::{ChatResponse, NullProvider};

    fn svc(id: &str, capabilities: &[&str], keywords: &[&str], tags: &[&str]) -> ServiceDefinition {
        ServiceDefinition {
            id: id.into(),
            name: id.into(),
            description: "generic habit tracking service".into(),
            base_url: "https://example.com".into(),
            transport: Transport::Http,
            auth: ServiceAuth {
                method: AuthMethod::Bearer,
                required_scopes: vec![],
            },
            endpoints: ServiceEndpoints {
                health: "/health".into(),
                meta: "/meta".into(),
                actions: "/actions".into(),
                invoke: "/invoke".into(),
            },
            capabilities: capabilities.iter().map(|s| s.to_string()).collect(),
            tags: tags.iter().map(|s| s.to_string()).collect(),
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            risk_level: RiskLevel::Low,
            enabled: true,
            priority: 0,
        }
    }

    fn auth() -> AuthContext {
        AuthContext {
            user_id: "u1".into(),
            scopes: HashSet::new(),
            request_id: None,
            utc_offset_minutes: None,
        }
    }

    #[test]
    fn retrieve_candidates_ranks_keyword_matches_above_threshold() {
        let services = vec![
            svc("habit-svc", &["log habit", "check-in"], &["habit", "streak"], &["productivity"]),
            svc("weather-svc", &["forecast"], &["weather"], &["info"]),
        ];
        let candidates = retrieve_candidates("Log coding habit streak", &services, &RouterConfig::default());
        assert!(!candidates.is_empty());
        assert_eq!(candidates[0].service_id, "habit-svc");
    }

    #[test]
    fn below_min_score_candidates_are_discarded() {
        let services = vec![svc("unrelated", &["payments"], &["invoice"], &["finance"])];
        let candidates = retrieve_candidates("what is the capital of France", &services, &RouterConfig::default());
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn empty_candidates_short_circuit_with_full_confidence() {
        let llm: Arc<dyn LlmProvider> = Arc::new(NullProvider);
        let services = vec![svc("unrelated", &["payments"], &["invoice"], &["finance"])];
        let result = route(
            &llm,
            RouteRequest {
                message: "what is the capital of France?",
                auth: &auth(),
                model: None,
                max_candidates: None,
            },
            &services,
            &RouterConfig::default(),
        )
        .await;
        assert_eq!(result.target_service, "none");
        assert_eq!(result.confidence, 1.0);
    }

    struct StubProvider(String);

    #[async_trait::async_trait]
    impl LlmProvider for StubProvider {
        async fn chat(&self, _req: ChatRequest) -> yukie_domain::Result<ChatResponse> {
            Ok(ChatResponse {
                content: self.0.clone(),
                model: "stub".into(),
                finish_reason: None,
            })
        }
        fn provider_id(&self) -> &str {
            "stub"
        }
    }

    #[tokio::test]
    async fn llm_decision_is_parsed_from_fenced_json() {
        let llm: Arc<dyn LlmProvider> = Arc::new(StubProvider(
            "```json\n{\"targetService\": \"habit-svc\", \"confidence\": 0.9, \"reasoning\": \"matches\"}\n```"
                .to_string(),
        ));
        let services = vec![svc("habit-svc", &["log habit"], &["habit"], &[])];
        let result = route(
            &llm,
            RouteRequest {
                message: "log my habit",
                auth: &auth(),
                model: None,
                max_candidates: None,
            },
            &services,
            &RouterConfig::default(),
        )
        .await;
        assert_eq!(result.target_service, "habit-svc");
        assert_eq!(result.confidence, 0.9);
    }

    #[tokio::test]
    async fn llm_parse_failure_falls_back_to_none() {
        let llm: Arc<dyn LlmProvider> = Arc::new(StubProvider("not json at all".to_string()));
        let services = vec![svc("habit-svc", &["log habit"], &["habit"], &[])];
        let result = route(
            &llm,
            RouteRequest {
                message: "log my habit",
                auth: &auth(),
                model: None,
                max_candidates: None,
            },
            &services,
            &RouterConfig::default(),
        )
        .await;
        assert_eq!(result.target_service, "none");
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.reasoning, "Routing failed");
    }
}
