//! Service definitions and tool manifests (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Http,
    Stdio,
    Websocket,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    Bearer,
    #[serde(rename = "api-key")]
    ApiKey,
    Oauth2,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceAuth {
    pub method: AuthMethod,
    #[serde(default)]
    pub required_scopes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceEndpoints {
    pub health: String,
    pub meta: String,
    pub actions: String,
    pub invoke: String,
}

/// Immutable configuration entity describing a downstream service.
///
/// Invariant: `id` is unique across the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub base_url: String,
    pub transport: Transport,
    pub auth: ServiceAuth,
    pub endpoints: ServiceEndpoints,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub risk_level: RiskLevel,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub priority: i32,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    #[serde(default)]
    pub enum_values: Option<Vec<String>>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub pattern: Option<String>,
}

/// A single callable tool exposed by a service.
///
/// `name` is dotted (e.g. `habit.log`) and unique within the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub required_scopes: Vec<String>,
    #[serde(default)]
    pub returns_async: bool,
    #[serde(default)]
    pub examples: Vec<serde_json::Value>,
    #[serde(default)]
    pub risk_level: Option<RiskLevel>,
}

/// Cached result of a service's `actions` endpoint.
///
/// Invariant: `now < expires_at` ⇒ served by the cache; otherwise absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolManifest {
    pub service_id: String,
    pub service_name: String,
    pub version: String,
    pub protocol_version: String,
    pub tools: Vec<ToolSchema>,
    pub fetched_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ToolManifest {
    pub fn find_tool(&self, name: &str) -> Option<&ToolSchema> {
        self.tools.iter().find(|t| t.name == name)
    }
}

/// Raw shape of a downstream service's `GET .../actions` response (spec §6).
#[derive(Debug, Clone, Deserialize)]
pub struct ActionsResponse {
    pub actions: Vec<ActionDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActionDef {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub required_scopes: Vec<String>,
    #[serde(default)]
    pub returns_async: Option<bool>,
}

impl From<ActionDef> for ToolSchema {
    fn from(a: ActionDef) -> Self {
        ToolSchema {
            name: a.name,
            description: a.description,
            parameters: a.parameters,
            required_scopes: a.required_scopes,
            returns_async: a.returns_async.unwrap_or(false),
            examples: Vec::new(),
            risk_level: None,
        }
    }
}

/// Transient ranking record produced by the retrieval router (spec §3).
#[derive(Debug, Clone, Serialize)]
pub struct CandidateTool {
    pub service_id: String,
    pub service_name: String,
    pub service_description: String,
    pub tool: Option<ToolSchema>,
    pub score: f64,
    pub match_type: String,
    pub priority: i32,
    pub risk_level: RiskLevel,
}

/// Aggregated health/query statistics (spec §4.3 `getStats`).
#[derive(Debug, Clone, Serialize, Default)]
pub struct RegistryStats {
    pub total_services: usize,
    pub enabled_services: usize,
    pub healthy_services: usize,
    pub cached_manifests: usize,
    pub indexed_terms: HashMap<String, usize>,
}
