use std::sync::Arc;
use std::time::Instant;

use yukie_domain::config::Config;
use yukie_providers::LlmProvider;
use yukie_registry::ServiceRegistry;
use yukie_router::RouterConfig;
use yukie_security::{AuditLog, ConfirmationGate};

/// Shared application state passed to all API handlers.
///
/// Fields are grouped by concern:
/// - **Core services** — config, registry, LLM provider
/// - **Routing & execution** — router tuning, shared HTTP client
/// - **Security** — confirmation gate, audit log, bearer-token secret
#[derive(Clone)]
pub struct AppState {
    // ── Core services ─────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub registry: Arc<ServiceRegistry>,
    pub llm: Arc<dyn LlmProvider>,

    // ── Routing & execution ──────────────────────────────────────────
    pub router_config: Arc<RouterConfig>,
    pub http: reqwest::Client,

    // ── Security ──────────────────────────────────────────────────────
    pub confirmation_gate: Arc<ConfirmationGate>,
    pub audit_log: Arc<AuditLog>,
    /// Raw HMAC signing secret backing bearer tokens (spec §6). Loaded
    /// once at startup from `JWT_SECRET`.
    pub jwt_secret: Arc<Vec<u8>>,

    /// Process start time, used for `GET /health` uptime reporting.
    pub started_at: Instant,
}
