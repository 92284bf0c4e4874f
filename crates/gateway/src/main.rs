mod api;
mod auth;
mod cli;
mod error_response;
mod state;

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::GovernorLayer;
use tracing_subscriber::EnvFilter;

use yukie_domain::config::{Config, ConfigSeverity};
use yukie_providers::{LlmProvider, NullProvider};
use yukie_registry::ServiceRegistry;
use yukie_router::RouterConfig;
use yukie_security::{AuditLog, ConfirmationGate};

use cli::{Cli, Command};
use state::AppState;

const AUDIT_LOG_CAPACITY: usize = 10_000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None => {
            init_tracing();
            let config = cli::load_config("config.yaml")?;
            run_server(Arc::new(config)).await
        }
        Some(Command::Serve { config: config_path }) => {
            init_tracing();
            let config = cli::load_config(&config_path)?;
            run_server(Arc::new(config)).await
        }
        Some(Command::Validate { config }) => {
            let config = cli::load_config(&config)?;
            let issues = config.validate();
            for issue in &issues {
                match issue.severity {
                    ConfigSeverity::Warning => println!("[WARNING] {}: {}", issue.field, issue.message),
                    ConfigSeverity::Error => println!("[ERROR] {}: {}", issue.field, issue.message),
                }
            }
            if Config::has_errors(&issues) {
                std::process::exit(1);
            }
            println!("configuration is valid");
            Ok(())
        }
    }
}

/// Initializes structured JSON tracing (only for the `serve` command).
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,yukie_gateway=debug")))
        .json()
        .init();
}

async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!("yukie-gateway starting");

    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if Config::has_errors(&issues) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count()
        );
    }

    let jwt_secret = Arc::new(
        config
            .auth
            .jwt_secret
            .clone()
            .context("JWT_SECRET must be set")?
            .into_bytes(),
    );

    // ── Service registry ──────────────────────────────────────────────
    let registry = Arc::new(ServiceRegistry::new(config.registry.manifest_cache_ttl));
    registry.load_from_yaml(config.services.clone()).context("registering configured services")?;
    tracing::info!(services = config.services.len(), "service registry ready");

    // ── LLM provider ───────────────────────────────────────────────────
    // Concrete vendor backends are out of scope (spec §1); the gateway
    // boots with the null provider, which every call site already treats
    // as a graceful-degradation path.
    let llm: Arc<dyn LlmProvider> = Arc::new(NullProvider);
    tracing::warn!("no LLM provider configured — running with NullProvider (deterministic fallbacks only)");

    // ── Router tuning ──────────────────────────────────────────────────
    let router_config = Arc::new(RouterConfig {
        max_candidates: config.registry.max_routing_candidates,
        model: Some(config.llm.model.clone()),
        ..RouterConfig::default()
    });

    // ── Security layer ────────────────────────────────────────────────
    let confirmation_gate = Arc::new(ConfirmationGate::new(config.auth.confirmation_ttl_seconds));
    let audit_log = Arc::new(AuditLog::new(AUDIT_LOG_CAPACITY));
    tracing::info!("security layer (risk classifier, confirmation gate, audit log) ready");

    let state = AppState {
        config: config.clone(),
        registry: registry.clone(),
        llm,
        router_config,
        http: reqwest::Client::new(),
        confirmation_gate: confirmation_gate.clone(),
        audit_log,
        jwt_secret,
        started_at: Instant::now(),
    };

    // ── Background maintenance ─────────────────────────────────────────
    // The manifest cache's own `start_background_refresh` expects an
    // `Arc<ManifestCache>` receiver; since the cache lives inline inside
    // `ServiceRegistry`, maintenance is instead a plain interval loop that
    // sweeps expired manifests and re-probes service health.
    let registry_for_maintenance = registry.clone();
    let health_check_interval = config.registry.health_check_interval;
    let maintenance_handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(health_check_interval.max(1)));
        loop {
            ticker.tick().await;
            let removed = registry_for_maintenance.manifest_cache.cleanup();
            if removed > 0 {
                tracing::debug!(removed, "expired manifest cache entries swept");
            }
            registry_for_maintenance.check_all_health().await;
        }
    });
    tracing::info!(interval_seconds = health_check_interval, "manifest/health maintenance loop started");

    let confirmation_gate_for_sweep = confirmation_gate;
    let confirmation_sweep_handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(30));
        loop {
            ticker.tick().await;
            let expired = confirmation_gate_for_sweep.expire_stale();
            if !expired.is_empty() {
                tracing::debug!(count = expired.len(), "confirmation requests expired");
            }
        }
    });
    tracing::info!("confirmation gate expiry sweep started (30s tick)");

    // ── Rate limiting (per-IP token bucket) ────────────────────────────
    let requests_per_second = ((config.rate_limit.burst as f64 / config.rate_limit.window_seconds.max(1) as f64).ceil()
        as u64)
        .max(1);
    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(requests_per_second)
            .burst_size(config.rate_limit.burst)
            .finish()
            .context("rate_limit: requests_per_second and burst_size must be > 0")?,
    );
    tracing::info!(
        bucket = %config.rate_limit.bucket,
        requests_per_second,
        burst = config.rate_limit.burst,
        "rate limiting enabled"
    );

    let app = api::router(state.clone())
        .layer(GovernorLayer { config: governor_config })
        .with_state(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("binding to {addr}"))?;
    tracing::info!(addr = %addr, "yukie-gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("axum server error")?;

    // Background maintenance loops are detached; join handles let shutdown
    // stop them promptly (spec §9 "must stop promptly") instead of leaving
    // them running past the listener's own graceful drain.
    maintenance_handle.abort();
    confirmation_sweep_handle.abort();
    tracing::info!("yukie-gateway shut down");
    Ok(())
}

/// Resolves once SIGINT (ctrl-c) or, on unix, SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sig) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            sig.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received, draining in-flight requests");
}
