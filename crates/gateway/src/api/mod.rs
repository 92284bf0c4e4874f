pub mod auth_routes;
pub mod chat;
pub mod health;
pub mod registry_stats;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::auth::require_auth;
use crate::state::AppState;

/// Builds the full API router.
///
/// Routes split into **public** (`GET /health`, no auth) and **protected**
/// (`/chat`, `/auth/*`, `/registry/stats`) gated behind the bearer-token
/// middleware from spec §6.
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new().route("/health", get(health::health));

    let protected = Router::new()
        .route("/chat", post(chat::chat))
        .route("/auth/me", get(auth_routes::me))
        .route("/auth/logout", post(auth_routes::logout))
        .route("/registry/stats", get(registry_stats::registry_stats))
        .route_layer(middleware::from_fn_with_state(state, require_auth));

    public.merge(protected).layer(tower_http::trace::TraceLayer::new_for_http())
}
