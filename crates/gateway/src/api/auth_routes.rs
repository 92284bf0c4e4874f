//! `GET /auth/me` and `POST /auth/logout` (spec §6).
//!
//! Tokens are stateless HMAC-signed bearer tokens — there is no server-side
//! session to invalidate. Logout is an audit-logged no-op from the token's
//! point of view; a real deployment would pair it with a client-side token
//! discard or a short-lived denylist, neither of which this spec defines.

use axum::extract::Extension;
use axum::response::Json;
use serde::Serialize;
use serde_json::json;
use yukie_domain::model::AuthContext;

#[derive(Serialize)]
pub struct MeResponse {
    #[serde(rename = "userId")]
    user_id: String,
    scopes: Vec<String>,
    #[serde(rename = "requestId", skip_serializing_if = "Option::is_none")]
    request_id: Option<String>,
}

pub async fn me(Extension(auth): Extension<AuthContext>) -> Json<MeResponse> {
    let mut scopes: Vec<String> = auth.scopes.iter().cloned().collect();
    scopes.sort();
    Json(MeResponse {
        user_id: auth.user_id,
        scopes,
        request_id: auth.request_id,
    })
}

pub async fn logout(Extension(auth): Extension<AuthContext>) -> Json<serde_json::Value> {
    tracing::info!(user_id = %auth.user_id, "logout requested");
    Json(json!({ "message": "logged out" }))
}
