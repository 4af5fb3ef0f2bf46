use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sfunet_services::auth::Grants;

use crate::error::ApiError;
use crate::state::AppState;

/// Issues a bearer credential for the wire-level `/api/token` route. Minting
/// policy (who may request which grants) is explicitly out of scope for the
/// control plane core; this endpoint exists so a self-contained deployment
/// has something to hand a client, and should be replaced or removed by an
/// integrator with a real identity provider in front of it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    pub identity: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub room: Option<String>,
    #[serde(default)]
    pub metadata: Value,
    #[serde(default)]
    pub grants: Grants,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    #[serde(rename = "expiresIn")]
    pub expires_in: u64,
}

pub async fn issue_token(
    State(state): State<AppState>,
    Json(body): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let token = state
    .credentials
    .issue(body.identity, body.display_name, body.room, body.metadata, body.grants)?;

    Ok(Json(TokenResponse {
                token,
                expires_in: state.settings.credentials.expires_in,
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: i64,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
            status: "ok",
            timestamp: chrono::Utc::now().timestamp(),
    })
}
