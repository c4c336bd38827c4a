use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use mission_deck_core::models::{ApprovalRequest, DeckSnapshot, Decision};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::gateway::GatewayError;

// ============================================================
// Error Handling
// ============================================================

/// Map a gateway failure to a status the caller can act on. Remote error
/// text is passed through since it names the approval problem.
fn gateway_error(e: GatewayError) -> (StatusCode, String) {
    let status = match &e {
        GatewayError::NotConnected | GatewayError::Disconnected => StatusCode::SERVICE_UNAVAILABLE,
        GatewayError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        GatewayError::Remote { .. } => StatusCode::BAD_GATEWAY,
        GatewayError::Encode(_) => {
            tracing::error!("Internal error: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            );
        }
    };
    tracing::warn!("Gateway error: {}", e);
    (status, e.to_string())
}

// ============================================================
// Health
// ============================================================

pub async fn health(State(app): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "gateway": { "connected": app.gateway.is_connected() },
    }))
}

// ============================================================
// State
// ============================================================

pub async fn get_state(State(app): State<AppState>) -> Json<DeckSnapshot> {
    Json(app.state.snapshot().as_ref().clone())
}

pub async fn list_approvals(State(app): State<AppState>) -> Json<Vec<ApprovalRequest>> {
    Json(app.state.snapshot().approvals.clone())
}

// ============================================================
// Missions
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitMissionInput {
    #[serde(default)]
    pub agent_id: Option<String>,
    pub command: String,
}

pub async fn submit_mission(
    State(app): State<AppState>,
    Json(input): Json<SubmitMissionInput>,
) -> Result<StatusCode, (StatusCode, String)> {
    if input.command.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "command must not be empty".to_string()));
    }
    if !app.state.submit_mission(input.agent_id, input.command) {
        tracing::error!("Internal error: state actor stopped");
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        ));
    }
    Ok(StatusCode::ACCEPTED)
}

// ============================================================
// Approvals
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveApprovalInput {
    pub allow: bool,
}

pub async fn resolve_approval(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<ResolveApprovalInput>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let decision = Decision::from_allow(input.allow);
    app.resolve_approval(&id, decision)
        .await
        .map(|_| Json(serde_json::json!({ "id": id, "decision": decision.as_str() })))
        .map_err(gateway_error)
}
