mod handlers;
pub mod middleware;

use axum::{
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use mission_deck_core::models::{Decision, DomainEvent};
use serde_json::Value;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::gateway::{GatewayClient, GatewayError};
use crate::hub;
use crate::state::StateHandle;

pub use middleware::SecurityConfig;

/// Shared by the HTTP handlers and the observer hub.
#[derive(Clone)]
pub struct AppState {
    pub state: StateHandle,
    pub gateway: GatewayClient,
}

impl AppState {
    pub fn new(state: StateHandle, gateway: GatewayClient) -> Self {
        Self { state, gateway }
    }

    /// Forward a decision to the gateway. The ledger entry is only dropped
    /// once the gateway has accepted it.
    pub async fn resolve_approval(&self, id: &str, decision: Decision) -> Result<Value, GatewayError> {
        let reply = self.gateway.resolve_approval(id, decision).await?;
        tracing::info!(id, decision = decision.as_str(), "approval resolved");
        self.state.apply(DomainEvent::ApprovalResolved {
            id: id.to_string(),
            decision,
        });
        Ok(reply)
    }
}

pub fn create_router(app: AppState) -> Router {
    create_router_with_config(app, SecurityConfig::disabled())
}

pub fn create_router_with_config(app: AppState, security: SecurityConfig) -> Router {
    let protected = Router::new()
        .route("/state", get(handlers::get_state))
        .route("/approvals", get(handlers::list_approvals))
        .route("/approvals/{id}/resolve", post(handlers::resolve_approval))
        .route("/missions", post(handlers::submit_mission))
        .route_layer(from_fn_with_state(security.clone(), middleware::auth_middleware));

    let api = Router::new()
        .merge(protected)
        .route("/health", get(handlers::health));

    let ws = Router::new()
        .route("/ws", get(hub::ws_handler))
        .route_layer(from_fn_with_state(security.clone(), middleware::auth_middleware));

    Router::new()
        .merge(ws)
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&security))
        .with_state(app)
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    match &security.cors_origins {
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        }
        None => CorsLayer::permissive(),
    }
}
