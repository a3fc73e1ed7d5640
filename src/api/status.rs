//! Health and status endpoints

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use super::ApiState;
use crate::matching::EngineStats;

/// Liveness response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Gateway status snapshot
#[derive(Serialize)]
pub struct StatusResponse {
    pub asr_loaded: bool,
    pub matcher_loaded: bool,
    pub strategy: String,
    pub listener_connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listener_since: Option<chrono::DateTime<chrono::Utc>>,
    pub speaker_count: usize,
    pub knowledge_base: EngineStats,
}

/// Build status router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/status", get(status))
        .with_state(state)
}

/// Liveness probe - is the service running?
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Operational status for dashboards and device pages
async fn status(State(state): State<Arc<ApiState>>) -> Json<StatusResponse> {
    let knowledge_base = state.engine.stats().await;
    Json(StatusResponse {
        asr_loaded: state.pipeline.asr_loaded(),
        matcher_loaded: knowledge_base.total_questions > 0,
        strategy: state.engine.strategy_id(),
        listener_connected: state.registry.listener_connected(),
        listener_since: state.registry.listener_since(),
        speaker_count: state.registry.speaker_count(),
        knowledge_base,
    })
}
