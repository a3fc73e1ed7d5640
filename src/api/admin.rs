//! Admin API endpoints
//!
//! Guarded by the key from `PROMPTER_API_KEY`. A gateway running without
//! that key is assumed to sit on a trusted network and leaves the admin
//! routes open.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::post,
    Json, Router,
};
use serde::Serialize;

use super::ApiState;
use crate::corpus::Corpus;

#[derive(Serialize)]
pub struct ReloadResponse {
    pub status: &'static str,
    pub entries: usize,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Build admin router; all routes require the API key
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/reload", post(reload))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ))
        .with_state(state)
}

/// Bearer key from the Authorization header
fn bearer_key(req: &Request) -> Option<&str> {
    req.headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Reject admin requests that do not carry the configured key
async fn require_api_key(
    State(state): State<Arc<ApiState>>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = &state.api_key else {
        tracing::warn!("PROMPTER_API_KEY not set, accepting unauthenticated admin request");
        return Ok(next.run(req).await);
    };

    match bearer_key(&req) {
        Some(key) if key == expected => Ok(next.run(req).await),
        Some(_) => {
            tracing::warn!("admin request with wrong API key rejected");
            Err(StatusCode::UNAUTHORIZED)
        }
        None => {
            tracing::debug!("admin request without API key rejected");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

/// Re-read the knowledge base and swap it in atomically
///
/// On failure the previous corpus stays live.
async fn reload(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<ReloadResponse>, (StatusCode, Json<ErrorResponse>)> {
    let corpus = Corpus::load(&state.knowledge_base).map_err(|e| {
        tracing::error!(error = %e, path = %state.knowledge_base.display(), "knowledge base reload failed");
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
    })?;

    let entries = corpus.len();
    state.engine.reload(corpus).await.map_err(|e| {
        tracing::error!(error = %e, "index rebuild failed, keeping previous corpus");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
    })?;

    Ok(Json(ReloadResponse {
        status: "ok",
        entries,
    }))
}
