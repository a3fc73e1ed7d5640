//! HTTP and WebSocket API server for the prompter gateway

pub mod admin;
pub mod status;
pub mod ws;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::matching::MatchEngine;
use crate::pipeline::Pipeline;
use crate::session::SessionRegistry;
use crate::Result;

/// Shared state for API handlers
pub struct ApiState {
    pub registry: Arc<SessionRegistry>,
    pub pipeline: Arc<Pipeline>,
    pub engine: Arc<MatchEngine>,
    /// Knowledge base path, re-read on admin reload
    pub knowledge_base: PathBuf,
    /// API key guarding admin endpoints
    pub api_key: Option<String>,
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
}

impl ApiServer {
    /// Create a server over the shared state
    #[must_use]
    pub fn new(state: Arc<ApiState>, port: u16) -> Self {
        Self { state, port }
    }

    /// Build the router with all routes
    #[must_use]
    pub fn router(&self) -> Router {
        let router = Router::new()
            .nest("/api/admin", admin::router(self.state.clone()))
            .nest("/ws", ws::router(self.state.clone()))
            .merge(status::router(self.state.clone()));

        // CORS for browser-hosted device pages
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router.layer(cors).layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, self.router())
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}
