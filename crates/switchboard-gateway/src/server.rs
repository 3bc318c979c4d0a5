//! Gateway HTTP server — Axum router over the core dispatcher

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use switchboard_core::{Settings, handle_chat};

use crate::protocol::{ChatReply, ChatRequest, ErrorDetail, error_response};

/// Shared state for all requests — the immutable settings and start time.
/// There is no per-conversation state: contexts are rebuilt per call.
#[derive(Clone)]
pub struct GatewayState {
    pub settings: Arc<Settings>,
    pub start_time: std::time::Instant,
}

/// The gateway server
pub struct GatewayServer {
    state: GatewayState,
    bind: SocketAddr,
}

impl GatewayServer {
    /// Create a new gateway server
    pub fn new(bind: SocketAddr, settings: Arc<Settings>) -> Self {
        let state = GatewayState {
            settings,
            start_time: std::time::Instant::now(),
        };
        Self { state, bind }
    }

    /// Build the Axum router
    pub fn router(&self) -> Router {
        Router::new()
            .route("/api/v1/chat", post(chat_handler))
            .route("/api/status", get(status_handler))
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Start the server (blocks until shutdown)
    pub async fn run(self) -> anyhow::Result<()> {
        let router = self.router();
        let listener = tokio::net::TcpListener::bind(self.bind).await?;
        info!("Gateway listening on {}", self.bind);

        axum::serve(listener, router).await?;

        Ok(())
    }

    /// Start the server in the background, returning a handle
    pub fn spawn(self) -> tokio::task::JoinHandle<anyhow::Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}

// ── HTTP Handlers ──

async fn chat_handler(
    State(state): State<GatewayState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatReply>, (StatusCode, Json<ErrorDetail>)> {
    match handle_chat(&state.settings, &request).await {
        Ok(reply) => Ok(Json(reply)),
        Err(err) => {
            error!(
                "chat request for {} failed: {err}",
                request.client_type
            );
            Err(error_response(&err))
        }
    }
}

async fn status_handler(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    let uptime = state.start_time.elapsed().as_secs();
    Json(serde_json::json!({
        "status": "ok",
        "uptime_secs": uptime,
        "providers": ["openai", "deepseek", "gemini", "ollama"],
    }))
}
