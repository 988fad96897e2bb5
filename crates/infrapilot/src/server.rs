//! JSON HTTP server for the chat boundary.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/chat` | Advance a conversation by one turn |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! Error responses carry a flat body:
//!
//! ```json
//! { "error": "No message provided" }
//! ```
//!
//! A missing or empty `message` is a 400. Every other failure —
//! classifier, generator, or engine — is logged with context and
//! collapsed into a generic 500 with the opaque message
//! `"I encountered an error. Please try again."`; internal errors are
//! never leaked to the caller.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted: the original
//! deployment serves a browser frontend from a different origin.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::chat::{ChatReply, ChatRequest, ChatService};
use crate::config::Config;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    service: Arc<ChatService>,
}

/// Starts the chat HTTP server.
///
/// Binds to the address configured in `[server].bind` and runs until
/// the process is terminated.
pub async fn run_server(config: &Config, service: Arc<ChatService>) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/chat", post(handle_chat))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { service });

    tracing::info!("chat server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// Flat JSON error body.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    /// Generic 500 with the opaque user-facing message.
    fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "I encountered an error. Please try again.".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

// ============ GET /health ============

/// JSON response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /chat ============

/// Handler for `POST /chat`. One call advances one conversational turn.
async fn handle_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatReply>, AppError> {
    match state.service.handle(request).await {
        Ok(reply) => Ok(Json(reply)),
        Err(err) if err.is_client_error() => Err(AppError::bad_request(match err {
            infrapilot_core::Error::BadRequest(message) => message,
            _ => "bad request".to_string(),
        })),
        Err(err) => {
            tracing::error!(error = %err, "chat turn failed");
            Err(AppError::internal())
        }
    }
}
