//! Concierge server library logic.

pub mod api_chat;
pub mod api_telephony;
pub mod api_transcribe;
pub mod api_ws;
pub mod config;

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use concierge_agent::Agent;
use concierge_db::DbPool;
use concierge_voice::{RecognizerFactory, Transcriber};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// The conversational agent.
    pub agent: Arc<dyn Agent>,
    /// One-shot audio transcription service.
    pub transcriber: Arc<dyn Transcriber>,
    /// Factory for streaming recognition sessions (one per call).
    pub recognizer_factory: Arc<dyn RecognizerFactory>,
    /// Externally reachable hostname, used in the telephony stream callback.
    pub public_host: String,
}

/// An API failure carrying the status code and client-facing message.
///
/// Serializes as `{"message": "..."}` so callers always get the same error
/// shape regardless of which endpoint failed.
#[derive(Debug)]
pub enum ApiError {
    /// Request payload failed validation.
    BadRequest(String),
    /// The addressed resource does not exist.
    NotFound(String),
    /// An internal collaborator failed; the detail is logged, not returned.
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(m) | ApiError::NotFound(m) | ApiError::Internal(m) => m,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({ "message": self.message() }));
        (status, body).into_response()
    }
}

/// Maximum request body size (2 MiB). Protects against OOM from oversized payloads.
const MAX_REQUEST_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/customer-service/chat", post(api_chat::chat_handler))
        .route(
            "/customer-service/audios/transcribe",
            post(api_transcribe::transcribe_handler),
        )
        .route(
            "/customer-service/voice",
            post(api_telephony::voice_handler),
        )
        .route("/ws", get(api_ws::ws_handler))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
