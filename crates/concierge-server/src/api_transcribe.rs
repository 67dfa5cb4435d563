//! One-shot audio transcription endpoint.

use crate::{ApiError, AppState};
use axum::{extract::Extension, response::Json};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct TranscribeResponse {
    /// The settled transcript of the configured audio source.
    pub transcribed_text: String,
}

/// POST /customer-service/audios/transcribe
///
/// Reads the fixed local audio source named in configuration and returns
/// its transcript.
pub async fn transcribe_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<TranscribeResponse>, ApiError> {
    let transcribed_text = state.transcriber.transcribe_source().await.map_err(|e| {
        tracing::error!(error = %e, "transcription failed");
        ApiError::Internal("failed to transcribe audio".to_string())
    })?;

    Ok(Json(TranscribeResponse { transcribed_text }))
}
