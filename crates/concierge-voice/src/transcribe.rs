//! One-shot transcription of a local audio file.

use crate::config::TranscriberConfig;
use crate::error::VoiceError;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;

/// The transcription collaborator as seen by the HTTP layer.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribes the configured fixed audio source.
    async fn transcribe_source(&self) -> Result<String, VoiceError>;
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Uploads a fixed local audio source to an OpenAI-compatible
/// `/v1/audio/transcriptions` endpoint and returns the settled text.
#[derive(Debug, Clone)]
pub struct FileTranscriber {
    client: reqwest::Client,
    config: TranscriberConfig,
}

impl FileTranscriber {
    pub fn new(config: TranscriberConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Transcribes an arbitrary audio file.
    pub async fn transcribe_file(&self, path: &Path) -> Result<String, VoiceError> {
        let audio = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());

        tracing::info!(path = %path.display(), bytes = audio.len(), "transcribing audio file");

        let part = reqwest::multipart::Part::bytes(audio).file_name(file_name);
        let form = reqwest::multipart::Form::new()
            .text("model", self.config.model.clone())
            .part("file", part);

        let url = format!("{}/v1/audio/transcriptions", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| VoiceError::Transcription(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VoiceError::Transcription(format!(
                "transcription API returned {status}: {body}"
            )));
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| VoiceError::Transcription(e.to_string()))?;

        Ok(parsed.text)
    }
}

#[async_trait]
impl Transcriber for FileTranscriber {
    async fn transcribe_source(&self) -> Result<String, VoiceError> {
        self.transcribe_file(Path::new(&self.config.audio_source_path))
            .await
    }
}
