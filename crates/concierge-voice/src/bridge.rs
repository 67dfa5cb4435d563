//! Telephony audio bridge: relays media-stream frames into a recognition
//! session.
//!
//! One bridge exists per call socket. Frames are handled strictly in arrival
//! order on the call's task; the bridge never reorders or buffers beyond
//! what the recognition session itself does. Transcripts surface on a
//! separate task and never block frame forwarding. A recognizer failure is
//! retried with a bounded, backed-off open budget; once exhausted the call
//! continues without transcripts (the telephony party is never disconnected
//! by a recognition fault).

use crate::error::VoiceError;
use crate::recognizer::{RecognizerFactory, RecognizerSession, TranscriptEvent};
use base64::Engine;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Total recognizer open attempts per call (initial connect + retries).
const SESSION_OPEN_BUDGET: u32 = 4;

/// Linear backoff step between recognizer re-open attempts.
const REOPEN_BACKOFF_STEP: Duration = Duration::from_millis(250);

/// One JSON text frame from the telephony media-stream socket.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaFrame {
    pub event: String,
    #[serde(rename = "sequenceNumber")]
    pub sequence_number: Option<String>,
    #[serde(rename = "streamSid")]
    pub stream_sid: Option<String>,
    #[serde(default)]
    pub start: Option<StartPayload>,
    #[serde(default)]
    pub media: Option<MediaPayload>,
    #[serde(default)]
    pub stop: Option<serde_json::Value>,
}

/// Stream metadata delivered with the `start` event.
#[derive(Debug, Clone, Deserialize)]
pub struct StartPayload {
    #[serde(rename = "streamSid")]
    pub stream_sid: Option<String>,
    #[serde(rename = "callSid")]
    pub call_sid: Option<String>,
}

/// Audio chunk delivered with a `media` event.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaPayload {
    /// Chunk sequence number within the stream.
    pub chunk: Option<String>,
    /// Base64-encoded mu-law 8 kHz mono audio.
    pub payload: String,
}

/// Lifecycle of one call's bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// Socket open, no recognition session yet.
    Idle,
    /// Recognition session open, audio flowing.
    Streaming,
    /// Terminal: `stop` received or socket torn down.
    Closed,
}

/// Per-call relay between the telephony socket and a recognition session.
pub struct AudioBridge {
    factory: Arc<dyn RecognizerFactory>,
    session: Option<Box<dyn RecognizerSession>>,
    state: BridgeState,
    stream_sid: Option<String>,
    open_budget: u32,
    transcript_task: Option<JoinHandle<()>>,
}

impl AudioBridge {
    pub fn new(factory: Arc<dyn RecognizerFactory>) -> Self {
        Self {
            factory,
            session: None,
            state: BridgeState::Idle,
            stream_sid: None,
            open_budget: SESSION_OPEN_BUDGET,
            transcript_task: None,
        }
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    /// Handles one media-stream frame. Never fails the call: recognizer
    /// faults degrade transcription only.
    pub async fn handle_frame(&mut self, frame: MediaFrame) -> BridgeState {
        if self.state == BridgeState::Closed {
            tracing::warn!(event = %frame.event, "ignoring frame after stop");
            return self.state;
        }

        match frame.event.as_str() {
            // Protocol handshake acknowledgment.
            "connected" => {
                tracing::debug!("media stream connected");
            }
            "start" => {
                self.stream_sid = frame
                    .start
                    .as_ref()
                    .and_then(|start| start.stream_sid.clone())
                    .or(frame.stream_sid.clone());
                tracing::info!(
                    stream_sid = self.stream_sid.as_deref().unwrap_or("<unknown>"),
                    "media stream started"
                );
                self.ensure_session().await;
            }
            "media" => {
                let Some(media) = frame.media else {
                    tracing::warn!("media frame without media payload");
                    return self.state;
                };
                match base64::engine::general_purpose::STANDARD.decode(&media.payload) {
                    Ok(audio) => self.forward_audio(&audio).await,
                    Err(e) => {
                        tracing::warn!(
                            chunk = media.chunk.as_deref().unwrap_or("<none>"),
                            "dropping frame with undecodable payload: {}",
                            e
                        );
                    }
                }
            }
            "stop" => {
                tracing::info!(
                    stream_sid = self.stream_sid.as_deref().unwrap_or("<unknown>"),
                    "media stream stopped"
                );
                self.shutdown().await;
            }
            other => {
                tracing::debug!(event = %other, "ignoring unhandled media stream event");
            }
        }

        self.state
    }

    /// Closes the recognition session and marks the bridge terminal. Also
    /// called when the socket drops without a `stop` frame.
    pub async fn shutdown(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close().await;
        }
        if let Some(task) = self.transcript_task.take() {
            task.abort();
        }
        self.state = BridgeState::Closed;
    }

    /// Forwards decoded audio, reconnecting within budget on send failure.
    async fn forward_audio(&mut self, audio: &[u8]) {
        if self.ensure_session().await.is_none() {
            tracing::warn!("dropping media frame: no recognition session");
            return;
        }

        let result = match self.session.as_mut() {
            Some(session) => session.send_audio(audio).await,
            None => return,
        };
        if let Err(e) = result {
            tracing::warn!("recognition session send failed: {}", e);
            self.drop_session();
            self.retry_send(audio).await;
        }
    }

    /// Bounded re-open attempts with linear backoff; resends the current
    /// frame once per successful reconnect. Frames are never reordered:
    /// retries happen inline on the call's task.
    async fn retry_send(&mut self, audio: &[u8]) {
        let mut attempt = 0u32;
        while self.open_budget > 0 {
            attempt += 1;
            tokio::time::sleep(REOPEN_BACKOFF_STEP * attempt).await;

            if self.ensure_session().await.is_none() {
                continue;
            }
            let Some(session) = self.session.as_mut() else {
                continue;
            };
            match session.send_audio(audio).await {
                Ok(()) => return,
                Err(e) => {
                    tracing::warn!(attempt, "resend after reconnect failed: {}", e);
                    self.drop_session();
                }
            }
        }
        tracing::warn!("recognition open budget exhausted; dropping frame");
    }

    /// Opens a session if none is active, consuming one unit of budget per
    /// failed or successful attempt.
    async fn ensure_session(&mut self) -> Option<()> {
        if self.session.is_some() {
            return Some(());
        }
        if self.open_budget == 0 {
            return None;
        }
        self.open_budget -= 1;

        match self.factory.open().await {
            Ok(session) => {
                self.transcript_task = Some(spawn_transcript_logger(
                    self.stream_sid.clone(),
                    session.transcripts(),
                ));
                self.session = Some(session);
                self.state = BridgeState::Streaming;
                Some(())
            }
            Err(e) => {
                tracing::error!("failed to open recognition session: {}", e);
                None
            }
        }
    }

    fn drop_session(&mut self) {
        self.session = None;
        if let Some(task) = self.transcript_task.take() {
            task.abort();
        }
    }
}

/// Surfaces transcript events to the log sink, off the frame-forwarding path.
fn spawn_transcript_logger(
    stream_sid: Option<String>,
    mut rx: broadcast::Receiver<TranscriptEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let sid = stream_sid.unwrap_or_else(|| "<unknown>".to_string());
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if event.is_final {
                        tracing::info!(stream_sid = %sid, "transcript: {}", event.text);
                    } else {
                        tracing::debug!(stream_sid = %sid, "interim transcript: {}", event.text);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(stream_sid = %sid, skipped, "transcript consumer lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Parses one socket text frame into a [`MediaFrame`].
pub fn parse_frame(text: &str) -> Result<MediaFrame, VoiceError> {
    serde_json::from_str(text).map_err(|e| VoiceError::MalformedFrame(e.to_string()))
}
