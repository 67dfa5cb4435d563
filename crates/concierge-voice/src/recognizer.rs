//! Streaming speech-recognition session over a provider websocket.
//!
//! Binary audio goes in; interim/final transcript JSON comes back
//! asynchronously on a reader task and fans out through a broadcast channel,
//! independently of audio arrival.

use crate::config::RecognizerConfig;
use crate::error::VoiceError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Capacity of the per-session transcript broadcast channel.
const TRANSCRIPT_BROADCAST_CAPACITY: usize = 256;

/// A transcript emitted by the recognition provider.
#[derive(Debug, Clone)]
pub struct TranscriptEvent {
    /// The transcribed text.
    pub text: String,
    /// Whether the provider considers this segment settled.
    pub is_final: bool,
    /// When the event was received.
    pub received_at: DateTime<Utc>,
}

/// An open streaming recognition session.
#[async_trait]
pub trait RecognizerSession: Send {
    /// Feeds a chunk of audio into the session, in arrival order.
    async fn send_audio(&mut self, audio: &[u8]) -> Result<(), VoiceError>;

    /// Closes the session, flushing any pending recognition.
    async fn close(&mut self);

    /// Subscribes to this session's transcript events.
    fn transcripts(&self) -> broadcast::Receiver<TranscriptEvent>;
}

/// Opens recognition sessions; one per telephony call.
#[async_trait]
pub trait RecognizerFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn RecognizerSession>, VoiceError>;
}

// Provider websocket JSON result types (Deepgram-style envelopes).

#[derive(Debug, Deserialize)]
struct StreamResult {
    #[serde(rename = "type")]
    msg_type: Option<String>,
    channel: Option<StreamChannel>,
    is_final: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct StreamChannel {
    alternatives: Vec<StreamAlternative>,
}

#[derive(Debug, Deserialize)]
struct StreamAlternative {
    transcript: String,
}

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Live streaming recognizer over the provider websocket.
pub struct StreamingRecognizer {
    sink: WsSink,
    reader: JoinHandle<()>,
    transcript_tx: broadcast::Sender<TranscriptEvent>,
}

impl StreamingRecognizer {
    /// Connects to the provider and starts the transcript reader task.
    pub async fn connect(config: &RecognizerConfig) -> Result<Self, VoiceError> {
        let url = format!(
            "{}?encoding={}&sample_rate={}&channels=1&language={}&interim_results={}&diarize={}&punctuate=true",
            config.stream_url,
            config.encoding,
            config.sample_rate,
            config.language,
            config.interim_results,
            config.diarize,
        );

        let mut request = url
            .into_client_request()
            .map_err(|e| VoiceError::Connection(e.to_string()))?;
        let auth = HeaderValue::from_str(&format!("Token {}", config.api_key))
            .map_err(|e| VoiceError::Connection(e.to_string()))?;
        request.headers_mut().insert("Authorization", auth);

        let (stream, _) = connect_async(request)
            .await
            .map_err(|e| VoiceError::Connection(e.to_string()))?;
        let (sink, mut source) = stream.split();

        tracing::info!(
            url = %config.stream_url,
            encoding = %config.encoding,
            sample_rate = config.sample_rate,
            "recognition stream opened"
        );

        let (transcript_tx, _) = broadcast::channel(TRANSCRIPT_BROADCAST_CAPACITY);
        let tx = transcript_tx.clone();

        let reader = tokio::spawn(async move {
            while let Some(message) = source.next().await {
                match message {
                    Ok(Message::Text(text)) => handle_provider_message(&text, &tx),
                    Ok(Message::Close(_)) => {
                        tracing::debug!("recognition stream closed by provider");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("recognition stream read error: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(Self {
            sink,
            reader,
            transcript_tx,
        })
    }
}

/// Parses one provider JSON message and broadcasts any transcript in it.
fn handle_provider_message(text: &str, tx: &broadcast::Sender<TranscriptEvent>) {
    let result: StreamResult = match serde_json::from_str(text) {
        Ok(result) => result,
        Err(e) => {
            tracing::debug!("ignoring unparseable recognizer message: {}", e);
            return;
        }
    };

    if result.msg_type.as_deref() != Some("Results") {
        return;
    }

    let Some(alternative) = result
        .channel
        .as_ref()
        .and_then(|channel| channel.alternatives.first())
    else {
        return;
    };

    if alternative.transcript.is_empty() {
        return;
    }

    let event = TranscriptEvent {
        text: alternative.transcript.clone(),
        is_final: result.is_final.unwrap_or(false),
        received_at: Utc::now(),
    };

    // No receivers is fine; transcripts are best-effort.
    let _ = tx.send(event);
}

#[async_trait]
impl RecognizerSession for StreamingRecognizer {
    async fn send_audio(&mut self, audio: &[u8]) -> Result<(), VoiceError> {
        self.sink
            .send(Message::Binary(audio.to_vec().into()))
            .await
            .map_err(|e| VoiceError::Stream(e.to_string()))
    }

    async fn close(&mut self) {
        // Ask the provider to flush pending recognition before the socket drops.
        if let Err(e) = self
            .sink
            .send(Message::Text(r#"{"type":"CloseStream"}"#.into()))
            .await
        {
            tracing::debug!("recognition close message failed: {}", e);
        }
        if let Err(e) = self.sink.close().await {
            tracing::debug!("recognition sink close failed: {}", e);
        }
        self.reader.abort();
    }

    fn transcripts(&self) -> broadcast::Receiver<TranscriptEvent> {
        self.transcript_tx.subscribe()
    }
}

/// Factory for live provider sessions.
#[derive(Debug, Clone)]
pub struct StreamingRecognizerFactory {
    config: RecognizerConfig,
}

impl StreamingRecognizerFactory {
    pub fn new(config: RecognizerConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl RecognizerFactory for StreamingRecognizerFactory {
    async fn open(&self) -> Result<Box<dyn RecognizerSession>, VoiceError> {
        let session = StreamingRecognizer::connect(&self.config).await?;
        Ok(Box::new(session))
    }
}
