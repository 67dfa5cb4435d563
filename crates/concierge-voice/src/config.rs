use serde::Deserialize;
use std::fmt;

fn default_stream_url() -> String {
    "wss://api.deepgram.com/v1/listen".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_sample_rate() -> u32 {
    8_000
}

fn default_encoding() -> String {
    // Telephony media streams carry mu-law 8 kHz mono; the recognizer is
    // configured to match so no conversion happens in the relay path.
    "mulaw".to_string()
}

fn default_interim_results() -> bool {
    true
}

fn default_transcribe_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_transcribe_model() -> String {
    "whisper-1".to_string()
}

fn default_audio_source_path() -> String {
    "voice.mp3".to_string()
}

/// Configuration for the streaming speech-recognition collaborator.
#[derive(Clone, Deserialize)]
pub struct RecognizerConfig {
    /// API key for the recognition provider.
    #[serde(default)]
    pub api_key: String,

    /// Websocket endpoint of the streaming recognition API.
    #[serde(default = "default_stream_url")]
    pub stream_url: String,

    /// BCP-47 language code for recognition.
    #[serde(default = "default_language")]
    pub language: String,

    /// Input sample rate in hertz.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Input audio encoding.
    #[serde(default = "default_encoding")]
    pub encoding: String,

    /// Whether to request speaker diarization.
    #[serde(default)]
    pub diarize: bool,

    /// Whether to request interim (revisable) transcripts.
    #[serde(default = "default_interim_results")]
    pub interim_results: bool,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            stream_url: default_stream_url(),
            language: default_language(),
            sample_rate: default_sample_rate(),
            encoding: default_encoding(),
            diarize: false,
            interim_results: default_interim_results(),
        }
    }
}

impl fmt::Debug for RecognizerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecognizerConfig")
            .field("api_key", &"[REDACTED]")
            .field("stream_url", &self.stream_url)
            .field("language", &self.language)
            .field("sample_rate", &self.sample_rate)
            .field("encoding", &self.encoding)
            .field("diarize", &self.diarize)
            .field("interim_results", &self.interim_results)
            .finish()
    }
}

/// Configuration for the one-shot file transcription collaborator.
#[derive(Clone, Deserialize)]
pub struct TranscriberConfig {
    /// API key for the transcription provider.
    #[serde(default)]
    pub api_key: String,

    /// Base URL of the OpenAI-compatible transcription API.
    #[serde(default = "default_transcribe_url")]
    pub base_url: String,

    /// Transcription model identifier.
    #[serde(default = "default_transcribe_model")]
    pub model: String,

    /// Path of the fixed local audio source to transcribe.
    #[serde(default = "default_audio_source_path")]
    pub audio_source_path: String,
}

impl Default for TranscriberConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_transcribe_url(),
            model: default_transcribe_model(),
            audio_source_path: default_audio_source_path(),
        }
    }
}

impl fmt::Debug for TranscriberConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranscriberConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("audio_source_path", &self.audio_source_path)
            .finish()
    }
}
