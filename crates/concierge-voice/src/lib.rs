//! Voice infrastructure for the Concierge backend.
//!
//! Two independent paths:
//!
//! - **File transcription**: a fixed local audio source is uploaded to an
//!   OpenAI-compatible transcription endpoint and the settled text returned.
//! - **Live call bridging**: a telephony provider streams JSON media frames
//!   over a websocket; the [`bridge::AudioBridge`] decodes each frame's
//!   base64 mu-law payload and relays it, in arrival order, into a streaming
//!   recognition session, surfacing interim/final transcripts without
//!   blocking frame forwarding.
//!
//! Recognition providers sit behind the [`recognizer::RecognizerSession`] /
//! [`recognizer::RecognizerFactory`] traits so the bridge can be exercised
//! against fakes.

pub mod bridge;
pub mod config;
pub mod error;
pub mod recognizer;
pub mod transcribe;

pub use bridge::{AudioBridge, BridgeState, MediaFrame};
pub use config::{RecognizerConfig, TranscriberConfig};
pub use error::VoiceError;
pub use recognizer::{
    RecognizerFactory, RecognizerSession, StreamingRecognizer, StreamingRecognizerFactory,
    TranscriptEvent,
};
pub use transcribe::{FileTranscriber, Transcriber};
