use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("recognizer connection error: {0}")]
    Connection(String),

    #[error("recognizer stream error: {0}")]
    Stream(String),

    #[error("transcription error: {0}")]
    Transcription(String),

    #[error("audio source error: {0}")]
    AudioSource(#[from] std::io::Error),

    #[error("malformed media frame: {0}")]
    MalformedFrame(String),
}
