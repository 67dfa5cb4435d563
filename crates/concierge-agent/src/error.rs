use thiserror::Error;

/// Errors that can occur while building or invoking an agent session.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The document corpus could not be read.
    #[error("failed to load document corpus: {0}")]
    Corpus(#[from] std::io::Error),

    /// The embeddings API call failed or returned an unusable response.
    #[error("embedding request failed: {0}")]
    Embedding(String),

    /// The chat-completion call failed.
    #[error("agent invocation failed: {0}")]
    Invocation(String),

    /// The chat-completion result contained no usable textual answer.
    #[error("agent returned no usable answer: {0}")]
    MalformedOutput(String),
}
