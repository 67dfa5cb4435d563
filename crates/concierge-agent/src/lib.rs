//! Retrieval-augmented reasoning for the Concierge backend.
//!
//! Each chat turn builds a fresh agent session grounded in a fixed document
//! corpus: the corpus is loaded from a configured path, chunked, embedded via
//! an OpenAI-compatible embeddings API, and held in an in-process cosine
//! index. The session exposes that index to the chat-completion model as a
//! mandatory-first retrieval tool and runs a bounded function-calling loop
//! until the model produces a final textual answer.
//!
//! Index construction sits behind [`IndexProvider`] so a caching provider
//! can replace the rebuild-per-session one without touching the session
//! contract.

pub mod chat;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod index;
pub mod session;

pub use chat::ChatClient;
pub use config::AgentConfig;
pub use embeddings::EmbeddingsClient;
pub use error::AgentError;
pub use index::VectorIndex;
pub use session::{Agent, AgentSession, IndexProvider, RebuildingIndexProvider, RetrievalAgent};
