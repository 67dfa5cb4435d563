use serde::Deserialize;
use std::fmt;

fn default_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_corpus_path() -> String {
    "llm-source.txt".to_string()
}

fn default_retrieval_top_k() -> usize {
    4
}

fn default_max_tool_rounds() -> usize {
    4
}

/// Configuration for the retrieval-augmented agent.
#[derive(Clone, Deserialize)]
pub struct AgentConfig {
    /// API key for the chat-completion and embeddings provider.
    #[serde(default)]
    pub api_key: String,

    /// Base URL of the OpenAI-compatible API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Chat-completion model identifier.
    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    /// Embeddings model identifier.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Path to the text corpus grounding the agent's answers.
    #[serde(default = "default_corpus_path")]
    pub corpus_path: String,

    /// Number of corpus chunks returned per retrieval.
    #[serde(default = "default_retrieval_top_k")]
    pub retrieval_top_k: usize,

    /// Upper bound on tool-call rounds within one reasoning turn.
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            chat_model: default_chat_model(),
            embedding_model: default_embedding_model(),
            corpus_path: default_corpus_path(),
            retrieval_top_k: default_retrieval_top_k(),
            max_tool_rounds: default_max_tool_rounds(),
        }
    }
}

impl fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("chat_model", &self.chat_model)
            .field("embedding_model", &self.embedding_model)
            .field("corpus_path", &self.corpus_path)
            .field("retrieval_top_k", &self.retrieval_top_k)
            .field("max_tool_rounds", &self.max_tool_rounds)
            .finish()
    }
}
