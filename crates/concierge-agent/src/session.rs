//! Per-request agent session: prompt assembly and the tool-call loop.

use crate::chat::ChatClient;
use crate::config::AgentConfig;
use crate::embeddings::EmbeddingsClient;
use crate::error::AgentError;
use crate::index::{chunk_corpus, VectorIndex};
use async_trait::async_trait;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

/// System instruction for the reasoning model. Constrains answers to be
/// concise and grounded, and makes the retrieval tool mandatory-first.
const SYSTEM_INSTRUCTION: &str = "You are a helpful assistant for question-answering tasks. \
For all questions, you must consult the source_of_truth tool before answering. \
If you don't know the answer, just say that you don't know. \
Use three sentences maximum and keep the answer concise.";

/// Name of the retrieval tool exposed to the model.
const RETRIEVAL_TOOL_NAME: &str = "source_of_truth";

/// Upper bound on corpus chunk size in characters.
const CHUNK_MAX_CHARS: usize = 1_200;

/// Separator between retrieved passages in a tool result.
const PASSAGE_SEPARATOR: &str = "\n\n---\n\n";

/// Provides the current semantic index for a session.
///
/// Separates "get current index" from "build index": the shipped
/// [`RebuildingIndexProvider`] rebuilds per call, and a caching provider can
/// replace it without changing the session contract.
#[async_trait]
pub trait IndexProvider: Send + Sync {
    async fn current(&self) -> Result<VectorIndex, AgentError>;
}

/// Rebuilds the index from the corpus file on every call.
///
/// Correct by construction (no staleness) at the cost of latency and repeated
/// embedding spend per turn; acceptable at this system's request volume.
pub struct RebuildingIndexProvider {
    corpus_path: PathBuf,
    embeddings: EmbeddingsClient,
}

impl RebuildingIndexProvider {
    pub fn new(corpus_path: impl Into<PathBuf>, embeddings: EmbeddingsClient) -> Self {
        Self {
            corpus_path: corpus_path.into(),
            embeddings,
        }
    }
}

#[async_trait]
impl IndexProvider for RebuildingIndexProvider {
    async fn current(&self) -> Result<VectorIndex, AgentError> {
        let corpus = tokio::fs::read_to_string(&self.corpus_path).await?;
        let chunks = chunk_corpus(&corpus, CHUNK_MAX_CHARS);
        tracing::debug!(
            path = %self.corpus_path.display(),
            chunks = chunks.len(),
            "building semantic index"
        );

        let vectors = self.embeddings.embed(&chunks).await?;
        let mut index = VectorIndex::new();
        for (vector, chunk) in vectors.into_iter().zip(chunks) {
            index.insert(vector, chunk);
        }
        Ok(index)
    }
}

/// One reasoning turn's worth of agent: a chat client, the retrieval index,
/// and the embeddings client used to vectorize retrieval queries.
pub struct AgentSession {
    chat: ChatClient,
    embeddings: EmbeddingsClient,
    index: VectorIndex,
    retrieval_top_k: usize,
    max_tool_rounds: usize,
}

impl AgentSession {
    pub fn new(
        chat: ChatClient,
        embeddings: EmbeddingsClient,
        index: VectorIndex,
        retrieval_top_k: usize,
        max_tool_rounds: usize,
    ) -> Self {
        Self {
            chat,
            embeddings,
            index,
            retrieval_top_k,
            max_tool_rounds,
        }
    }

    /// Runs one reasoning turn: prompt the model with the replayed history
    /// and current input, satisfy its retrieval calls, and return the final
    /// natural-language answer.
    pub async fn invoke(&self, input: &str, history: &[String]) -> Result<String, AgentError> {
        let mut messages = build_messages(input, history);
        let tools = [retrieval_tool_schema()];

        for round in 0..self.max_tool_rounds {
            let message = self.chat.complete(&messages, &tools).await?;

            let tool_calls = message.tool_calls.clone().unwrap_or_default();
            if tool_calls.is_empty() {
                return match message.content {
                    Some(content) if !content.trim().is_empty() => Ok(content.trim().to_string()),
                    _ => Err(AgentError::MalformedOutput(
                        "assistant message had neither content nor tool calls".to_string(),
                    )),
                };
            }

            // Replay the assistant's tool-call message, then answer each call.
            messages.push(serde_json::to_value(&message).map_err(|e| {
                AgentError::MalformedOutput(format!("unserializable assistant message: {e}"))
            })?);

            for call in tool_calls {
                if call.function.name != RETRIEVAL_TOOL_NAME {
                    tracing::warn!(tool = %call.function.name, "model requested unknown tool");
                    messages.push(json!({
                        "role": "tool",
                        "tool_call_id": call.id,
                        "content": format!("unknown tool: {}", call.function.name),
                    }));
                    continue;
                }

                let query =
                    parse_tool_query(&call.function.arguments).unwrap_or_else(|| input.to_string());
                tracing::debug!(round, query = %query, "running retrieval tool");

                let query_vector = self.embeddings.embed_query(&query).await?;
                let passages = self.index.search(&query_vector, self.retrieval_top_k);
                messages.push(json!({
                    "role": "tool",
                    "tool_call_id": call.id,
                    "content": passages.join(PASSAGE_SEPARATOR),
                }));
            }
        }

        Err(AgentError::Invocation(format!(
            "exceeded {} tool rounds without a final answer",
            self.max_tool_rounds
        )))
    }
}

/// Assembles the prompt in fixed order: system instruction, prior history,
/// current user input.
///
/// The history view is an ordered list of turn texts; turn 1 is always the
/// user's and authorship strictly alternates, so odd positions replay as
/// `user` messages and even positions as `assistant` messages.
fn build_messages(input: &str, history: &[String]) -> Vec<serde_json::Value> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(json!({"role": "system", "content": SYSTEM_INSTRUCTION}));

    for (position, text) in history.iter().enumerate() {
        let role = if position % 2 == 0 { "user" } else { "assistant" };
        messages.push(json!({"role": role, "content": text}));
    }

    messages.push(json!({"role": "user", "content": input}));
    messages
}

/// JSON schema for the retrieval tool.
fn retrieval_tool_schema() -> serde_json::Value {
    json!({
        "type": "function",
        "function": {
            "name": RETRIEVAL_TOOL_NAME,
            "description": "The source of truth for all the searches. \
                            For all questions, you must use this tool!",
            "parameters": {
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search query."
                    }
                },
                "required": ["query"]
            }
        }
    })
}

/// Extracts the `query` argument from a tool call's JSON arguments.
fn parse_tool_query(arguments: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(arguments).ok()?;
    value
        .get("query")
        .and_then(|q| q.as_str())
        .map(|q| q.to_string())
}

/// The reasoning collaborator as seen by the chat orchestrator.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Answers `input` given the conversation history that preceded it.
    async fn respond(&self, input: &str, history: &[String]) -> Result<String, AgentError>;
}

/// Live retrieval-augmented agent: builds a fresh session per invocation.
pub struct RetrievalAgent {
    chat: ChatClient,
    embeddings: EmbeddingsClient,
    index_provider: Arc<dyn IndexProvider>,
    retrieval_top_k: usize,
    max_tool_rounds: usize,
}

impl RetrievalAgent {
    pub fn new(config: &AgentConfig) -> Self {
        let embeddings = EmbeddingsClient::new(
            &config.base_url,
            &config.api_key,
            &config.embedding_model,
        );
        let index_provider = Arc::new(RebuildingIndexProvider::new(
            &config.corpus_path,
            embeddings.clone(),
        ));
        Self {
            chat: ChatClient::new(&config.base_url, &config.api_key, &config.chat_model),
            embeddings,
            index_provider,
            retrieval_top_k: config.retrieval_top_k,
            max_tool_rounds: config.max_tool_rounds,
        }
    }

    /// Replaces the index provider (e.g. with a caching one).
    pub fn with_index_provider(mut self, provider: Arc<dyn IndexProvider>) -> Self {
        self.index_provider = provider;
        self
    }
}

#[async_trait]
impl Agent for RetrievalAgent {
    async fn respond(&self, input: &str, history: &[String]) -> Result<String, AgentError> {
        let index = self.index_provider.current().await?;
        let session = AgentSession::new(
            self.chat.clone(),
            self.embeddings.clone(),
            index,
            self.retrieval_top_k,
            self.max_tool_rounds,
        );
        session.invoke(input, history).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_order_is_system_history_input() {
        let history = vec![
            "What are your hours?".to_string(),
            "We open at nine.".to_string(),
        ];
        let messages = build_messages("And on weekends?", &history);

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[1]["content"], "What are your hours?");
        assert_eq!(messages[2]["role"], "assistant");
        assert_eq!(messages[3]["role"], "user");
        assert_eq!(messages[3]["content"], "And on weekends?");
    }

    #[test]
    fn empty_history_yields_system_and_input_only() {
        let messages = build_messages("What are your hours?", &[]);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["role"], "user");
    }

    #[test]
    fn tool_schema_names_the_retrieval_tool() {
        let schema = retrieval_tool_schema();
        assert_eq!(schema["function"]["name"], RETRIEVAL_TOOL_NAME);
        assert_eq!(
            schema["function"]["parameters"]["required"][0],
            "query"
        );
    }

    #[test]
    fn tool_query_parses_well_formed_arguments() {
        assert_eq!(
            parse_tool_query(r#"{"query": "opening hours"}"#),
            Some("opening hours".to_string())
        );
        assert_eq!(parse_tool_query("not json"), None);
        assert_eq!(parse_tool_query(r#"{"other": 1}"#), None);
    }

    #[tokio::test]
    async fn rebuilding_provider_surfaces_missing_corpus() {
        let embeddings = EmbeddingsClient::new("http://localhost:0", "", "model");
        let provider = RebuildingIndexProvider::new("/nonexistent/corpus.txt", embeddings);
        let err = provider.current().await.expect_err("missing file should fail");
        assert!(matches!(err, AgentError::Corpus(_)));
    }
}
