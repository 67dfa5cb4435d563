//! Chat turn orchestration endpoint.
//!
//! One request is one turn: validate, resolve the conversation, load its
//! history, persist the user turn, invoke the agent with the pre-turn
//! history, persist the agent turn, respond. Each step is terminal on
//! failure and nothing after a failed step runs.

use crate::{ApiError, AppState};
use axum::extract::rejection::JsonRejection;
use axum::{extract::Extension, response::Json};
use concierge_conversations::{append_next, load_history, resolve_or_create, Author, StoreError};
use concierge_db::DbPool;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, PartialEq)]
pub struct ChatRequest {
    /// Existing conversation to continue, or empty/absent to start a new one.
    pub conversation_id: String,
    /// The customer's message for this turn.
    pub input: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    /// The agent's reply text.
    pub output: String,
    /// The conversation the turn was recorded under.
    pub conversation_id: String,
}

/// Validates the request body field by field.
///
/// Absent fields default to the empty string; present fields of the wrong
/// type are a 400, never a framework-level rejection, so every validation
/// failure carries the standard `{"message": ...}` body.
fn parse_chat_request(body: &Value) -> Result<ChatRequest, ApiError> {
    let conversation_id = match body.get("conversation_id") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(id)) => id.clone(),
        Some(_) => {
            return Err(ApiError::BadRequest(
                "conversation_id must be a string or null".to_string(),
            ));
        }
    };

    let input = match body.get("input") {
        Some(Value::String(input)) if !input.trim().is_empty() => input.clone(),
        _ => {
            return Err(ApiError::BadRequest(
                "input must be a non-empty string".to_string(),
            ));
        }
    };

    Ok(ChatRequest {
        conversation_id,
        input,
    })
}

/// Runs a closure against a pooled connection on the blocking thread pool.
async fn with_conn<T, F>(pool: &DbPool, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&rusqlite::Connection) -> Result<T, StoreError> + Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(|e| {
            tracing::error!(error = %e, "failed to get database connection");
            ApiError::Internal("database unavailable".to_string())
        })?;
        f(&conn).map_err(store_err_to_api)
    })
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "database task panicked");
        ApiError::Internal("database unavailable".to_string())
    })?
}

/// `NotFound` → 404, everything else → 500 (with the error logged).
fn store_err_to_api(e: StoreError) -> ApiError {
    match e {
        StoreError::NotFound(id) => {
            tracing::debug!(conversation_id = %id, "conversation not found");
            ApiError::NotFound("conversation not found".to_string())
        }
        err => {
            tracing::error!(error = %err, "conversation store operation failed");
            ApiError::Internal("failed to fetch conversation history".to_string())
        }
    }
}

/// POST /customer-service/chat
pub async fn chat_handler(
    Extension(state): Extension<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    // An unparseable or non-JSON body carries no usable input.
    let payload = match body {
        Ok(Json(value)) => parse_chat_request(&value)?,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "rejecting malformed chat body");
            return Err(ApiError::BadRequest(
                "input must be a non-empty string".to_string(),
            ));
        }
    };

    let requested_id = payload.conversation_id.clone();
    let conversation = with_conn(&state.pool, move |conn| {
        resolve_or_create(conn, &requested_id)
    })
    .await
    .map_err(|e| match e {
        // A lookup failure on a non-empty id is indistinguishable from a
        // missing conversation as far as the caller is concerned.
        ApiError::Internal(_) => ApiError::NotFound("conversation not found".to_string()),
        other => other,
    })?;

    let conversation_id = conversation.id.clone();
    let history = {
        let id = conversation_id.clone();
        with_conn(&state.pool, move |conn| load_history(conn, &id)).await?
    };

    let user_turn = {
        let id = conversation_id.clone();
        let text = payload.input.clone();
        with_conn(&state.pool, move |conn| {
            append_next(conn, &id, &text, Author::User)
        })
        .await
        .map_err(|e| match e {
            ApiError::Internal(_) => {
                ApiError::Internal("failed to save message to database".to_string())
            }
            other => other,
        })?
    };
    tracing::debug!(
        conversation_id = %conversation_id,
        order = user_turn.order,
        "persisted user turn"
    );

    let output = state
        .agent
        .respond(&payload.input, &history)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, conversation_id = %conversation_id, "agent invocation failed");
            ApiError::Internal("failed to send message to the agent".to_string())
        })?;

    let agent_turn = {
        let id = conversation_id.clone();
        let text = output.clone();
        with_conn(&state.pool, move |conn| {
            append_next(conn, &id, &text, Author::Agent)
        })
        .await
        .map_err(|e| match e {
            ApiError::Internal(_) => {
                ApiError::Internal("failed to save message to database".to_string())
            }
            other => other,
        })?
    };
    tracing::info!(
        conversation_id = %conversation_id,
        user_order = user_turn.order,
        agent_order = agent_turn.order,
        "completed chat turn"
    );

    Ok(Json(ChatResponse {
        output,
        conversation_id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message_of(err: ApiError) -> String {
        match err {
            ApiError::BadRequest(m) | ApiError::NotFound(m) | ApiError::Internal(m) => m,
        }
    }

    #[test]
    fn absent_conversation_id_defaults_to_empty() {
        let request = parse_chat_request(&json!({"input": "hello"})).expect("should validate");
        assert_eq!(request.conversation_id, "");
        assert_eq!(request.input, "hello");
    }

    #[test]
    fn null_conversation_id_is_treated_as_absent() {
        let request = parse_chat_request(&json!({"conversation_id": null, "input": "hello"}))
            .expect("should validate");
        assert_eq!(request.conversation_id, "");
    }

    #[test]
    fn non_string_conversation_id_is_rejected() {
        let err = parse_chat_request(&json!({"conversation_id": 7, "input": "hello"}))
            .expect_err("should reject");
        assert_eq!(message_of(err), "conversation_id must be a string or null");
    }

    #[test]
    fn missing_empty_or_non_string_input_is_rejected() {
        for body in [
            json!({}),
            json!({"input": ""}),
            json!({"input": "   "}),
            json!({"input": 42}),
            json!({"input": null}),
        ] {
            let err = parse_chat_request(&body).expect_err("should reject");
            assert_eq!(message_of(err), "input must be a non-empty string");
        }
    }
}
