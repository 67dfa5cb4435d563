mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::test_app;
use concierge_conversations::{count_items, list_items, Author};
use serde_json::{json, Value};
use std::sync::atomic::Ordering;
use tower::ServiceExt; // for oneshot

fn chat_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/customer-service/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn count_conversations(pool: &concierge_db::DbPool) -> i64 {
    let conn = pool.get().unwrap();
    conn.query_row("SELECT COUNT(*) FROM conversations", [], |row| row.get(0))
        .unwrap()
}

/// Item count across every conversation, for zero-write assertions.
fn count_all_items(pool: &concierge_db::DbPool) -> i64 {
    let conn = pool.get().unwrap();
    conn.query_row("SELECT COUNT(*) FROM conversation_items", [], |row| {
        row.get(0)
    })
    .unwrap()
}

#[tokio::test]
async fn first_turn_creates_conversation_and_persists_both_turns() {
    let app = test_app("We are open 9am to 5pm.");

    let response = app
        .router
        .clone()
        .oneshot(chat_request(
            json!({"conversation_id": "", "input": "What are your hours?"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["output"], "We are open 9am to 5pm.");
    let conversation_id = body["conversation_id"].as_str().unwrap().to_string();
    assert!(!conversation_id.is_empty());

    // Agent saw the pre-turn history, which was empty.
    let calls = app.agent.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "What are your hours?");
    assert!(calls[0].1.is_empty());
    drop(calls);

    // Both turns persisted at orders 1 and 2 with correct authors.
    let conn = app.pool.get().unwrap();
    assert_eq!(count_items(&conn, &conversation_id).unwrap(), 2);
    let items = list_items(&conn, &conversation_id).unwrap();
    let turns: Vec<(i64, &str, Author)> = items
        .iter()
        .map(|item| (item.order, item.text.as_str(), item.author))
        .collect();
    assert_eq!(
        turns,
        vec![
            (1, "What are your hours?", Author::User),
            (2, "We are open 9am to 5pm.", Author::Agent),
        ]
    );
}

#[tokio::test]
async fn second_turn_replays_history_and_extends_ordering() {
    let app = test_app("Yes, weekends too.");

    let first = app
        .router
        .clone()
        .oneshot(chat_request(json!({"input": "What are your hours?"})))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let conversation_id = body_json(first).await["conversation_id"]
        .as_str()
        .unwrap()
        .to_string();

    let second = app
        .router
        .clone()
        .oneshot(chat_request(json!({
            "conversation_id": conversation_id,
            "input": "And on weekends?"
        })))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    let body = body_json(second).await;
    assert_eq!(body["conversation_id"], conversation_id.as_str());

    // The second invocation sees the full first exchange as history.
    let calls = app.agent.calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].0, "And on weekends?");
    assert_eq!(
        calls[1].1,
        vec![
            "What are your hours?".to_string(),
            "Yes, weekends too.".to_string()
        ]
    );
    drop(calls);

    // Orders continue gaplessly at 3 and 4.
    let conn = app.pool.get().unwrap();
    let orders: Vec<i64> = list_items(&conn, &conversation_id)
        .unwrap()
        .iter()
        .map(|item| item.order)
        .collect();
    assert_eq!(orders, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn empty_input_is_rejected_with_zero_writes() {
    let app = test_app("unused");

    let response = app
        .router
        .clone()
        .oneshot(chat_request(json!({"conversation_id": "", "input": ""})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["message"], "input must be a non-empty string");

    assert_eq!(count_conversations(&app.pool), 0);
    assert_eq!(count_all_items(&app.pool), 0);
    assert!(app.agent.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_conversation_is_not_found_with_zero_writes() {
    let app = test_app("unused");

    let response = app
        .router
        .clone()
        .oneshot(chat_request(json!({
            "conversation_id": "no-such-conversation",
            "input": "hello"
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["message"], "conversation not found");

    assert_eq!(count_conversations(&app.pool), 0);
    assert_eq!(count_all_items(&app.pool), 0);
    assert!(app.agent.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn agent_failure_is_internal_error_after_user_turn_saved() {
    let app = test_app("unused");
    app.agent.fail.store(true, Ordering::SeqCst);

    let response = app
        .router
        .clone()
        .oneshot(chat_request(json!({"input": "hello"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["message"], "failed to send message to the agent");

    // The user turn was persisted before the agent ran; no agent turn follows.
    assert_eq!(count_all_items(&app.pool), 1);
}

#[tokio::test]
async fn missing_input_field_is_bad_request_with_json_body() {
    let app = test_app("unused");

    let response = app
        .router
        .clone()
        .oneshot(chat_request(json!({"conversation_id": ""})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["message"], "input must be a non-empty string");
    assert_eq!(count_all_items(&app.pool), 0);
}

#[tokio::test]
async fn non_string_fields_are_bad_request_with_json_body() {
    let app = test_app("unused");

    let response = app
        .router
        .clone()
        .oneshot(chat_request(json!({"conversation_id": 7, "input": "hello"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["message"], "conversation_id must be a string or null");

    let response = app
        .router
        .clone()
        .oneshot(chat_request(json!({"input": 42})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["message"], "input must be a non-empty string");

    assert_eq!(count_all_items(&app.pool), 0);
    assert!(app.agent.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unparseable_body_is_bad_request_with_json_body() {
    let app = test_app("unused");

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/customer-service/chat")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["message"], "input must be a non-empty string");
    assert_eq!(count_all_items(&app.pool), 0);
}
