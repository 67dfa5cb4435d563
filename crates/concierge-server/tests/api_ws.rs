mod common;

use base64::Engine;
use common::test_app;
use futures_util::SinkExt;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

/// Polls until `predicate` holds or the deadline passes.
async fn wait_for(mut predicate: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test]
async fn media_stream_is_relayed_in_order_and_closed_on_stop() {
    let app = test_app("unused");
    let chunks = app.recognizer_factory.chunks.clone();
    let closed = app.recognizer_factory.closed.clone();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app.router).await.unwrap();
    });

    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .unwrap();

    let encode = |bytes: &[u8]| base64::engine::general_purpose::STANDARD.encode(bytes);
    let frames = [
        json!({"event": "connected", "protocol": "Call", "version": "1.0.0"}),
        json!({
            "event": "start",
            "sequenceNumber": "1",
            "streamSid": "MZtest",
            "start": {"streamSid": "MZtest", "callSid": "CAtest"}
        }),
        json!({
            "event": "media",
            "sequenceNumber": "2",
            "streamSid": "MZtest",
            "media": {"chunk": "1", "payload": encode(b"first")}
        }),
        json!({
            "event": "media",
            "sequenceNumber": "3",
            "streamSid": "MZtest",
            "media": {"chunk": "2", "payload": encode(b"second")}
        }),
    ];
    for frame in frames {
        socket.send(Message::Text(frame.to_string().into())).await.unwrap();
    }

    assert!(
        wait_for(|| chunks.lock().unwrap().len() == 2).await,
        "bridge should relay both media payloads"
    );
    assert_eq!(
        *chunks.lock().unwrap(),
        vec![b"first".to_vec(), b"second".to_vec()]
    );
    assert!(!closed.load(Ordering::SeqCst));

    socket
        .send(Message::Text(
            json!({"event": "stop", "sequenceNumber": "4", "streamSid": "MZtest"})
                .to_string()
                .into(),
        ))
        .await
        .unwrap();

    assert!(
        wait_for(|| closed.load(Ordering::SeqCst)).await,
        "stop frame should close the recognition session"
    );
}

#[tokio::test]
async fn client_disconnect_closes_the_recognition_session() {
    let app = test_app("unused");
    let closed = app.recognizer_factory.closed.clone();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app.router).await.unwrap();
    });

    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .unwrap();

    socket
        .send(Message::Text(
            json!({
                "event": "start",
                "sequenceNumber": "1",
                "streamSid": "MZtest",
                "start": {"streamSid": "MZtest", "callSid": "CAtest"}
            })
            .to_string()
            .into(),
        ))
        .await
        .unwrap();
    socket.close(None).await.unwrap();

    assert!(
        wait_for(|| closed.load(Ordering::SeqCst)).await,
        "socket teardown should close the recognition session"
    );
}
