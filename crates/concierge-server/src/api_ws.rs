//! Telephony media-stream websocket endpoint.
//!
//! Each accepted socket hosts one call. Text frames carry the provider's
//! JSON media-stream events; the [`AudioBridge`] relays decoded audio into
//! a streaming recognition session in strict arrival order.

use crate::AppState;
use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::Extension,
    response::Response,
};
use concierge_voice::{bridge::parse_frame, AudioBridge, BridgeState};
use std::sync::Arc;

/// GET /ws — upgrade to a media-stream socket.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Extension(state): Extension<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Drives one call's socket until the provider stops or disconnects.
async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    tracing::info!("media stream socket connected");
    let mut bridge = AudioBridge::new(state.recognizer_factory.clone());

    while let Some(message) = socket.recv().await {
        let message = match message {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(error = %e, "media stream socket error");
                break;
            }
        };

        match message {
            Message::Text(text) => {
                let frame = match parse_frame(text.as_str()) {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::warn!(error = %e, "dropping unparseable media frame");
                        continue;
                    }
                };
                if bridge.handle_frame(frame).await == BridgeState::Closed {
                    break;
                }
            }
            Message::Close(_) => break,
            // The provider's protocol is text-only; pings are answered by axum.
            _ => {}
        }
    }

    bridge.shutdown().await;
    tracing::info!("media stream socket closed");
}
