//! Inbound call webhook.
//!
//! The telephony provider POSTs here when a call comes in; the response is
//! a TwiML document instructing it to open a media stream to our websocket
//! endpoint.

use crate::AppState;
use axum::{
    extract::Extension,
    http::header,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// POST /customer-service/voice
pub async fn voice_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    let stream_url = format!("wss://{}/ws", state.public_host);
    tracing::info!(url = %stream_url, "answering inbound call with stream instruction");

    let twiml = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <Response><Connect><Stream url=\"{stream_url}\"/></Connect></Response>"
    );

    ([(header::CONTENT_TYPE, "application/xml")], twiml).into_response()
}
