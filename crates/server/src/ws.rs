//! WebSocket transport for the event relay.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::http::header::USER_AGENT;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};

use crate::app::AppState;
use crate::relay::EventRelay;

/// Upgrade handler for `GET /ws`.
pub async fn ws_handler(ws: WebSocketUpgrade, headers: HeaderMap, State(state): State<AppState>) -> Response {
    let information = json!({
        "user_agent": headers.get(USER_AGENT).and_then(|v| v.to_str().ok()),
        "connected_at": chrono::Utc::now().to_rfc3339(),
    });
    ws.on_upgrade(move |socket| handle_socket(socket, state.relay, information))
}

/// Pump one socket until either side closes.
async fn handle_socket(socket: WebSocket, relay: EventRelay, information: Value) {
    let mut conn = relay.connect().await;
    let id = conn.id;
    let (mut sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(event) = conn.events.recv().await {
            let text = match event.to_text() {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(connection_id = %id, error = %e, "failed to encode event");
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => relay.handle_text(id, text.as_str(), &information).await,
                    Some(Ok(Message::Binary(data))) => {
                        tracing::debug!(connection_id = %id, len = data.len(), "ignoring binary frame");
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::warn!(connection_id = %id, error = %e, "websocket receive error");
                        break;
                    }
                }
            }
            _ = &mut send_task => break,
        }
    }

    relay.disconnect(id).await;
    send_task.abort();
}
