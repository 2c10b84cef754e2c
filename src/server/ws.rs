//! WebSocket endpoint. Each connection joins the caller's per-user room plus
//! the shared lobby; events arrive as one-line JSON text frames like
//! `{"event":"permissions_updated"}`. Delivery is best-effort.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use crate::error::AppResult;
use crate::notify::Event;

use super::{require_principal, AppState};

pub async fn ws_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let principal = require_principal(&state, &headers)?;
    debug!(user = %principal.username, "websocket upgrade");
    let user_rx = state.hub.subscribe_user(principal.user_id);
    let lobby_rx = state.hub.subscribe_all();
    Ok(ws.on_upgrade(move |socket| client_loop(socket, user_rx, lobby_rx)))
}

fn frame(event: Event) -> Message {
    Message::Text(format!(r#"{{"event":"{}"}}"#, event.as_str()).into())
}

async fn client_loop(
    socket: WebSocket,
    mut user_rx: tokio::sync::broadcast::Receiver<Event>,
    mut lobby_rx: tokio::sync::broadcast::Receiver<Event>,
) {
    let (mut sink, mut stream) = socket.split();
    loop {
        tokio::select! {
            ev = user_rx.recv() => match ev {
                Ok(event) => {
                    if sink.send(frame(event)).await.is_err() { break; }
                }
                // Lagged means we dropped events; the client re-syncs on the
                // next one, so just keep listening.
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            },
            ev = lobby_rx.recv() => match ev {
                Ok(event) => {
                    if sink.send(frame(event)).await.is_err() { break; }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            },
            msg = stream.next() => match msg {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(_)) => break,
            },
        }
    }
}
