//! `/watch-together` WebSocket transport.
//!
//! Each socket becomes one connection in the sync server. Text frames carry
//! JSON events both ways. The server pings on an interval and closes
//! sockets that have been silent for longer than the idle timeout.

use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use tokio::time::{interval_at, Instant};
use tracing::{debug, error, info, warn};
use watchparty_core::models::ConnectionId;
use watchparty_core::protocol::{decode, encode, ServerEvent};

use crate::http::AppState;

/// Signaling frames are small; the axum default of 64 MiB is not needed.
const MAX_MESSAGE_SIZE: usize = 64 * 1024;

pub async fn websocket_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = ConnectionId::new();
    let mut outbound = match state.sync.connect(connection_id.clone()).await {
        Ok(rx) => rx,
        Err(e) => {
            error!(error = %e, "Sync server unavailable, refusing WebSocket");
            return;
        }
    };
    info!(connection_id = %connection_id, "WebSocket connection established");

    let (mut sink, mut stream) = socket.split();
    let ping_every = state.ws.ping_interval;
    let mut ping = interval_at(Instant::now() + ping_every, ping_every);
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        last_seen = Instant::now();
                        match decode(text.as_str()) {
                            Ok(event) => {
                                if let Err(e) = state.sync.submit(connection_id.clone(), event).await {
                                    error!(connection_id = %connection_id, error = %e, "Failed to submit event");
                                    break;
                                }
                            }
                            Err(e) => {
                                debug!(connection_id = %connection_id, error = %e, "Malformed client frame");
                                if send_event(&mut sink, &e.into_server_event()).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {
                        // Pings, pongs and binary frames only prove liveness.
                        last_seen = Instant::now();
                    }
                    Some(Err(e)) => {
                        debug!(connection_id = %connection_id, error = %e, "WebSocket receive error");
                        break;
                    }
                }
            }

            event = outbound.recv() => {
                let Some(event) = event else {
                    warn!(connection_id = %connection_id, "Outbound queue closed");
                    break;
                };
                if send_event(&mut sink, &event).await.is_err() {
                    break;
                }
            }

            _ = ping.tick() => {
                if last_seen.elapsed() > state.ws.idle_timeout {
                    info!(connection_id = %connection_id, "WebSocket idle, closing");
                    break;
                }
                if sink.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    let _ = sink.close().await;
    if let Err(e) = state.sync.disconnect(connection_id.clone()).await {
        warn!(connection_id = %connection_id, error = %e, "Failed to report disconnect");
    }
    info!(connection_id = %connection_id, "WebSocket connection closed");
}

async fn send_event<S>(sink: &mut S, event: &ServerEvent) -> Result<(), ()>
where
    S: futures::Sink<Message> + Unpin,
{
    let text = match encode(event) {
        Ok(text) => text,
        Err(e) => {
            error!(event = event.name(), error = %e, "Failed to encode server event");
            return Ok(());
        }
    };
    sink.send(Message::Text(text.into())).await.map_err(|_| ())
}
