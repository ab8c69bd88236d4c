//! WebSocket endpoint: the thin transport layer over the connection driver.
//!
//! One task per connection runs a single `tokio::select!` loop over the
//! socket and the connection's outbound event channel, so inbound handling
//! and outbound observation (waiting-room promotion, meeting-ended close)
//! never race each other.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use common::protocol::{ClientEvent, ServerEvent};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::connection::{ConnectionDriver, EventFlow};
use crate::errors::RelayError;
use crate::registry::ConnectionHandle;
use crate::AppState;

/// `GET /ws` - upgrade to the signaling WebSocket.
pub async fn ws_connect(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4().to_string();
    let (outbound, mut outbound_rx) = ConnectionHandle::channel(connection_id.clone());
    let mut driver = ConnectionDriver::new(state.supervisor.clone(), outbound);

    debug!(
        target: "relay.ws",
        connection_id = %connection_id,
        "WebSocket connected"
    );

    loop {
        tokio::select! {
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientEvent>(&text) {
                            Ok(event) => {
                                if driver.handle_event(event).await == EventFlow::Close {
                                    break;
                                }
                            }
                            Err(parse_err) => {
                                // Malformed frames are rejected per-event;
                                // the connection stays open.
                                let err = RelayError::Validation(format!(
                                    "Malformed event: {parse_err}"
                                ));
                                let reply = ServerEvent::Error {
                                    message: err.client_message(),
                                };
                                if let Ok(json) = serde_json::to_string(&reply) {
                                    if socket.send(Message::Text(json)).await.is_err() {
                                        break;
                                    }
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        let reply = ServerEvent::Error {
                            message: "Binary frames are not supported".to_string(),
                        };
                        if let Ok(json) = serde_json::to_string(&reply) {
                            if socket.send(Message::Text(json)).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(
                            target: "relay.ws",
                            connection_id = %connection_id,
                            "WebSocket closed by peer"
                        );
                        break;
                    }
                    Some(Err(err)) => {
                        warn!(
                            target: "relay.ws",
                            connection_id = %connection_id,
                            error = %err,
                            "WebSocket transport error"
                        );
                        break;
                    }
                }
            }

            outbound = outbound_rx.recv() => {
                // The driver holds a sender clone, so the channel cannot
                // close while this loop runs.
                let Some(event) = outbound else { break };
                let flow = driver.observe_outbound(&event).await;
                if let Ok(json) = serde_json::to_string(&event) {
                    if socket.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                if flow == EventFlow::Close {
                    break;
                }
            }
        }
    }

    // Every exit path converges here; cleanup is idempotent.
    driver.cleanup().await;
    debug!(
        target: "relay.ws",
        connection_id = %connection_id,
        "WebSocket session finished"
    );
}
