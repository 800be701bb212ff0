//! Observer websocket.
//!
//! Each connection gets its own serving task. The task owns the socket and
//! splits it: a send half forwarding broadcaster payloads, and a receive half
//! that only watches for the peer going away. Observers never send
//! application data. Whichever half finishes first ends the connection, and
//! the observer is unregistered. Service shutdown ends every connection.

use crate::routes::AppState;
use crate::state::{Broadcaster, ObserverRegistration};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Largest frame accepted from an observer.
const MAX_OBSERVER_MESSAGE_BYTES: usize = 4096;

/// Handler for GET /api/ws
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    let broadcaster = Arc::clone(&state.broadcaster);
    let shutdown = state.shutdown.child_token();
    ws.max_message_size(MAX_OBSERVER_MESSAGE_BYTES)
        .on_failed_upgrade(|error| {
            warn!(target: "rc.handlers.ws", error = %error, "WebSocket upgrade failed");
        })
        .on_upgrade(move |socket| serve_observer(socket, broadcaster, shutdown))
}

async fn serve_observer(
    socket: WebSocket,
    broadcaster: Arc<Broadcaster>,
    shutdown: CancellationToken,
) {
    let ObserverRegistration { id, mut receiver } = broadcaster.register().await;
    info!(target: "rc.handlers.ws", observer_id = id, "Observer connected");

    let (mut sink, mut stream) = socket.split();

    let mut send_task = tokio::spawn(async move {
        // Ends when the broadcaster drops our sender or the peer is gone.
        while let Some(payload) = receiver.recv().await {
            if let Err(e) = sink.send(Message::Text(payload.to_string())).await {
                debug!(target: "rc.handlers.ws", observer_id = id, error = %e, "Write to observer failed");
                break;
            }
        }
        let _ = sink.close().await;
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(message) = stream.next().await {
            match message {
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!(target: "rc.handlers.ws", observer_id = id, error = %e, "Observer read error");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
        () = shutdown.cancelled() => {
            debug!(target: "rc.handlers.ws", observer_id = id, "Closing observer for shutdown");
            send_task.abort();
            recv_task.abort();
        }
    }

    broadcaster.unregister(id).await;
    info!(target: "rc.handlers.ws", observer_id = id, "Observer disconnected");
}
