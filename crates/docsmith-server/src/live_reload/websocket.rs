//! WebSocket endpoint that tells browsers to reload.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use tokio::sync::broadcast;

use crate::state::AppState;

/// Path of the live reload endpoint. The page template connects here.
pub const LIVE_RELOAD_PATH: &str = "/__livereload";

pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| forward_reloads(socket, state))
}

/// Push reload events to one client until either side goes away.
async fn forward_reloads(mut socket: WebSocket, state: Arc<AppState>) {
    let Some(reloads) = &state.reloads else {
        return;
    };
    let mut receiver = reloads.subscribe();

    loop {
        tokio::select! {
            result = receiver.recv() => match result {
                Ok(event) => {
                    let Ok(text) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
                // A slow client only needs the latest reload.
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Live reload client lagged");
                }
            },
            // Anything from the client is a keepalive. Close or error ends it.
            result = socket.recv() => {
                if !matches!(result, Some(Ok(_))) {
                    break;
                }
            }
        }
    }
}
