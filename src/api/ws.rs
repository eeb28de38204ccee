//! WebSocket push channel
//!
//! A socket receives the current state on connect and then every committed
//! mutation as a `timer-update` frame. Connecting with `?clientId=<id>`
//! suppresses updates caused by that same client.

use std::sync::Arc;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use chrono::Utc;
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::{
    state::AppState,
    sync::{PushMessage, TimerUpdate},
};

#[derive(Debug, Default, Deserialize)]
pub struct WsParams {
    #[serde(rename = "clientId")]
    pub client_id: Option<String>,
}

/// Handle GET /ws - upgrade to a push channel
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| push_updates(socket, state, params.client_id))
}

async fn push_updates(mut socket: WebSocket, state: Arc<AppState>, client_id: Option<String>) {
    info!("WebSocket observer connected (client={})", client_id.as_deref().unwrap_or("-"));

    // Subscribe first so nothing committed after the initial read is missed.
    let mut updates = state.store.subscribe();
    let initial = PushMessage::TimerState {
        state: state.store.read(Utc::now()).await,
    };
    if !send(&mut socket, &initial).await {
        return;
    }

    loop {
        tokio::select! {
            update = updates.recv() => match next_push(update, &state, client_id.as_deref()).await {
                Step::Push(message) => {
                    if !send(&mut socket, &message).await {
                        break;
                    }
                }
                Step::Skip => {}
                Step::Close => break,
            },

            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                // Observers only listen; pings are answered by axum.
                Some(Ok(_)) => {}
            },
        }
    }

    info!("WebSocket observer disconnected (client={})", client_id.as_deref().unwrap_or("-"));
}

enum Step {
    Push(PushMessage),
    Skip,
    Close,
}

/// Decide what one broadcast result means for a socket. A lagged receiver
/// has lost updates, so it gets a full state instead.
async fn next_push(
    update: Result<TimerUpdate, RecvError>,
    state: &AppState,
    client_id: Option<&str>,
) -> Step {
    match update {
        Ok(update) if update.is_for(client_id) => Step::Push(update.to_message()),
        Ok(_) => Step::Skip,
        Err(RecvError::Lagged(skipped)) => {
            warn!("WebSocket observer lagged by {} updates, resending state", skipped);
            Step::Push(PushMessage::TimerState {
                state: state.store.read(Utc::now()).await,
            })
        }
        Err(RecvError::Closed) => Step::Close,
    }
}

async fn send(socket: &mut WebSocket, message: &PushMessage) -> bool {
    let text = match serde_json::to_string(message) {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to encode push message: {}", e);
            return false;
        }
    };
    match socket.send(Message::Text(text)).await {
        Ok(()) => true,
        Err(e) => {
            debug!("WebSocket send failed: {}", e);
            false
        }
    }
}
