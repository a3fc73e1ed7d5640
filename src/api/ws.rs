//! WebSocket endpoints for the two device roles
//!
//! Speakers push binary audio segments and get JSON status frames back;
//! listeners idle on the socket and receive plain-text answer payloads.
//! Each connection splits its socket into a writer task fed by a channel and
//! a receive loop, so delivery never blocks frame handling.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use super::ApiState;
use crate::pipeline::{AudioSegment, SpeakerFrame};

/// Build WebSocket router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/speaker", get(speaker_upgrade))
        .route("/listener", get(listener_upgrade))
        .with_state(state)
}

async fn speaker_upgrade(
    State(state): State<Arc<ApiState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_speaker(socket, state))
}

async fn listener_upgrade(
    State(state): State<Arc<ApiState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_listener(socket, state))
}

/// Handle a speaker connection
async fn handle_speaker(socket: WebSocket, state: Arc<ApiState>) {
    let (mut sender, mut receiver) = socket.split();
    let session = state.registry.register_speaker();

    // Channel feeding the writer task; the pipeline worker sends frames here
    let (tx, mut rx) = mpsc::channel::<SpeakerFrame>(32);
    let worker = state.pipeline.spawn_speaker_worker(session, tx);

    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if let Ok(text) = serde_json::to_string(&frame) {
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Binary(data) => {
                    if !worker
                        .submit(AudioSegment {
                            bytes: data.to_vec(),
                        })
                        .await
                    {
                        break;
                    }
                }
                Message::Text(text) => {
                    tracing::trace!(session_id = %session, len = text.len(), "ignoring text frame from speaker");
                }
                Message::Close(_) => {
                    tracing::info!(session_id = %session, "speaker closed connection");
                    break;
                }
                _ => {}
            }
        }
        worker
    });

    // Disconnect cancels the in-flight and queued segments
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        worker = &mut recv_task => {
            send_task.abort();
            if let Ok(worker) = worker {
                worker.shutdown();
            }
        }
    }

    state.registry.unregister(session);
}

/// Handle a listener connection
async fn handle_listener(socket: WebSocket, state: Arc<ApiState>) {
    let (mut sender, mut receiver) = socket.split();

    // The registry hands this sender to the relay; registering replaces any
    // previous listener as the delivery target.
    let (tx, mut rx) = mpsc::channel::<String>(32);
    let session = state.registry.register_listener(tx.clone());

    let mut send_task = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if sender.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    if text.as_str() == "ping" {
                        if tx.send("pong".to_string()).await.is_err() {
                            break;
                        }
                    } else {
                        tracing::trace!(session_id = %session, "ignoring listener frame");
                    }
                }
                Message::Close(_) => {
                    tracing::info!(session_id = %session, "listener closed connection");
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    // Stale unregister after a replacement is a no-op in the registry
    state.registry.unregister(session);
}
